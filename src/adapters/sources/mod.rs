//! Source Adapters - One Module per Upstream Platform
//!
//! Every adapter owns a private [`http::SourceClient`] and a pure
//! `parse` step that is unit-tested against captured payloads.
//!
//! Platforms:
//! - `codeforces`: JSON API
//! - `atcoder`: HTML listing tables
//! - `leetcode`: JSON aggregator feed
//! - `nowcoder`: HTML cards with embedded JSON
//! - `luogu`: JSON content-only listing

pub mod atcoder;
pub mod codeforces;
pub mod http;
pub mod leetcode;
pub mod luogu;
pub mod nowcoder;

use std::sync::Arc;

use anyhow::{Result, bail};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use crate::domain::PlatformDescriptor;
use crate::domain::platform::{ATCODER, CODEFORCES, LEETCODE, LUOGU, NOWCODER};
use crate::ports::SourceAdapter;

pub use atcoder::AtCoderAdapter;
pub use codeforces::CodeforcesAdapter;
pub use http::{SourceClient, SourceClientConfig};
pub use leetcode::LeetCodeAdapter;
pub use luogu::LuoguAdapter;
pub use nowcoder::NowCoderAdapter;

/// Build the adapter for one descriptor.
pub fn build_adapter(
    descriptor: &PlatformDescriptor,
    config: &SourceClientConfig,
) -> Result<Arc<dyn SourceAdapter>> {
    let url = descriptor.base_url.clone();
    let adapter: Arc<dyn SourceAdapter> = match descriptor.key.as_str() {
        CODEFORCES => Arc::new(CodeforcesAdapter::new(url, config)?),
        ATCODER => Arc::new(AtCoderAdapter::new(url, config)?),
        LEETCODE => Arc::new(LeetCodeAdapter::new(url, config)?),
        NOWCODER => Arc::new(NowCoderAdapter::new(url, config)?),
        LUOGU => Arc::new(LuoguAdapter::new(url, config)?),
        other => bail!("no built-in adapter for platform '{other}'"),
    };
    Ok(adapter)
}

/// Build adapters for every active descriptor.
pub fn builtin_adapters(
    descriptors: &[PlatformDescriptor],
    config: &SourceClientConfig,
) -> Result<Vec<Arc<dyn SourceAdapter>>> {
    let adapters = descriptors
        .iter()
        .filter(|d| d.active)
        .map(|d| build_adapter(d, config))
        .collect::<Result<Vec<_>>>()?;

    info!(count = adapters.len(), "Source adapters built");
    Ok(adapters)
}

/// Decode each JSON row on its own so one bad row never sinks the batch.
pub(crate) fn decode_rows<T: DeserializeOwned>(platform: &str, rows: Vec<Value>) -> Vec<T> {
    rows.into_iter()
        .enumerate()
        .filter_map(|(index, row)| match serde_json::from_value::<T>(row) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(platform, index, error = %e, "Skipping malformed row");
                None
            }
        })
        .collect()
}

/// Visible text of an HTML fragment: tags dropped, entities decoded,
/// whitespace collapsed.
pub(crate) fn text_content(tag: &Regex, fragment: &str) -> String {
    let stripped = tag.replace_all(fragment, " ");
    html_escape::decode_html_entities(&stripped)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_all_builtin_adapters() {
        let adapters =
            builtin_adapters(&PlatformDescriptor::builtins(), &SourceClientConfig::default()).unwrap();
        let mut names: Vec<_> = adapters.iter().map(|a| a.name()).collect();
        names.sort_unstable();
        assert_eq!(names, vec![ATCODER, CODEFORCES, LEETCODE, LUOGU, NOWCODER]);
    }

    #[test]
    fn inactive_descriptors_are_skipped() {
        let mut descriptors = PlatformDescriptor::builtins();
        descriptors.iter_mut().filter(|d| d.key != LUOGU).for_each(|d| d.active = false);
        let adapters = builtin_adapters(&descriptors, &SourceClientConfig::default()).unwrap();
        assert_eq!(adapters.len(), 1);
        assert_eq!(adapters[0].display_name(), "洛谷");
    }

    #[test]
    fn unknown_key_is_rejected() {
        let mut d = PlatformDescriptor::builtins().remove(0);
        d.key = "topcoder".into();
        assert!(build_adapter(&d, &SourceClientConfig::default()).is_err());
    }

    #[test]
    fn text_content_strips_and_decodes() {
        let tag = Regex::new(r"(?s)<[^>]*>").unwrap();
        assert_eq!(text_content(&tag, "<b>A &amp;\n  B</b> <i>C</i>"), "A & B C");
    }
}
