//! Platform Descriptors - Known Contest Sources
//!
//! Each upstream platform is identified by a stable lowercase ASCII key used
//! for registry lookups, job keys, rate-limit keys and the persisted
//! `platform` column. The display name is presentation only.

use serde::{Deserialize, Serialize};

pub const CODEFORCES: &str = "codeforces";
pub const ATCODER: &str = "atcoder";
pub const LEETCODE: &str = "leetcode";
pub const NOWCODER: &str = "nowcoder";
pub const LUOGU: &str = "luogu";

/// Static description of one upstream platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformDescriptor {
    /// Stable ASCII key (`codeforces`, `luogu`, ...).
    pub key: String,
    /// Human-facing name, possibly non-ASCII.
    pub display_name: String,
    /// Upstream API or listing page.
    pub base_url: String,
    /// Inactive platforms are never registered.
    pub active: bool,
    /// Expected refresh cadence, informational.
    pub update_interval_secs: u64,
    /// Optional dedicated cron schedule (six fields, seconds first).
    pub schedule: Option<String>,
}

impl PlatformDescriptor {
    fn builtin(key: &str, display_name: &str, base_url: &str) -> Self {
        Self {
            key: key.to_string(),
            display_name: display_name.to_string(),
            base_url: base_url.to_string(),
            active: true,
            update_interval_secs: 86_400,
            schedule: None,
        }
    }

    /// Descriptors for every platform with a built-in adapter.
    pub fn builtins() -> Vec<Self> {
        vec![
            Self::builtin(CODEFORCES, "Codeforces", "https://codeforces.com/api/contest.list"),
            Self::builtin(ATCODER, "AtCoder", "https://atcoder.jp/contests/"),
            Self::builtin(LEETCODE, "LeetCode", "https://algcontest.rainng.com/contests"),
            Self::builtin(
                NOWCODER,
                "牛客",
                "https://ac.nowcoder.com/acm/contest/vip-index?topCategoryFilter=14",
            ),
            Self::builtin(
                LUOGU,
                "洛谷",
                "https://www.luogu.com.cn/contest/list?page=1&_contentOnly=1",
            ),
        ]
    }
}

/// Canonical form of a user-supplied platform name.
pub fn normalize_key(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Display name for a built-in key, falling back to the key itself.
pub fn display_name(key: &str) -> &str {
    match key {
        CODEFORCES => "Codeforces",
        ATCODER => "AtCoder",
        LEETCODE => "LeetCode",
        NOWCODER => "牛客",
        LUOGU => "洛谷",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_have_unique_ascii_keys() {
        let all = PlatformDescriptor::builtins();
        assert_eq!(all.len(), 5);
        for d in &all {
            assert!(d.key.is_ascii());
            assert_eq!(normalize_key(&d.key), d.key);
            assert_eq!(display_name(&d.key), d.display_name);
        }
    }

    #[test]
    fn normalize_accepts_any_case() {
        assert_eq!(normalize_key(" CodeForces "), CODEFORCES);
        assert_eq!(display_name("unknown"), "unknown");
    }
}
