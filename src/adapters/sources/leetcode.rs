//! LeetCode Adapter - Aggregated Contest Feed
//!
//! LeetCode has no public contest list, so this reads a community
//! aggregator that mixes several judges and keeps the `LeetCode` rows.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{instrument, warn};

use super::decode_rows;
use super::http::{SourceClient, SourceClientConfig};
use crate::domain::contest::{is_stale, slugify, source_id};
use crate::domain::platform::LEETCODE;
use crate::domain::{ContestDraft, FetchError};
use crate::ports::{FetchContext, SourceAdapter};

const RETENTION_MONTHS: u32 = 3;
const JUDGE: &str = "LeetCode";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Row {
    oj: String,
    name: String,
    link: String,
    start_time_stamp: i64,
    end_time_stamp: i64,
}

pub struct LeetCodeAdapter {
    client: SourceClient,
    url: String,
}

impl LeetCodeAdapter {
    pub fn new(url: impl Into<String>, config: &SourceClientConfig) -> Result<Self> {
        Ok(Self {
            client: SourceClient::new(LEETCODE, config)?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl SourceAdapter for LeetCodeAdapter {
    fn name(&self) -> &'static str {
        LEETCODE
    }

    fn display_name(&self) -> &'static str {
        "LeetCode"
    }

    fn fetch_timeout(&self) -> Duration {
        self.client.timeout()
    }

    #[instrument(skip(self, ctx), fields(platform = LEETCODE))]
    async fn fetch(&self, ctx: &FetchContext) -> Result<Vec<ContestDraft>, FetchError> {
        let body = self.client.get_text(&self.url, &[], &ctx.cancel).await?;
        parse_contests(&body, ctx.now)
    }
}

/// Normalize the aggregator's JSON array, keeping LeetCode contests only.
pub fn parse_contests(body: &str, now: DateTime<Utc>) -> Result<Vec<ContestDraft>, FetchError> {
    let rows: Vec<Value> =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;

    let mut drafts = Vec::new();
    for row in decode_rows::<Row>(LEETCODE, rows) {
        if row.oj != JUDGE {
            continue;
        }
        let (Some(start), Some(end)) = (
            DateTime::from_timestamp(row.start_time_stamp, 0),
            DateTime::from_timestamp(row.end_time_stamp, 0),
        ) else {
            warn!(
                platform = LEETCODE,
                contest = %row.name,
                "Skipping row with out-of-range timestamps"
            );
            continue;
        };
        if end < start {
            warn!(
                platform = LEETCODE,
                contest = %row.name,
                "Skipping row that ends before it starts"
            );
            continue;
        }
        if is_stale(end, now, RETENTION_MONTHS) {
            continue;
        }

        // Contest names ("Weekly Contest 440") are unique on LeetCode.
        drafts.push(ContestDraft::from_range(
            LEETCODE,
            source_id(LEETCODE, slugify(&row.name)),
            row.name,
            row.link,
            start,
            end,
            now,
        ));
    }

    Ok(drafts)
}
