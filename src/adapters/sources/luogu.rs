//! Luogu Adapter - Content-Only Contest List
//!
//! The `_contentOnly=1` listing returns JSON but only to browser-like
//! user agents.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{instrument, warn};

use super::decode_rows;
use super::http::{BROWSER_USER_AGENT, SourceClient, SourceClientConfig};
use crate::domain::contest::{is_stale, source_id};
use crate::domain::platform::LUOGU;
use crate::domain::{ContestDraft, FetchError};
use crate::ports::{FetchContext, SourceAdapter};

const RETENTION_MONTHS: u32 = 3;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page {
    current_data: CurrentData,
}

#[derive(Debug, Deserialize)]
struct CurrentData {
    contests: ContestPage,
}

#[derive(Debug, Deserialize)]
struct ContestPage {
    #[serde(default)]
    result: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Row {
    id: u64,
    name: String,
    start_time: i64,
    end_time: i64,
}

pub struct LuoguAdapter {
    client: SourceClient,
    url: String,
}

impl LuoguAdapter {
    pub fn new(url: impl Into<String>, config: &SourceClientConfig) -> Result<Self> {
        Ok(Self {
            client: SourceClient::new(LUOGU, config)?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl SourceAdapter for LuoguAdapter {
    fn name(&self) -> &'static str {
        LUOGU
    }

    fn display_name(&self) -> &'static str {
        "洛谷"
    }

    fn fetch_timeout(&self) -> Duration {
        self.client.timeout()
    }

    #[instrument(skip(self, ctx), fields(platform = LUOGU))]
    async fn fetch(&self, ctx: &FetchContext) -> Result<Vec<ContestDraft>, FetchError> {
        let headers = [("User-Agent", BROWSER_USER_AGENT)];
        let body = self.client.get_text(&self.url, &headers, &ctx.cancel).await?;
        parse_contest_page(&body, ctx.now)
    }
}

/// Normalize a `contest/list?_contentOnly=1` response.
pub fn parse_contest_page(body: &str, now: DateTime<Utc>) -> Result<Vec<ContestDraft>, FetchError> {
    let page: Page = serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;

    let mut drafts = Vec::new();
    for row in decode_rows::<Row>(LUOGU, page.current_data.contests.result) {
        let (Some(start), Some(end)) = (
            DateTime::from_timestamp(row.start_time, 0),
            DateTime::from_timestamp(row.end_time, 0),
        ) else {
            warn!(platform = LUOGU, contest = row.id, "Skipping row with out-of-range timestamps");
            continue;
        };
        if end < start {
            warn!(platform = LUOGU, contest = row.id, "Skipping row that ends before it starts");
            continue;
        }
        if is_stale(end, now, RETENTION_MONTHS) {
            continue;
        }

        drafts.push(ContestDraft::from_range(
            LUOGU,
            source_id(LUOGU, row.id),
            row.name,
            format!("https://www.luogu.com.cn/contest/{}", row.id),
            start,
            end,
            now,
        ));
    }

    Ok(drafts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ContestStatus;

    #[test]
    fn parses_nested_result_list() {
        let now = DateTime::from_timestamp(1_740_000_000, 0).unwrap();
        let t = now.timestamp();
        let body = format!(
            r#"{{"currentData":{{"contests":{{"result":[
                {{"id":230001,"name":"【LGR-220】洛谷 3 月月赛","startTime":{},"endTime":{},"rated":true}},
                {{"id":"bad"}}
            ],"count":2}}}}}}"#,
            t - 60,
            t + 3600
        );

        let drafts = parse_contest_page(&body, now).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].source_id, "luogu-230001");
        assert_eq!(drafts[0].status, ContestStatus::Running);
        assert_eq!(drafts[0].url, "https://www.luogu.com.cn/contest/230001");
        assert_eq!(drafts[0].platform, LUOGU);
    }

    #[test]
    fn inverted_range_skips_only_its_row() {
        let now = DateTime::from_timestamp(1_740_000_000, 0).unwrap();
        let t = now.timestamp();
        let body = format!(
            r#"{{"currentData":{{"contests":{{"result":[
                {{"id":1,"name":"Good","startTime":{},"endTime":{}}},
                {{"id":2,"name":"Backwards","startTime":{},"endTime":{}}}
            ]}}}}}}"#,
            t + 60,
            t + 3600,
            t + 3600,
            t + 60
        );

        let drafts = parse_contest_page(&body, now).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].source_id, "luogu-1");
    }

    #[test]
    fn missing_current_data_is_malformed() {
        let now = DateTime::from_timestamp(1_740_000_000, 0).unwrap();
        assert!(matches!(
            parse_contest_page(r#"{"code":403}"#, now),
            Err(FetchError::Malformed(_))
        ));
    }
}
