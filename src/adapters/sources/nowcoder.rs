//! NowCoder Adapter - Scraped Contest Cards
//!
//! Each contest card on the listing page embeds its data as an
//! HTML-escaped JSON attribute (`data-json`). Times are milliseconds.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use tracing::{instrument, warn};

use super::http::{SourceClient, SourceClientConfig};
use crate::domain::contest::{is_stale, slugify, source_id};
use crate::domain::platform::NOWCODER;
use crate::domain::{ContestDraft, FetchError};
use crate::ports::{FetchContext, SourceAdapter};

const RETENTION_MONTHS: u32 = 3;
const ORIGIN: &str = "https://ac.nowcoder.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CardData {
    #[serde(default)]
    contest_id: Option<u64>,
    contest_name: String,
    contest_start_time: i64,
    contest_end_time: i64,
    #[serde(default)]
    contest_duration: Option<i64>,
}

/// Compiled patterns for contest cards.
pub struct NowCoderParser {
    card: Regex,
    data_json: Regex,
    href: Regex,
}

impl NowCoderParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            card: Regex::new(r#"(?s)<div[^>]*class="[^"]*platform-item[^"]*js-item[^"]*"[^>]*>"#)
                .context("card pattern")?,
            data_json: Regex::new(r#"data-json="([^"]*)""#).context("data-json pattern")?,
            href: Regex::new(r#"<a[^>]*href="([^"]+)""#).context("href pattern")?,
        })
    }

    pub fn parse(&self, html: &str, now: DateTime<Utc>) -> Result<Vec<ContestDraft>, FetchError> {
        let cards: Vec<_> = self.card.find_iter(html).collect();
        if cards.is_empty() && !html.contains("platform-item") {
            return Err(FetchError::Malformed("no contest cards on page".into()));
        }

        let mut drafts = Vec::new();
        for (i, card) in cards.iter().enumerate() {
            let body_end = cards.get(i + 1).map_or(html.len(), |next| next.start());
            let body = &html[card.end()..body_end];
            match self.parse_card(card.as_str(), body, now) {
                Ok(Some(draft)) => drafts.push(draft),
                Ok(None) => {}
                Err(reason) => warn!(platform = NOWCODER, %reason, "Skipping malformed card"),
            }
        }
        Ok(drafts)
    }

    fn parse_card(
        &self,
        open_tag: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ContestDraft>, String> {
        let raw = self
            .data_json
            .captures(open_tag)
            .map(|c| c[1].to_string())
            .ok_or("missing data-json attribute")?;
        let decoded = html_escape::decode_html_entities(&raw);
        let data: CardData =
            serde_json::from_str(&decoded).map_err(|e| format!("bad data-json: {e}"))?;

        let path = self
            .href
            .captures(body)
            .map(|c| c[1].to_string())
            .ok_or("missing contest link")?;
        let url = if path.starts_with("http") { path.clone() } else { format!("{ORIGIN}{path}") };

        let start = DateTime::from_timestamp_millis(data.contest_start_time)
            .ok_or("start time out of range")?;
        let end = DateTime::from_timestamp_millis(data.contest_end_time)
            .ok_or("end time out of range")?;
        if end < start {
            return Err("contest ends before it starts".into());
        }
        if is_stale(end, now, RETENTION_MONTHS) {
            return Ok(None);
        }

        let native = data
            .contest_id
            .map(|id| id.to_string())
            .or_else(|| {
                path.rsplit('/')
                    .find(|s| !s.is_empty())
                    .filter(|s| s.chars().all(|c| c.is_ascii_digit()))
                    .map(str::to_string)
            })
            .unwrap_or_else(|| slugify(&data.contest_name));

        let mut draft = ContestDraft::from_range(
            NOWCODER,
            source_id(NOWCODER, native),
            data.contest_name,
            url,
            start,
            end,
            now,
        );
        if let Some(ms) = data.contest_duration {
            draft.duration_seconds = ms / 1000;
        }
        Ok(Some(draft))
    }
}

pub struct NowCoderAdapter {
    client: SourceClient,
    parser: NowCoderParser,
    url: String,
}

impl NowCoderAdapter {
    pub fn new(url: impl Into<String>, config: &SourceClientConfig) -> Result<Self> {
        Ok(Self {
            client: SourceClient::new(NOWCODER, config)?,
            parser: NowCoderParser::new()?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl SourceAdapter for NowCoderAdapter {
    fn name(&self) -> &'static str {
        NOWCODER
    }

    fn display_name(&self) -> &'static str {
        "牛客"
    }

    fn fetch_timeout(&self) -> Duration {
        self.client.timeout()
    }

    #[instrument(skip(self, ctx), fields(platform = NOWCODER))]
    async fn fetch(&self, ctx: &FetchContext) -> Result<Vec<ContestDraft>, FetchError> {
        let html = self.client.get_text(&self.url, &[], &ctx.cancel).await?;
        self.parser.parse(&html, ctx.now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ContestStatus;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_740_000_000, 0).unwrap()
    }

    fn card(json: &str, href: &str) -> String {
        let escaped = json.replace('"', "&quot;");
        format!(
            r#"<div class="platform-item js-item " data-id="1" data-json="{escaped}">
                 <div class="platform-item-main"><h4><a href="{href}" target="_blank">title</a></h4></div>
               </div>"#
        )
    }

    #[test]
    fn decodes_escaped_card_json() {
        let start = now().timestamp_millis() + 86_400_000;
        let json = format!(
            r#"{{"contestId":103952,"contestName":"2025牛客寒假算法基础集训营1","contestStartTime":{start},"contestEndTime":{},"contestDuration":18000000}}"#,
            start + 18_000_000
        );
        let html = format!("<html>{}</html>", card(&json, "/acm/contest/103952"));

        let drafts = NowCoderParser::new().unwrap().parse(&html, now()).unwrap();
        assert_eq!(drafts.len(), 1);
        let d = &drafts[0];
        assert_eq!(d.source_id, "nowcoder-103952");
        assert_eq!(d.url, "https://ac.nowcoder.com/acm/contest/103952");
        assert_eq!(d.duration_seconds, 18_000);
        assert_eq!(d.status, ContestStatus::Upcoming);
    }

    #[test]
    fn falls_back_to_link_id_then_skips_broken_cards() {
        let start = now().timestamp_millis() - 1_000;
        let good = format!(
            r#"{{"contestName":"周赛 Round 80","contestStartTime":{start},"contestEndTime":{}}}"#,
            start + 7_200_000
        );
        let html = format!(
            "{}{}",
            card(&good, "/acm/contest/104000"),
            card("{not json", "/acm/contest/1")
        );

        let drafts = NowCoderParser::new().unwrap().parse(&html, now()).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].source_id, "nowcoder-104000");
        assert_eq!(drafts[0].status, ContestStatus::Running);
        assert_eq!(drafts[0].duration_seconds, 7_200);
    }

    #[test]
    fn inverted_card_is_skipped() {
        let start = now().timestamp_millis() + 60_000;
        let backwards = format!(
            r#"{{"contestId":1,"contestName":"Backwards","contestStartTime":{start},"contestEndTime":{}}}"#,
            start - 3_600_000
        );
        let good = format!(
            r#"{{"contestId":2,"contestName":"Good","contestStartTime":{start},"contestEndTime":{}}}"#,
            start + 3_600_000
        );
        let html = format!(
            "{}{}",
            card(&backwards, "/acm/contest/1"),
            card(&good, "/acm/contest/2")
        );

        let drafts = NowCoderParser::new().unwrap().parse(&html, now()).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].source_id, "nowcoder-2");
    }

    #[test]
    fn unrelated_page_is_malformed() {
        let err = NowCoderParser::new().unwrap().parse("<html>login</html>", now()).unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }
}
