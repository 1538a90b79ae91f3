//! Codeforces Adapter - JSON `contest.list` API
//!
//! Only contests in phase `BEFORE` or `CODING` are kept. The numeric
//! contest id is the natural key.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::decode_rows;
use super::http::{SourceClient, SourceClientConfig};
use crate::domain::contest::{end_after, is_stale, source_id};
use crate::domain::platform::CODEFORCES;
use crate::domain::{ContestDraft, FetchError};
use crate::ports::{FetchContext, SourceAdapter};

const RETENTION_MONTHS: u32 = 6;

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    result: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Row {
    id: u64,
    name: String,
    phase: String,
    duration_seconds: i64,
    #[serde(default)]
    start_time_seconds: Option<i64>,
}

pub struct CodeforcesAdapter {
    client: SourceClient,
    url: String,
}

impl CodeforcesAdapter {
    pub fn new(url: impl Into<String>, config: &SourceClientConfig) -> Result<Self> {
        Ok(Self {
            client: SourceClient::new(CODEFORCES, config)?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl SourceAdapter for CodeforcesAdapter {
    fn name(&self) -> &'static str {
        CODEFORCES
    }

    fn display_name(&self) -> &'static str {
        "Codeforces"
    }

    fn fetch_timeout(&self) -> Duration {
        self.client.timeout()
    }

    #[instrument(skip(self, ctx), fields(platform = CODEFORCES))]
    async fn fetch(&self, ctx: &FetchContext) -> Result<Vec<ContestDraft>, FetchError> {
        let body = self.client.get_text(&self.url, &[], &ctx.cancel).await?;
        parse_contest_list(&body, ctx.now)
    }
}

/// Normalize a `contest.list` response body.
pub fn parse_contest_list(body: &str, now: DateTime<Utc>) -> Result<Vec<ContestDraft>, FetchError> {
    let envelope: Envelope =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;

    if envelope.status != "OK" {
        return Err(FetchError::Malformed(format!(
            "api status {}: {}",
            envelope.status,
            envelope.comment.unwrap_or_default()
        )));
    }

    let mut drafts = Vec::new();
    for row in decode_rows::<Row>(CODEFORCES, envelope.result) {
        if row.phase != "BEFORE" && row.phase != "CODING" {
            continue;
        }
        let Some(start) = row.start_time_seconds.and_then(|s| DateTime::from_timestamp(s, 0)) else {
            debug!(contest = row.id, "Skipping contest without start time");
            continue;
        };
        let Some(end) = end_after(start, row.duration_seconds) else {
            warn!(
                platform = CODEFORCES,
                contest = row.id,
                duration = row.duration_seconds,
                "Skipping row with unusable duration"
            );
            continue;
        };
        if is_stale(end, now, RETENTION_MONTHS) {
            continue;
        }

        let mut draft = ContestDraft::from_range(
            CODEFORCES,
            source_id(CODEFORCES, row.id),
            row.name,
            format!("https://codeforces.com/contest/{}", row.id),
            start,
            end,
            now,
        );
        draft.duration_seconds = row.duration_seconds;
        drafts.push(draft);
    }

    Ok(drafts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ContestStatus;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_740_000_000, 0).unwrap()
    }

    #[test]
    fn keeps_only_before_and_coding_phases() {
        let start = now().timestamp() + 3600;
        let running = now().timestamp() - 600;
        let body = format!(
            r#"{{"status":"OK","result":[
                {{"id":2001,"name":"Round A","type":"CF","phase":"BEFORE","frozen":false,"durationSeconds":7200,"startTimeSeconds":{start}}},
                {{"id":2000,"name":"Round B","type":"CF","phase":"CODING","frozen":false,"durationSeconds":7200,"startTimeSeconds":{running}}},
                {{"id":1999,"name":"Round C","type":"CF","phase":"FINISHED","frozen":false,"durationSeconds":7200,"startTimeSeconds":{running}}}
            ]}}"#
        );

        let drafts = parse_contest_list(&body, now()).unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].source_id, "codeforces-2001");
        assert_eq!(drafts[0].status, ContestStatus::Upcoming);
        assert_eq!(drafts[0].duration_seconds, 7200);
        assert_eq!(drafts[0].url, "https://codeforces.com/contest/2001");
        assert_eq!(drafts[1].status, ContestStatus::Running);
    }

    #[test]
    fn malformed_row_is_skipped_not_fatal() {
        let body = format!(
            r#"{{"status":"OK","result":[
                {{"id":"oops","name":1}},
                {{"id":5,"name":"Good","phase":"BEFORE","durationSeconds":60,"startTimeSeconds":{}}}
            ]}}"#,
            now().timestamp() + 10
        );
        let drafts = parse_contest_list(&body, now()).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].name, "Good");
    }

    #[test]
    fn unusable_durations_skip_only_their_row() {
        let start = now().timestamp() + 60;
        let body = format!(
            r#"{{"status":"OK","result":[
                {{"id":1,"name":"Huge","phase":"BEFORE","durationSeconds":9223372036854775,"startTimeSeconds":{start}}},
                {{"id":2,"name":"Negative","phase":"BEFORE","durationSeconds":-7200,"startTimeSeconds":{start}}},
                {{"id":3,"name":"Good","phase":"BEFORE","durationSeconds":7200,"startTimeSeconds":{start}}}
            ]}}"#
        );
        let drafts = parse_contest_list(&body, now()).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].source_id, "codeforces-3");
    }

    #[test]
    fn non_ok_envelope_is_malformed() {
        let body = r#"{"status":"FAILED","comment":"Call limit exceeded"}"#;
        let err = parse_contest_list(body, now()).unwrap_err();
        assert!(matches!(err, FetchError::Malformed(msg) if msg.contains("Call limit")));
    }

    #[test]
    fn garbage_body_is_malformed() {
        assert!(matches!(
            parse_contest_list("<html>", now()),
            Err(FetchError::Malformed(_))
        ));
    }
}
