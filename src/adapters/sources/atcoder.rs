//! AtCoder Adapter - Scraped Contest Listing
//!
//! Reads the upcoming and active tables of `atcoder.jp/contests/`.
//! Start times carry an explicit UTC offset (`+0900`); durations are
//! `H:MM`. The contest slug in the link path is the natural key.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{instrument, warn};

use super::http::{SourceClient, SourceClientConfig};
use super::text_content;
use crate::domain::contest::{end_after, is_stale, slugify, source_id};
use crate::domain::platform::ATCODER;
use crate::domain::{ContestDraft, FetchError};
use crate::ports::{FetchContext, SourceAdapter};

const RETENTION_MONTHS: u32 = 3;
const ORIGIN: &str = "https://atcoder.jp";
const TABLES: [&str; 2] = ["contest-table-upcoming", "contest-table-active"];

/// Compiled patterns for the contest listing page.
pub struct AtCoderParser {
    row: Regex,
    cell: Regex,
    time: Regex,
    anchor: Regex,
    tag: Regex,
}

impl AtCoderParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            row: Regex::new(r"(?s)<tr[^>]*>(.*?)</tr>").context("row pattern")?,
            cell: Regex::new(r"(?s)<td[^>]*>(.*?)</td>").context("cell pattern")?,
            time: Regex::new(r"<time[^>]*>\s*([^<]+?)\s*</time>").context("time pattern")?,
            anchor: Regex::new(r#"(?s)<a[^>]*href=["'](/contests/[^"'/?#]+)["'][^>]*>(.*?)</a>"#)
                .context("anchor pattern")?,
            tag: Regex::new(r"(?s)<[^>]*>").context("tag pattern")?,
        })
    }

    /// Normalize the listing page. Rows that fail to parse are skipped.
    pub fn parse(&self, html: &str, now: DateTime<Utc>) -> Result<Vec<ContestDraft>, FetchError> {
        let mut drafts = Vec::new();
        let mut tables_seen = 0;

        for table_id in TABLES {
            let Some(section) = table_section(html, table_id) else {
                continue;
            };
            tables_seen += 1;

            for row in self.row.captures_iter(section) {
                let inner = &row[1];
                if !inner.contains("<td") {
                    continue;
                }
                match self.parse_row(inner, now) {
                    Ok(draft) if is_stale(draft.end_time, now, RETENTION_MONTHS) => {}
                    Ok(draft) => drafts.push(draft),
                    Err(reason) => {
                        warn!(
                            platform = ATCODER,
                            table = table_id,
                            %reason,
                            "Skipping malformed row"
                        );
                    }
                }
            }
        }

        if tables_seen == 0 {
            return Err(FetchError::Malformed("no contest tables on page".into()));
        }
        Ok(drafts)
    }

    fn parse_row(&self, row: &str, now: DateTime<Utc>) -> Result<ContestDraft, String> {
        let cells: Vec<&str> = self
            .cell
            .captures_iter(row)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
        if cells.len() < 3 {
            return Err(format!("expected at least 3 cells, got {}", cells.len()));
        }

        let time_text = self
            .time
            .captures(cells[0])
            .map(|c| c[1].to_string())
            .ok_or("missing start time")?;
        let start = parse_start_time(&time_text)?;

        let anchor = self.anchor.captures(cells[1]).ok_or("missing contest link")?;
        let path = anchor[1].to_string();
        let name = text_content(&self.tag, &anchor[2]);
        if name.is_empty() {
            return Err("empty contest name".into());
        }

        let duration = parse_duration(&text_content(&self.tag, cells[2]))?;
        let end = end_after(start, duration).ok_or("duration out of range")?;

        let native = path.trim_start_matches("/contests/");
        let key = if native.is_empty() { slugify(&name) } else { native.to_ascii_lowercase() };

        Ok(ContestDraft::from_range(
            ATCODER,
            source_id(ATCODER, key),
            name,
            format!("{ORIGIN}{path}"),
            start,
            end,
            now,
        ))
    }
}

/// The markup between a table's id attribute and its closing tag.
fn table_section<'a>(html: &'a str, table_id: &str) -> Option<&'a str> {
    let start = html.find(table_id)?;
    let rest = &html[start..];
    let end = rest.find("</table>").unwrap_or(rest.len());
    Some(&rest[..end])
}

/// `2025-03-08 21:00:00+0900` to UTC.
fn parse_start_time(text: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_str(text.trim(), "%Y-%m-%d %H:%M:%S%z")
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("bad start time '{text}': {e}"))
}

/// `H:MM` (hours may exceed 24) to seconds.
fn parse_duration(text: &str) -> Result<i64, String> {
    let (h, m) = text
        .trim()
        .split_once(':')
        .ok_or_else(|| format!("bad duration '{text}'"))?;
    let hours: i64 = h.trim().parse().map_err(|_| format!("bad hours in '{text}'"))?;
    let minutes: i64 = m.trim().parse().map_err(|_| format!("bad minutes in '{text}'"))?;
    hours
        .checked_mul(3600)
        .and_then(|h| minutes.checked_mul(60).and_then(|m| h.checked_add(m)))
        .ok_or_else(|| format!("duration '{text}' overflows"))
}

pub struct AtCoderAdapter {
    client: SourceClient,
    parser: AtCoderParser,
    url: String,
}

impl AtCoderAdapter {
    pub fn new(url: impl Into<String>, config: &SourceClientConfig) -> Result<Self> {
        Ok(Self {
            client: SourceClient::new(ATCODER, config)?,
            parser: AtCoderParser::new()?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl SourceAdapter for AtCoderAdapter {
    fn name(&self) -> &'static str {
        ATCODER
    }

    fn display_name(&self) -> &'static str {
        "AtCoder"
    }

    fn fetch_timeout(&self) -> Duration {
        self.client.timeout()
    }

    #[instrument(skip(self, ctx), fields(platform = ATCODER))]
    async fn fetch(&self, ctx: &FetchContext) -> Result<Vec<ContestDraft>, FetchError> {
        let html = self.client.get_text(&self.url, &[], &ctx.cancel).await?;
        self.parser.parse(&html, ctx.now)
    }
}
