//! Per-category RSS feed client (feed poll).
//!
//! Endpoint: https://rss.arxiv.org/rss/{category}
//!
//! The feed only exposes a recent rolling set of announcements, so it
//! cannot answer arbitrary historical windows. When a window is given it
//! is applied client-side to entries that carry a timestamp; a window that
//! predates the configured lookback bound yields a clean empty success.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use paperscout_common::{AllowlistClient, Paper, QuerySpec, SourceError, Strategy};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::{check_status, FetchStrategy};

const FEED_BASE_URL: &str = "https://rss.arxiv.org/rss";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// How far back the rolling feed window is assumed to reach. A
    /// requested window ending before this bound is unsatisfiable by the
    /// feed and returns empty rather than failing.
    pub max_lookback_days: i64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            max_lookback_days: 30,
        }
    }
}

pub struct RssFeedPoll {
    client: AllowlistClient,
    cfg: FeedConfig,
}

impl RssFeedPoll {
    pub fn new(client: AllowlistClient) -> Self {
        Self::with_config(client, FeedConfig::default())
    }

    pub fn with_config(client: AllowlistClient, cfg: FeedConfig) -> Self {
        Self { client, cfg }
    }
}

#[async_trait]
impl FetchStrategy for RssFeedPoll {
    fn kind(&self) -> Strategy {
        Strategy::Feed
    }

    #[instrument(skip(self, spec), fields(categories = %spec.category_filter()))]
    async fn attempt(&self, spec: &QuerySpec) -> Result<Vec<Paper>, SourceError> {
        if let Some(window) = &spec.window {
            let horizon = Utc::now() - chrono::Duration::days(self.cfg.max_lookback_days);
            if window.end < horizon {
                debug!(
                    lookback_days = self.cfg.max_lookback_days,
                    "requested window predates feed horizon"
                );
                return Ok(vec![]);
            }
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut papers: Vec<Paper> = Vec::new();

        for category in &spec.categories {
            let url = format!("{FEED_BASE_URL}/{category}");
            let resp = self.client.get(&url)?.send().await?;
            check_status(resp.status(), &url)?;
            let body = resp.text().await?;

            let entries = parse_rss(&body)?;
            debug!(category, count = entries.len(), "feed entries parsed");

            for paper in entries {
                // Cross-listed papers appear in several category feeds
                if !seen.insert(paper.arxiv_id.clone()) {
                    continue;
                }
                // Window filter only applies when the entry is dated
                if let (Some(window), Some(published)) = (&spec.window, paper.published) {
                    if !window.contains(published) {
                        continue;
                    }
                }
                papers.push(paper);
                if papers.len() >= spec.max_results {
                    return Ok(papers);
                }
            }
        }

        Ok(papers)
    }
}

/// Parse an arxiv RSS feed into Paper records. Broken items are skipped.
fn parse_rss(xml: &str) -> Result<Vec<Paper>, SourceError> {
    let mut papers = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    // The channel header carries <title>/<link> too; only accumulate
    // inside <item>.
    let mut in_item = false;
    let mut in_title = false;
    let mut in_link = false;
    let mut in_description = false;
    let mut in_creator = false;
    let mut in_pub_date = false;
    let mut title = String::new();
    let mut link = String::new();
    let mut description = String::new();
    let mut creators = String::new();
    let mut published: Option<DateTime<Utc>> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"item" => {
                    in_item = true;
                    title.clear();
                    link.clear();
                    description.clear();
                    creators.clear();
                    published = None;
                }
                b"title" if in_item => in_title = true,
                b"link" if in_item => in_link = true,
                b"description" if in_item => in_description = true,
                b"dc:creator" if in_item => in_creator = true,
                b"pubDate" if in_item => in_pub_date = true,
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                if in_title {
                    title.push_str(&text);
                } else if in_link {
                    link.push_str(&text);
                } else if in_description {
                    description.push_str(&text);
                } else if in_creator {
                    creators.push_str(&text);
                } else if in_pub_date {
                    published = DateTime::parse_from_rfc2822(&text)
                        .ok()
                        .map(|dt| dt.with_timezone(&Utc));
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"title" => in_title = false,
                b"link" => in_link = false,
                b"description" => in_description = false,
                b"dc:creator" => in_creator = false,
                b"pubDate" => in_pub_date = false,
                b"item" => {
                    in_item = false;
                    match item_id(&link) {
                        Some(id) if !title.is_empty() => papers.push(Paper {
                            pdf_url: Paper::pdf_url_for(&id),
                            arxiv_id: id,
                            title: std::mem::take(&mut title),
                            authors: split_creators(&creators),
                            summary: extract_abstract(&description),
                            published,
                        }),
                        _ => warn!(link, "skipping feed item with missing link or title"),
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(SourceError::Parse(format!("rss parse error: {e}"))),
            _ => {}
        }
        buf.clear();
    }

    Ok(papers)
}

/// Versionless arxiv id from an item link.
fn item_id(link: &str) -> Option<String> {
    link.split_once("/abs/")
        .map(|(_, rest)| Paper::strip_version(rest.trim()))
        .filter(|id| !id.is_empty())
}

/// Feed descriptions prefix the abstract with an announcement line:
/// `arXiv:2312.12345v1 Announce Type: new  Abstract: ...`
fn extract_abstract(description: &str) -> String {
    match description.split_once("Abstract:") {
        Some((_, rest)) => rest.trim().to_string(),
        None => description.trim().to_string(),
    }
}

fn split_creators(creators: &str) -> Vec<String> {
    creators
        .split(',')
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}
