//! arxiv export API client (primary index search).
//!
//! Endpoint: https://export.arxiv.org/api/query
//!
//! Supports exact date-range filtering via `submittedDate`, and returns
//! entries sorted by submission date, most recent first. Requires a date
//! window; without one the strategy reports itself inapplicable and the
//! orchestrator falls through to the feed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use paperscout_common::{AllowlistClient, Paper, QuerySpec, SourceError, Strategy};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, instrument, warn};

use super::{check_status, FetchStrategy};

const API_URL: &str = "https://export.arxiv.org/api/query";

pub struct ArxivApiSearch {
    client: AllowlistClient,
}

impl ArxivApiSearch {
    pub fn new(client: AllowlistClient) -> Self {
        Self { client }
    }

    /// Build the `search_query` expression:
    /// `(cat:A OR cat:B) AND submittedDate:[start TO end]`.
    fn build_query(spec: &QuerySpec) -> String {
        let cats = spec
            .categories
            .iter()
            .map(|c| format!("cat:{c}"))
            .collect::<Vec<_>>()
            .join(" OR ");
        match &spec.window {
            Some(w) => format!(
                "({cats}) AND submittedDate:[{} TO {}]",
                w.compact_start(),
                w.compact_end()
            ),
            None => format!("({cats})"),
        }
    }
}

#[async_trait]
impl FetchStrategy for ArxivApiSearch {
    fn kind(&self) -> Strategy {
        Strategy::Primary
    }

    /// The API search is only used when an exact window is requested.
    fn applicable(&self, spec: &QuerySpec) -> bool {
        spec.window.is_some()
    }

    #[instrument(skip(self, spec), fields(categories = %spec.category_filter()))]
    async fn attempt(&self, spec: &QuerySpec) -> Result<Vec<Paper>, SourceError> {
        let params = [
            ("search_query", Self::build_query(spec)),
            ("start", "0".to_string()),
            ("max_results", spec.max_results.to_string()),
            ("sortBy", "submittedDate".to_string()),
            ("sortOrder", "descending".to_string()),
        ];

        let resp = self.client.get(API_URL)?.query(&params).send().await?;
        check_status(resp.status(), API_URL)?;
        let body = resp.text().await?;

        let papers = parse_atom(&body)?;
        debug!(count = papers.len(), "API search returned entries");
        Ok(papers)
    }
}

/// Parse an arxiv Atom response into Paper records.
///
/// Entries the API uses to signal a bad query (id under `/api/errors`)
/// turn the whole response into a malformed-request error; individually
/// broken entries are skipped.
fn parse_atom(xml: &str) -> Result<Vec<Paper>, SourceError> {
    let mut papers = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    // State machine over the Atom structure; the feed itself carries
    // <title>/<updated> too, so fields only accumulate inside <entry>.
    let mut in_entry = false;
    let mut in_id = false;
    let mut in_title = false;
    let mut in_summary = false;
    let mut in_name = false;
    let mut in_published = false;
    let mut raw_id = String::new();
    let mut title = String::new();
    let mut summary = String::new();
    let mut authors: Vec<String> = Vec::new();
    let mut published: Option<DateTime<Utc>> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"entry" => {
                    in_entry = true;
                    raw_id.clear();
                    title.clear();
                    summary.clear();
                    authors.clear();
                    published = None;
                }
                b"id" if in_entry => in_id = true,
                b"title" if in_entry => in_title = true,
                b"summary" if in_entry => in_summary = true,
                b"name" if in_entry => in_name = true,
                b"published" if in_entry => in_published = true,
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                if in_id {
                    raw_id.push_str(&text);
                } else if in_title {
                    title.push_str(&text);
                } else if in_summary {
                    summary.push_str(&text);
                } else if in_name {
                    authors.push(text);
                } else if in_published {
                    published = DateTime::parse_from_rfc3339(&text)
                        .ok()
                        .map(|dt| dt.with_timezone(&Utc));
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"id" => in_id = false,
                b"title" => in_title = false,
                b"summary" => in_summary = false,
                b"name" => in_name = false,
                b"published" => in_published = false,
                b"entry" => {
                    in_entry = false;
                    if raw_id.contains("/api/errors") {
                        return Err(SourceError::MalformedRequest(format!(
                            "upstream rejected query: {}",
                            summary.trim()
                        )));
                    }
                    match entry_id(&raw_id) {
                        Some(id) if !title.is_empty() => papers.push(Paper {
                            pdf_url: Paper::pdf_url_for(&id),
                            arxiv_id: id,
                            title: std::mem::take(&mut title),
                            authors: std::mem::take(&mut authors),
                            summary: std::mem::take(&mut summary),
                            published,
                        }),
                        _ => warn!(raw_id, "skipping entry with missing id or title"),
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(SourceError::Parse(format!("atom parse error: {e}"))),
            _ => {}
        }
        buf.clear();
    }

    Ok(papers)
}

/// Versionless arxiv id from an Atom entry id URL.
fn entry_id(raw: &str) -> Option<String> {
    raw.split_once("/abs/")
        .map(|(_, rest)| Paper::strip_version(rest.trim()))
        .filter(|id| !id.is_empty())
}
