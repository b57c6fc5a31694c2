//! arxiv search-page scraper (last-resort fallback).
//!
//! Walks https://arxiv.org/search/ result pages for the requested
//! categories and parses the listing markup into Paper records. The search
//! interface has no exact date-range support, so the window is applied as
//! a client-side post-filter. A fixed inter-page delay keeps the crawl
//! within the site's acceptable-use expectations.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use paperscout_common::{AllowlistClient, DateWindow, Paper, QuerySpec, SourceError, Strategy};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use super::{check_status, FetchStrategy};

const SEARCH_URL: &str = "https://arxiv.org/search/";
const ABS_URL: &str = "https://arxiv.org/abs";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Result-page size requested from the search interface.
    pub page_size: usize,
    /// Delay between successive result-page requests.
    pub inter_page_delay_ms: u64,
    /// Fetch a paper's abstract page when the listing omitted the abstract.
    pub backfill_abstracts: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            inter_page_delay_ms: 3000,
            backfill_abstracts: true,
        }
    }
}

pub struct SearchPageScraper {
    client: AllowlistClient,
    cfg: ScrapeConfig,
}

impl SearchPageScraper {
    pub fn new(client: AllowlistClient) -> Self {
        Self::with_config(client, ScrapeConfig::default())
    }

    pub fn with_config(client: AllowlistClient, cfg: ScrapeConfig) -> Self {
        Self { client, cfg }
    }

    fn build_search_url(&self, categories: &[String], start: usize) -> Result<Url, SourceError> {
        let query = categories
            .iter()
            .map(|c| format!("cat:{c}"))
            .collect::<Vec<_>>()
            .join(" OR ");
        let mut url = Url::parse(SEARCH_URL)
            .map_err(|e| SourceError::MalformedRequest(format!("bad search URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("searchtype", "all")
            .append_pair("query", &query)
            .append_pair("start", &start.to_string())
            .append_pair("size", &self.cfg.page_size.to_string());
        Ok(url)
    }

    /// Best-effort abstract backfill from the paper's detail page. Never
    /// fails the surrounding attempt.
    async fn fetch_abstract(&self, arxiv_id: &str) -> Option<String> {
        let url = format!("{ABS_URL}/{arxiv_id}");
        let resp = match self.client.get(&url) {
            Ok(builder) => builder.send().await.ok()?,
            Err(err) => {
                warn!(arxiv_id, %err, "abstract backfill request refused");
                return None;
            }
        };
        if !resp.status().is_success() {
            return None;
        }
        let body = resp.text().await.ok()?;
        parse_detail_abstract(&body)
    }
}

#[async_trait]
impl FetchStrategy for SearchPageScraper {
    fn kind(&self) -> Strategy {
        Strategy::Scrape
    }

    #[instrument(skip(self, spec), fields(categories = %spec.category_filter()))]
    async fn attempt(&self, spec: &QuerySpec) -> Result<Vec<Paper>, SourceError> {
        let mut collected: Vec<Paper> = Vec::new();
        let mut start = 0usize;

        loop {
            if start > 0 {
                tokio::time::sleep(Duration::from_millis(self.cfg.inter_page_delay_ms)).await;
            }

            let url = self.build_search_url(&spec.categories, start)?;
            let resp = self.client.get(url.as_str())?.send().await?;
            check_status(resp.status(), url.as_str())?;
            let body = resp.text().await?;

            let page = parse_search_results(&body);
            if page.is_empty() {
                break;
            }
            debug!(start, count = page.len(), "scraped result page");
            collected.extend(page);

            if collected.len() >= spec.max_results {
                collected.truncate(spec.max_results);
                break;
            }
            start += self.cfg.page_size;
        }

        if let Some(window) = &spec.window {
            collected = filter_by_window(collected, window);
        }

        if self.cfg.backfill_abstracts {
            for paper in collected.iter_mut() {
                if paper.summary.trim().is_empty() {
                    if let Some(summary) = self.fetch_abstract(&paper.arxiv_id).await {
                        paper.summary = summary;
                    }
                }
            }
        }

        Ok(collected)
    }
}

/// Parse one search-results page. Broken entries are skipped individually.
fn parse_search_results(html: &str) -> Vec<Paper> {
    let document = Html::parse_document(html);
    let result_sel = Selector::parse("li.arxiv-result").unwrap();

    let mut papers = Vec::new();
    for entry in document.select(&result_sel) {
        match parse_result_entry(&entry) {
            Some(paper) => papers.push(paper),
            None => warn!("skipping malformed search result entry"),
        }
    }
    papers
}

fn parse_result_entry(entry: &scraper::ElementRef<'_>) -> Option<Paper> {
    let id_sel = Selector::parse("p.list-title a").unwrap();
    let title_sel = Selector::parse("p.title").unwrap();
    let authors_sel = Selector::parse("p.authors a").unwrap();
    let abstract_sel = Selector::parse("span.abstract-full").unwrap();
    let submitted_sel = Selector::parse("p.is-size-7").unwrap();

    let href = entry.select(&id_sel).next()?.value().attr("href")?;
    let arxiv_id = href
        .split_once("/abs/")
        .map(|(_, rest)| Paper::strip_version(rest.trim()))
        .filter(|id| !id.is_empty())?;

    let title = text_of(entry.select(&title_sel).next()?);
    if title.is_empty() {
        return None;
    }

    let authors: Vec<String> = entry
        .select(&authors_sel)
        .map(|a| text_of(a))
        .filter(|name| !name.is_empty())
        .collect();

    let summary = entry
        .select(&abstract_sel)
        .next()
        .map(|el| {
            // the expander widget's "Less" link rides along in the text
            text_of(el)
                .trim_end_matches("△ Less")
                .trim()
                .to_string()
        })
        .unwrap_or_default();

    let published = entry
        .select(&submitted_sel)
        .next()
        .and_then(|el| parse_submitted_date(&text_of(el)));

    Some(Paper {
        pdf_url: Paper::pdf_url_for(&arxiv_id),
        arxiv_id,
        title,
        authors,
        summary,
        published,
    })
}

fn text_of(el: scraper::ElementRef<'_>) -> String {
    el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse the submission date out of the listing footer, e.g.
/// `Submitted 23 December, 2023; originally announced December 2023.`
fn parse_submitted_date(text: &str) -> Option<DateTime<Utc>> {
    let after = text.split("Submitted").nth(1)?;
    let segment = after.split(';').next()?.trim();
    for fmt in ["%d %B, %Y", "%d %b %Y", "%d %B %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(segment, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

/// Client-side window post-filter. Undated papers are kept; the search
/// interface cannot guarantee their exclusion either way.
fn filter_by_window(papers: Vec<Paper>, window: &DateWindow) -> Vec<Paper> {
    papers
        .into_iter()
        .filter(|p| match p.published {
            Some(ts) => window.contains(ts),
            None => true,
        })
        .collect()
}

/// Extract the abstract from a paper's /abs/ detail page.
fn parse_detail_abstract(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let abstract_sel = Selector::parse("blockquote.abstract").unwrap();
    let text = text_of(document.select(&abstract_sel).next()?);
    let cleaned = text.trim_start_matches("Abstract:").trim().to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}
