//! Data models shared by the fetch pipeline and the reranker.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Compact upstream timestamp form, minute precision.
/// All three strategies use this encoding for outgoing date parameters.
const COMPACT_FMT: &str = "%Y%m%d%H%M";

/// Inclusive publication window, minute granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Whether a timestamp falls inside the window (both ends inclusive).
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }

    /// Window start in the compact `YYYYMMDDHHMM` upstream form.
    pub fn compact_start(&self) -> String {
        self.start.format(COMPACT_FMT).to_string()
    }

    /// Window end in the compact `YYYYMMDDHHMM` upstream form.
    pub fn compact_end(&self) -> String {
        self.end.format(COMPACT_FMT).to_string()
    }
}

/// Caller-constructed query for one fetch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Ordered category codes, e.g. `["cs.AI", "cs.CV"]`.
    pub categories: Vec<String>,
    /// Optional publication window; required by the primary index search.
    pub window: Option<DateWindow>,
    /// Hard cap on returned papers. Must be positive.
    pub max_results: usize,
    /// When set, the final paper list is capped to a small fixed count.
    pub debug: bool,
}

impl QuerySpec {
    pub fn new(categories: Vec<String>, max_results: usize) -> Self {
        Self {
            categories,
            window: None,
            max_results,
            debug: false,
        }
    }

    pub fn with_window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.window = Some(DateWindow::new(start, end));
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn validate(&self) -> Result<(), FetchError> {
        if self.categories.is_empty() {
            return Err(FetchError::InvalidQuery(
                "at least one category is required".to_string(),
            ));
        }
        if self.max_results == 0 {
            return Err(FetchError::InvalidQuery(
                "max_results must be positive".to_string(),
            ));
        }
        if let Some(window) = &self.window {
            if window.start > window.end {
                return Err(FetchError::InvalidQuery(format!(
                    "window start {} is after end {}",
                    window.start, window.end
                )));
            }
        }
        Ok(())
    }

    /// Display form of the category filter, e.g. `cs.AI+cs.CV`.
    pub fn category_filter(&self) -> String {
        self.categories.join("+")
    }
}

/// One discovered paper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
    /// Versionless source-assigned identifier, e.g. `2312.12345`.
    pub arxiv_id: String,
    pub title: String,
    pub authors: Vec<String>,
    /// Abstract text. May be empty when the source listing omitted it.
    pub summary: String,
    pub pdf_url: String,
    pub published: Option<DateTime<Utc>>,
}

impl Paper {
    /// Strip a trailing version suffix (`v1`, `v12`, ...) from an arxiv id.
    pub fn strip_version(id: &str) -> String {
        if let Some(pos) = id.rfind('v') {
            let suffix = &id[pos + 1..];
            if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
                return id[..pos].to_string();
            }
        }
        id.to_string()
    }

    /// Canonical PDF URL for an arxiv id.
    pub fn pdf_url_for(id: &str) -> String {
        format!("https://arxiv.org/pdf/{id}.pdf")
    }
}

/// Which retrieval strategy produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    Primary,
    Feed,
    Scrape,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Primary => "primary",
            Strategy::Feed => "feed",
            Strategy::Scrape => "scrape",
        }
    }
}

/// Output of one orchestrator invocation. Immutable after return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    /// Papers in retrieval order, identifiers unique within the list.
    pub papers: Vec<Paper>,
    /// The strategy that actually supplied the papers.
    pub strategy: Strategy,
    /// Total wall time of the orchestrator call.
    pub elapsed: Duration,
    /// Retries consumed across all attempted strategies.
    pub retry_count: u32,
}

/// One entry of the caller's reference library. Read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusItem {
    pub abstract_text: String,
    pub date_added: DateTime<Utc>,
}

/// Diagnostic record attached to each scored paper.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelevanceFactors {
    /// Highest raw similarity to any single corpus item.
    pub max_similarity: f64,
    /// Mean raw similarity across the corpus.
    pub mean_similarity: f64,
    /// Number of corpus items actually used for scoring.
    pub corpus_size: usize,
}

impl RelevanceFactors {
    pub fn empty() -> Self {
        Self {
            max_similarity: 0.0,
            mean_similarity: 0.0,
            corpus_size: 0,
        }
    }
}

/// A paper with its corpus-relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPaper {
    pub paper: Paper,
    /// Always finite; neutral fallback when similarity could not be computed.
    pub score: f64,
    pub factors: RelevanceFactors,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2023, 12, 23, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 12, 23, 23, 59, 0).unwrap(),
        )
    }

    #[test]
    fn test_compact_window_minute_precision() {
        let (start, end) = window();
        let w = DateWindow::new(start, end);
        assert_eq!(w.compact_start(), "202312230000");
        assert_eq!(w.compact_end(), "202312232359");
    }

    #[test]
    fn test_window_contains_is_inclusive() {
        let (start, end) = window();
        let w = DateWindow::new(start, end);
        assert!(w.contains(start));
        assert!(w.contains(end));
        assert!(!w.contains(end + chrono::Duration::minutes(1)));
    }

    #[test]
    fn test_strip_version() {
        assert_eq!(Paper::strip_version("2312.12345v1"), "2312.12345");
        assert_eq!(Paper::strip_version("2312.12345v12"), "2312.12345");
        assert_eq!(Paper::strip_version("2312.12345"), "2312.12345");
        assert_eq!(Paper::strip_version("cond-mat/0211159v2"), "cond-mat/0211159");
    }

    #[test]
    fn test_validate_rejects_zero_max_results() {
        let spec = QuerySpec::new(vec!["cs.AI".into()], 0);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_categories() {
        let spec = QuerySpec::new(vec![], 10);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_window() {
        let (start, end) = window();
        let spec = QuerySpec::new(vec!["cs.AI".into()], 10).with_window(end, start);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_category_filter_join() {
        let spec = QuerySpec::new(vec!["cs.AI".into(), "cs.CV".into()], 10);
        assert_eq!(spec.category_filter(), "cs.AI+cs.CV");
    }
}
