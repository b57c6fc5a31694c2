//! Retrieval strategy implementations.

pub mod api;
pub mod feed;
pub mod scrape;

use async_trait::async_trait;
use paperscout_common::{Paper, QuerySpec, SourceError, Strategy};

/// Common capability implemented by every retrieval strategy.
///
/// The orchestrator holds these as an ordered list and iterates it, so
/// strategies can be reordered or added without touching fallback logic.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    fn kind(&self) -> Strategy;

    /// Whether this strategy can serve the given query at all. An
    /// inapplicable strategy is skipped without counting as a failure.
    fn applicable(&self, spec: &QuerySpec) -> bool {
        let _ = spec;
        true
    }

    /// One retrieval attempt. Retry and fallback are owned by the
    /// orchestrator; an attempt either yields papers (possibly none) or a
    /// classified error.
    async fn attempt(&self, spec: &QuerySpec) -> Result<Vec<Paper>, SourceError>;
}

/// Map an upstream HTTP status onto the error taxonomy.
pub(crate) fn check_status(
    status: reqwest::StatusCode,
    url: &str,
) -> Result<(), SourceError> {
    if status.is_success() {
        return Ok(());
    }
    let detail = format!("{url} returned {status}");
    Err(if status.as_u16() == 429 {
        SourceError::RateLimited(detail)
    } else if status.is_client_error() {
        SourceError::MalformedRequest(detail)
    } else {
        SourceError::Network(detail)
    })
}
