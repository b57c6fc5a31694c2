use thiserror::Error;

use crate::models::Strategy;

/// Error raised by a single retrieval attempt against an upstream source.
///
/// The variants carry the classification the retry policy needs:
/// `Network`, `Timeout`, and `RateLimited` are transient; the rest mean
/// the request itself is wrong and retrying cannot help.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("rate limited by upstream: {0}")]
    RateLimited(String),

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("request blocked by allowlist: {0}")]
    Blocked(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return SourceError::Timeout(err.to_string());
        }
        if let Some(status) = err.status() {
            return match status.as_u16() {
                429 => SourceError::RateLimited(err.to_string()),
                400..=499 => SourceError::MalformedRequest(err.to_string()),
                _ => SourceError::Network(err.to_string()),
            };
        }
        SourceError::Network(err.to_string())
    }
}

/// Error surfaced by the fetch orchestrator to its caller.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Every enabled strategy exhausted its retries without a successful
    /// attempt. Carries the final error of each strategy tried.
    #[error("all fetch strategies exhausted: {}", summarize(.attempts))]
    AllStrategiesExhausted {
        attempts: Vec<(Strategy, SourceError)>,
    },

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

fn summarize(attempts: &[(Strategy, SourceError)]) -> String {
    if attempts.is_empty() {
        return "no applicable strategy".to_string();
    }
    attempts
        .iter()
        .map(|(strategy, err)| format!("{}: {}", strategy.as_str(), err))
        .collect::<Vec<_>>()
        .join("; ")
}
