//! Error classification and backoff schedule shared by all strategies.
//!
//! Keeping this a pair of pure functions makes retry decisions an explicit,
//! testable branch in the orchestrator rather than implicit error dispatch.

use std::time::Duration;

use paperscout_common::SourceError;

/// Whether an attempt failure is worth retrying on the same strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Retryable,
    Fatal,
}

/// Classify a source error.
///
/// Transient network failures, timeouts, and explicit rate-limit signals
/// are retryable; malformed requests and local parse/allowlist failures
/// are fatal for the current strategy.
pub fn classify(err: &SourceError) -> ErrorClass {
    match err {
        SourceError::Network(_) | SourceError::Timeout(_) | SourceError::RateLimited(_) => {
            ErrorClass::Retryable
        }
        SourceError::MalformedRequest(_) | SourceError::Parse(_) | SourceError::Blocked(_) => {
            ErrorClass::Fatal
        }
    }
}

/// Exponential backoff: `base * 2^attempt`, attempt counted from zero.
pub fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    base * 2u32.saturating_pow(attempt.min(16))
}

/// Backoff for rate-limit errors: one extra doubling over the default
/// schedule, so it escalates at least as fast.
pub fn rate_limit_delay(attempt: u32, base: Duration) -> Duration {
    backoff_delay(attempt.saturating_add(1), base)
}
