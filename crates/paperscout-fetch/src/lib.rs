//! paperscout-fetch — resilient multi-strategy paper retrieval.
//!
//! Strategies are tried in a fixed priority order (index search, feed poll,
//! page scrape), each with bounded retries and exponential backoff. The
//! first strategy whose attempt returns normally wins; only total
//! exhaustion across the chain is surfaced to the caller.

pub mod fetcher;
pub mod retry;
pub mod sources;

pub use fetcher::{fetch_papers, FetchConfig, FetchOrchestrator, DEBUG_RESULT_CAP};
pub use retry::{backoff_delay, classify, rate_limit_delay, ErrorClass};
pub use sources::FetchStrategy;
