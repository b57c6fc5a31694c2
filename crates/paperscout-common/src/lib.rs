//! paperscout-common — shared types, errors, and the capped HTTP client
//! used across all paperscout crates.

pub mod error;
pub mod models;
pub mod net;

// Re-export commonly used types
pub use error::{FetchError, SourceError};
pub use models::{
    CorpusItem, DateWindow, FetchResult, Paper, QuerySpec, RelevanceFactors, ScoredPaper, Strategy,
};
pub use net::AllowlistClient;
