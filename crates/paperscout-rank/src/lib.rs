//! paperscout-rank — corpus-relevance reranking.
//!
//! Scores candidate papers against a reader's reference corpus using
//! semantic similarity with recency weighting, and orders them by score.
//! Never fails the pipeline: embedding trouble degrades to a neutral
//! score for every candidate.

pub mod decay;
pub mod embedding;
pub mod reranker;

pub use decay::recency_weights;
pub use embedding::{EmbedError, EmbeddingConfig, EmbeddingProvider, StaticProvider};
pub use reranker::{RelevanceReranker, RerankConfig};

#[cfg(feature = "local-embeddings")]
pub use embedding::FastEmbedProvider;
