//! Embedding provider abstraction and the local fastembed backend.
//!
//! The reranker talks to a trait object, so hosts inject the provider and
//! tests can swap in deterministic or failing implementations. The
//! fastembed backend lazily initializes the model once per provider
//! instance and reuses it for the process lifetime.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding model initialization failed: {0}")]
    Init(String),

    #[error("embedding failed: {0}")]
    Backend(String),
}

/// Blocking text-to-vector provider. Batch-oriented for throughput; the
/// backend may parallelize internally.
pub trait EmbeddingProvider: Send + Sync {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model code understood by the backend.
    pub model: String,
    /// Directory for persisted model weights; backend default when unset.
    pub cache_dir: Option<PathBuf>,
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            cache_dir: None,
            batch_size: 32,
        }
    }
}

/// Scale a vector to unit length so cosine similarity reduces to a dot
/// product. Zero vectors stay put (floor avoids division blow-up).
pub fn l2_normalize(v: &mut [f32]) {
    let norm = l2_norm(v);
    for x in v.iter_mut() {
        *x /= norm;
    }
}

pub(crate) fn l2_norm(v: &[f32]) -> f32 {
    let s: f32 = v.iter().map(|x| x * x).sum();
    s.sqrt().max(1e-10)
}

// ── fastembed backend ─────────────────────────────────────────────────────────

#[cfg(feature = "local-embeddings")]
pub use fastembed_backend::FastEmbedProvider;

#[cfg(feature = "local-embeddings")]
mod fastembed_backend {
    use super::{EmbedError, EmbeddingConfig, EmbeddingProvider};
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::Mutex;
    use tracing::info;

    /// Local ONNX embedding backend. The model is loaded on first use and
    /// held for the life of the provider; the mutex guarantees a single
    /// initialization even under concurrent first calls.
    pub struct FastEmbedProvider {
        cfg: EmbeddingConfig,
        model: Mutex<Option<TextEmbedding>>,
    }

    impl FastEmbedProvider {
        pub fn new(cfg: EmbeddingConfig) -> Self {
            Self {
                cfg,
                model: Mutex::new(None),
            }
        }

        fn resolve_model(code: &str) -> EmbeddingModel {
            TextEmbedding::list_supported_models()
                .into_iter()
                .find(|info| info.model_code == code)
                .map(|info| info.model)
                .unwrap_or(EmbeddingModel::AllMiniLML6V2)
        }
    }

    impl EmbeddingProvider for FastEmbedProvider {
        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            let mut guard = self
                .model
                .lock()
                .map_err(|_| EmbedError::Backend("embedding model lock poisoned".into()))?;

            if guard.is_none() {
                info!(model = %self.cfg.model, "initializing embedding model");
                let mut options = InitOptions::new(Self::resolve_model(&self.cfg.model));
                if let Some(dir) = &self.cfg.cache_dir {
                    options = options.with_cache_dir(dir.clone());
                }
                let model = TextEmbedding::try_new(options)
                    .map_err(|e| EmbedError::Init(e.to_string()))?;
                *guard = Some(model);
            }

            let model = guard
                .as_mut()
                .ok_or_else(|| EmbedError::Init("embedding model unavailable".into()))?;
            model
                .embed(texts.to_vec(), Some(self.cfg.batch_size))
                .map_err(|e| EmbedError::Backend(e.to_string()))
        }
    }
}

// ── Static provider for deterministic scoring and tests ───────────────────────

/// Provider backed by a fixed text→vector table. Unknown texts map to the
/// zero vector of the configured dimension.
pub struct StaticProvider {
    vectors: std::collections::HashMap<String, Vec<f32>>,
    dim: usize,
    failing: bool,
}

impl StaticProvider {
    pub fn new(dim: usize) -> Self {
        Self {
            vectors: std::collections::HashMap::new(),
            dim,
            failing: false,
        }
    }

    /// Register the vector returned for a given text.
    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    /// Provider whose every call fails, for degraded-path tests.
    pub fn failing() -> Self {
        Self {
            vectors: std::collections::HashMap::new(),
            dim: 0,
            failing: true,
        }
    }
}

impl EmbeddingProvider for StaticProvider {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if self.failing {
            return Err(EmbedError::Backend("static provider set to fail".into()));
        }
        Ok(texts
            .iter()
            .map(|t| {
                self.vectors
                    .get(t)
                    .cloned()
                    .unwrap_or_else(|| vec![0.0; self.dim])
            })
            .collect())
    }
}
