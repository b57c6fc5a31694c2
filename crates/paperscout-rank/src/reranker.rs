//! Relevance reranking of candidate papers against a reference corpus.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use paperscout_common::{CorpusItem, Paper, RelevanceFactors, ScoredPaper};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::decay::recency_weights;
use crate::embedding::{EmbeddingConfig, EmbeddingProvider, l2_normalize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    pub embedding: EmbeddingConfig,
    /// Fallback score when similarity cannot be computed. Midpoint of the
    /// display range.
    pub neutral_score: f64,
    /// Upper bound of the display score range.
    pub score_scale: f64,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            neutral_score: 5.0,
            score_scale: 10.0,
        }
    }
}

/// Scores candidates by recency-weighted semantic similarity to the
/// corpus. Never fails: every degraded condition maps to defined output.
pub struct RelevanceReranker {
    provider: Arc<dyn EmbeddingProvider>,
    cfg: RerankConfig,
}

impl RelevanceReranker {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, cfg: RerankConfig) -> Self {
        Self { provider, cfg }
    }

    /// Rank candidates against the corpus, descending by score. Ties keep
    /// the original candidate order. Candidates without an abstract are
    /// dropped; an empty corpus yields the neutral score for everyone.
    pub fn rerank(&self, candidates: &[Paper], corpus: &[CorpusItem]) -> Vec<ScoredPaper> {
        self.rerank_at(candidates, corpus, Utc::now())
    }

    /// As [`rerank`](Self::rerank), with an explicit reference time for
    /// the recency weights.
    #[instrument(skip_all, fields(candidates = candidates.len(), corpus = corpus.len()))]
    pub fn rerank_at(
        &self,
        candidates: &[Paper],
        corpus: &[CorpusItem],
        now: DateTime<Utc>,
    ) -> Vec<ScoredPaper> {
        if candidates.is_empty() {
            return vec![];
        }

        let usable: Vec<&Paper> = candidates
            .iter()
            .filter(|p| !p.summary.trim().is_empty())
            .collect();
        if usable.is_empty() {
            debug!("no candidate has an abstract to embed");
            return vec![];
        }

        let corpus_items: Vec<&CorpusItem> = corpus
            .iter()
            .filter(|c| !c.abstract_text.trim().is_empty())
            .collect();
        if corpus_items.is_empty() {
            debug!("empty corpus, assigning neutral scores");
            return self.neutral(&usable);
        }

        let corpus_texts: Vec<String> = corpus_items
            .iter()
            .map(|c| c.abstract_text.clone())
            .collect();
        let paper_texts: Vec<String> = usable.iter().map(|p| p.summary.clone()).collect();

        let (corpus_vecs, paper_vecs) = match self.embed_both(&corpus_texts, &paper_texts) {
            Ok(pair) => pair,
            Err(err) => {
                warn!(%err, "embedding failed, falling back to neutral scores");
                return self.neutral(&usable);
            }
        };

        let corpus_dates: Vec<DateTime<Utc>> =
            corpus_items.iter().map(|c| c.date_added).collect();
        let weights = recency_weights(&corpus_dates, now);
        let corpus_size = corpus_items.len();

        let mut scored: Vec<ScoredPaper> = usable
            .iter()
            .zip(paper_vecs.iter())
            .map(|(paper, vec)| {
                let sims: Vec<f64> = corpus_vecs
                    .iter()
                    .map(|cv| dot(vec, cv))
                    .collect();
                let max_similarity = sims.iter().cloned().fold(f64::MIN, f64::max);
                let mean_similarity = sims.iter().sum::<f64>() / corpus_size as f64;
                let weighted: f64 = sims
                    .iter()
                    .zip(weights.iter())
                    .map(|(sim, w)| sim * w)
                    .sum();

                // rescale [-1, 1] similarity onto the display range
                let mut score = (weighted + 1.0) / 2.0 * self.cfg.score_scale;
                if !score.is_finite() {
                    score = self.cfg.neutral_score;
                }
                ScoredPaper {
                    paper: (*paper).clone(),
                    score: score.clamp(0.0, self.cfg.score_scale),
                    factors: RelevanceFactors {
                        max_similarity,
                        mean_similarity,
                        corpus_size,
                    },
                }
            })
            .collect();

        // stable: equal scores keep candidate order
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored
    }

    fn embed_both(
        &self,
        corpus_texts: &[String],
        paper_texts: &[String],
    ) -> Result<(Vec<Vec<f32>>, Vec<Vec<f32>>), crate::embedding::EmbedError> {
        let mut corpus_vecs = self.provider.embed_batch(corpus_texts)?;
        let mut paper_vecs = self.provider.embed_batch(paper_texts)?;
        for v in corpus_vecs.iter_mut().chain(paper_vecs.iter_mut()) {
            l2_normalize(v);
        }
        Ok((corpus_vecs, paper_vecs))
    }

    fn neutral(&self, papers: &[&Paper]) -> Vec<ScoredPaper> {
        papers
            .iter()
            .map(|p| ScoredPaper {
                paper: (*p).clone(),
                score: self.cfg.neutral_score,
                factors: RelevanceFactors::empty(),
            })
            .collect()
    }
}

/// Dot product of two unit vectors, i.e. their cosine similarity.
fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::StaticProvider;
    use chrono::TimeZone;

    fn paper(id: &str, summary: &str) -> Paper {
        Paper {
            arxiv_id: id.to_string(),
            title: format!("Paper {id}"),
            authors: vec!["Author".to_string()],
            summary: summary.to_string(),
            pdf_url: format!("https://arxiv.org/pdf/{id}.pdf"),
            published: None,
        }
    }

    fn corpus_item(abstract_text: &str, y: i32, m: u32, d: u32) -> CorpusItem {
        CorpusItem {
            abstract_text: abstract_text.to_string(),
            date_added: Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 12, 20, 12, 0, 0).unwrap()
    }

    fn reranker(provider: StaticProvider) -> RelevanceReranker {
        RelevanceReranker::new(Arc::new(provider), RerankConfig::default())
    }

    #[test]
    fn test_empty_candidates_yield_empty_result() {
        let r = reranker(StaticProvider::new(3));
        let corpus = vec![corpus_item("deep learning", 2023, 12, 1)];
        assert!(r.rerank_at(&[], &corpus, now()).is_empty());
    }

    #[test]
    fn test_empty_corpus_yields_neutral_scores() {
        let r = reranker(StaticProvider::new(3));
        let candidates = vec![paper("1", "abstract one"), paper("2", "abstract two")];
        let scored = r.rerank_at(&candidates, &[], now());
        assert_eq!(scored.len(), 2);
        for s in &scored {
            assert_eq!(s.score, 5.0);
            assert_eq!(s.factors.corpus_size, 0);
        }
    }

    #[test]
    fn test_candidates_without_abstract_are_dropped() {
        let r = reranker(StaticProvider::new(3).with("kept", vec![1.0, 0.0, 0.0]));
        let candidates = vec![paper("1", "kept"), paper("2", ""), paper("3", "   ")];
        let corpus = vec![corpus_item("kept", 2023, 12, 1)];
        let scored = r.rerank_at(&candidates, &corpus, now());
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].paper.arxiv_id, "1");
    }

    #[test]
    fn test_near_identical_abstract_ranks_highest() {
        // one candidate matches one corpus item exactly, the others are
        // orthogonal to everything
        let provider = StaticProvider::new(3)
            .with("match me", vec![1.0, 0.0, 0.0])
            .with("unrelated a", vec![0.0, 0.0, 0.0])
            .with("unrelated b", vec![0.0, 0.0, 0.0])
            .with("corpus hit", vec![1.0, 0.0, 0.0])
            .with("corpus other 1", vec![0.0, 1.0, 0.0])
            .with("corpus other 2", vec![0.0, 0.0, 1.0]);
        let r = reranker(provider);

        let candidates = vec![
            paper("a", "unrelated a"),
            paper("hit", "match me"),
            paper("b", "unrelated b"),
        ];
        let corpus = vec![
            corpus_item("corpus hit", 2023, 12, 1),
            corpus_item("corpus other 1", 2023, 12, 1),
            corpus_item("corpus other 2", 2023, 12, 1),
        ];

        let scored = r.rerank_at(&candidates, &corpus, now());
        assert_eq!(scored[0].paper.arxiv_id, "hit");
        assert!((scored[0].factors.max_similarity - 1.0).abs() < 1e-6);
        assert!((scored[0].factors.mean_similarity - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(scored[0].factors.corpus_size, 3);
        assert!(scored[0].score > scored[1].score);
    }

    #[test]
    fn test_embedding_failure_degrades_to_neutral() {
        let r = reranker(StaticProvider::failing());
        let candidates = vec![paper("1", "one"), paper("2", "two")];
        let corpus = vec![corpus_item("anything", 2023, 12, 1)];
        let scored = r.rerank_at(&candidates, &corpus, now());
        assert_eq!(scored.len(), 2);
        for s in &scored {
            assert_eq!(s.score, 5.0);
            assert_eq!(s.factors, RelevanceFactors::empty());
        }
    }

    #[test]
    fn test_output_sorted_descending_and_stable() {
        let provider = StaticProvider::new(2)
            .with("hot", vec![1.0, 0.0])
            .with("cold a", vec![0.0, 0.0])
            .with("cold b", vec![0.0, 0.0])
            .with("reference", vec![1.0, 0.0]);
        let r = reranker(provider);

        let candidates = vec![
            paper("cold1", "cold a"),
            paper("top", "hot"),
            paper("cold2", "cold b"),
        ];
        let corpus = vec![corpus_item("reference", 2023, 12, 1)];
        let scored = r.rerank_at(&candidates, &corpus, now());

        let scores: Vec<f64> = scored.iter().map(|s| s.score).collect();
        let mut sorted = scores.clone();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_eq!(scores, sorted);

        // equal-scored candidates keep their input order
        assert_eq!(scored[0].paper.arxiv_id, "top");
        assert_eq!(scored[1].paper.arxiv_id, "cold1");
        assert_eq!(scored[2].paper.arxiv_id, "cold2");
    }

    #[test]
    fn test_recency_weight_shifts_the_score() {
        // same similarity pattern, but the matching corpus item is recent
        // in one corpus and stale in the other
        let provider = StaticProvider::new(2)
            .with("candidate", vec![1.0, 0.0])
            .with("similar", vec![1.0, 0.0])
            .with("different", vec![0.0, 1.0]);
        let r = reranker(provider);
        let candidates = vec![paper("1", "candidate")];

        let recent_match = vec![
            corpus_item("similar", 2023, 12, 19),
            corpus_item("different", 2022, 1, 1),
        ];
        let stale_match = vec![
            corpus_item("similar", 2022, 1, 1),
            corpus_item("different", 2023, 12, 19),
        ];

        let recent = r.rerank_at(&candidates, &recent_match, now());
        let stale = r.rerank_at(&candidates, &stale_match, now());
        assert!(recent[0].score > stale[0].score);
    }

    #[test]
    fn test_rerank_is_deterministic() {
        let provider = StaticProvider::new(2)
            .with("a", vec![0.8, 0.2])
            .with("b", vec![0.1, 0.9])
            .with("c1", vec![0.5, 0.5])
            .with("c2", vec![0.9, 0.1]);
        let r = reranker(provider);
        let candidates = vec![paper("1", "a"), paper("2", "b")];
        let corpus = vec![
            corpus_item("c1", 2023, 6, 1),
            corpus_item("c2", 2023, 12, 1),
        ];

        let first = r.rerank_at(&candidates, &corpus, now());
        let second = r.rerank_at(&candidates, &corpus, now());
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.paper.arxiv_id, b.paper.arxiv_id);
            assert_eq!(a.score, b.score);
            assert_eq!(a.factors, b.factors);
        }
    }

    #[test]
    fn test_scores_are_always_finite() {
        let provider = StaticProvider::new(2).with("x", vec![1.0, 0.0]);
        let r = reranker(provider);
        let candidates = vec![paper("1", "x"), paper("2", "unseen text")];
        let corpus = vec![corpus_item("also unseen", 2023, 12, 1)];
        for s in r.rerank_at(&candidates, &corpus, now()) {
            assert!(s.score.is_finite());
            assert!(s.score >= 0.0 && s.score <= 10.0);
        }
    }
}
