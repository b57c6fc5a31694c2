//! Fetch orchestration: ordered strategy fallback with bounded retries.

use std::collections::HashSet;
use std::time::Instant;

use paperscout_common::{
    AllowlistClient, FetchError, FetchResult, Paper, QuerySpec, SourceError, Strategy,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::retry::{backoff_delay, classify, rate_limit_delay, ErrorClass};
use crate::sources::{
    api::ArxivApiSearch, feed::RssFeedPoll, scrape::SearchPageScraper, FetchStrategy,
};

/// Fixed cap applied to the final paper list when `QuerySpec::debug` is set.
pub const DEBUG_RESULT_CAP: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Retries per strategy beyond the first attempt.
    pub max_retries: u32,
    /// Base backoff delay; doubles with each failed attempt.
    pub retry_delay: Duration,
    /// Whether the page-scrape fallback joins the strategy chain.
    pub enable_fallback_scrape: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            enable_fallback_scrape: true,
        }
    }
}

/// Sequences the retrieval strategies in fixed priority order: index
/// search, then feed poll, then (if enabled) page scrape.
pub struct FetchOrchestrator {
    strategies: Vec<Box<dyn FetchStrategy>>,
    cfg: FetchConfig,
}

impl FetchOrchestrator {
    /// Orchestrator over the standard strategy chain.
    pub fn new(cfg: FetchConfig) -> Result<Self, SourceError> {
        let client = AllowlistClient::new()?;
        let mut strategies: Vec<Box<dyn FetchStrategy>> = vec![
            Box::new(ArxivApiSearch::new(client.clone())),
            Box::new(RssFeedPoll::new(client.clone())),
        ];
        if cfg.enable_fallback_scrape {
            strategies.push(Box::new(SearchPageScraper::new(client)));
        }
        Ok(Self { strategies, cfg })
    }

    /// Orchestrator over a caller-supplied strategy chain.
    pub fn with_strategies(strategies: Vec<Box<dyn FetchStrategy>>, cfg: FetchConfig) -> Self {
        Self { strategies, cfg }
    }

    /// Run the fallback chain. Fails only when every applicable strategy
    /// has exhausted its retries without a single successful attempt; an
    /// attempt that returns zero papers is a success and halts fallback.
    #[instrument(skip(self, spec), fields(categories = %spec.category_filter(), max_results = spec.max_results))]
    pub async fn fetch(&self, spec: &QuerySpec) -> Result<FetchResult, FetchError> {
        spec.validate()?;
        let started = Instant::now();
        let mut total_retries = 0u32;
        let mut attempts: Vec<(Strategy, SourceError)> = Vec::new();

        for strategy in &self.strategies {
            let kind = strategy.kind();
            if !strategy.applicable(spec) {
                debug!(strategy = kind.as_str(), "strategy not applicable, skipping");
                continue;
            }

            match self
                .run_strategy(strategy.as_ref(), spec, &mut total_retries)
                .await
            {
                Ok(papers) => {
                    let papers = finalize(papers, spec);
                    let result = FetchResult {
                        papers,
                        strategy: kind,
                        elapsed: started.elapsed(),
                        retry_count: total_retries,
                    };
                    info!(
                        strategy = kind.as_str(),
                        papers = result.papers.len(),
                        retries = result.retry_count,
                        elapsed_ms = result.elapsed.as_millis() as u64,
                        "fetch complete"
                    );
                    return Ok(result);
                }
                Err(err) => {
                    warn!(strategy = kind.as_str(), %err, "strategy failed, falling through");
                    attempts.push((kind, err));
                }
            }
        }

        Err(FetchError::AllStrategiesExhausted { attempts })
    }

    /// Up to `max_retries + 1` attempts on one strategy, sleeping the
    /// backoff schedule between retryable failures. A fatal classification
    /// ends the strategy immediately without consuming further retries.
    async fn run_strategy(
        &self,
        strategy: &dyn FetchStrategy,
        spec: &QuerySpec,
        total_retries: &mut u32,
    ) -> Result<Vec<Paper>, SourceError> {
        let mut attempt = 0u32;
        loop {
            match strategy.attempt(spec).await {
                Ok(papers) => return Ok(papers),
                Err(err) => {
                    if classify(&err) == ErrorClass::Fatal || attempt >= self.cfg.max_retries {
                        return Err(err);
                    }
                    let delay = match &err {
                        SourceError::RateLimited(_) => rate_limit_delay(attempt, self.cfg.retry_delay),
                        _ => backoff_delay(attempt, self.cfg.retry_delay),
                    };
                    debug!(
                        strategy = strategy.kind().as_str(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %err,
                        "retryable failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    *total_retries += 1;
                    attempt += 1;
                }
            }
        }
    }
}

/// Enforce the FetchResult invariants on the winning strategy's output:
/// unique identifiers (order-preserving), `max_results`, then the debug cap.
fn finalize(papers: Vec<Paper>, spec: &QuerySpec) -> Vec<Paper> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut unique: Vec<Paper> = papers
        .into_iter()
        .filter(|p| seen.insert(p.arxiv_id.clone()))
        .collect();
    unique.truncate(spec.max_results);
    if spec.debug {
        unique.truncate(DEBUG_RESULT_CAP);
    }
    unique
}

/// Convenience wrapper: run the standard chain once and return the papers.
pub async fn fetch_papers(spec: &QuerySpec) -> Result<Vec<Paper>, FetchError> {
    let orchestrator = FetchOrchestrator::new(FetchConfig::default())
        .map_err(|err| FetchError::AllStrategiesExhausted {
            attempts: vec![(Strategy::Primary, err)],
        })?;
    Ok(orchestrator.fetch(spec).await?.papers)
}
