//! Fan-out/fan-in over the enabled citation sources.
//!
//! Every source runs concurrently under its own timeout and panic guard, so a
//! slow, failing, or buggy provider only costs its own results. When nothing
//! comes back the static demo set stands in.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::join_all;
use lexcite_core::{CitationCandidate, SearchConfig, SourceProvider, filter_demo};
use lexcite_sources::{
    CitationSource, CourtListenerClient, FederalRegisterClient, GovInfoClient, ProviderError,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// Why one source contributed nothing. Informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    /// `None` when the failure happened outside any single source.
    pub provider: Option<SourceProvider>,
    pub message: String,
    pub http_status: Option<u16>,
    pub rate_limited: bool,
    pub timed_out: bool,
}

impl From<&ProviderError> for SourceFailure {
    fn from(e: &ProviderError) -> Self {
        Self {
            provider: Some(e.provider()),
            message: e.to_string(),
            http_status: e.http_status(),
            rate_limited: e.is_rate_limited(),
            timed_out: e.is_timeout(),
        }
    }
}

impl SourceFailure {
    fn panicked(provider: Option<SourceProvider>, payload: &(dyn Any + Send)) -> Self {
        Self {
            provider,
            message: format!("panicked: {}", panic_message(payload)),
            http_status: None,
            rate_limited: false,
            timed_out: false,
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Result of one aggregated search.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub suggestions: Vec<CitationCandidate>,
    /// Providers that returned at least one result, or `[demo]`.
    pub sources: Vec<SourceProvider>,
    pub is_demo: bool,
    pub errors: Vec<SourceFailure>,
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub max_results: usize,
    pub use_demo_fallback: bool,
    /// Trimmed queries shorter than this return nothing without any calls.
    pub min_query_len: usize,
    pub source_timeout: Duration,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for SearchOptions {
    fn from(config: &SearchConfig) -> Self {
        Self {
            max_results: config.max_results,
            use_demo_fallback: config.use_demo_fallback,
            min_query_len: config.min_query_len,
            source_timeout: config.request_timeout(),
        }
    }
}

pub struct Aggregator {
    sources: Vec<Arc<dyn CitationSource>>,
    options: SearchOptions,
}

impl Aggregator {
    /// `sources` order is the tie-break order for equal scores.
    pub fn new(sources: Vec<Arc<dyn CitationSource>>, options: SearchOptions) -> Self {
        Self { sources, options }
    }

    /// Build the enabled HTTP adapters: Federal Register, CourtListener,
    /// GovInfo, in that order, sharing one connection pool.
    pub fn from_config(config: &SearchConfig) -> Self {
        let client = reqwest::Client::new();
        let mut sources: Vec<Arc<dyn CitationSource>> = Vec::new();
        if config.federal_register.enabled {
            sources.push(Arc::new(FederalRegisterClient::new(
                client.clone(),
                &config.federal_register,
            )));
        }
        if config.courtlistener.enabled {
            sources.push(Arc::new(CourtListenerClient::new(
                client.clone(),
                &config.courtlistener,
            )));
        }
        if config.govinfo.enabled {
            sources.push(Arc::new(GovInfoClient::new(client, &config.govinfo)));
        }
        Self::new(sources, SearchOptions::from(config))
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    pub fn providers(&self) -> Vec<SourceProvider> {
        self.sources.iter().map(|s| s.provider()).collect()
    }

    /// Search with the configured result limit.
    pub async fn search(&self, query: &str) -> SearchOutcome {
        self.search_with_limit(query, self.options.max_results).await
    }

    /// Search all sources and merge. Never fails: source errors are reported
    /// in [`SearchOutcome::errors`].
    pub async fn search_with_limit(&self, query: &str, max_results: usize) -> SearchOutcome {
        if query.trim().chars().count() < self.options.min_query_len {
            debug!(query, "query below minimum length, skipping search");
            return SearchOutcome::default();
        }

        match AssertUnwindSafe(self.collect(query, max_results))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(payload) => {
                let failure = SourceFailure::panicked(None, payload.as_ref());
                error!(query, error = %failure.message, "aggregation failed");
                self.fallback(query, max_results, vec![failure])
            }
        }
    }

    async fn collect(&self, query: &str, max_results: usize) -> SearchOutcome {
        let timeout = self.options.source_timeout;
        let calls = self.sources.iter().map(|source| {
            let provider = source.provider();
            let limit = source.page_size(max_results);
            async move {
                let guarded = AssertUnwindSafe(tokio::time::timeout(
                    timeout,
                    source.search(query, limit),
                ))
                .catch_unwind()
                .await;
                let result = match guarded {
                    Ok(Ok(result)) => result.map_err(|e| SourceFailure::from(&e)),
                    Ok(Err(_elapsed)) => Err(SourceFailure::from(&ProviderError::Timeout {
                        provider,
                        after: timeout,
                    })),
                    Err(payload) => Err(SourceFailure::panicked(Some(provider), payload.as_ref())),
                };
                (provider, result)
            }
        });
        let outcomes = join_all(calls).await;

        let mut merged = Vec::new();
        let mut used = Vec::new();
        let mut errors = Vec::new();
        for (provider, result) in outcomes {
            match result {
                Ok(found) => {
                    debug!(%provider, count = found.len(), "source returned");
                    if !found.is_empty() {
                        used.push(provider);
                        merged.extend(found);
                    }
                }
                Err(failure) => {
                    warn!(%provider, error = %failure.message, "source failed");
                    errors.push(failure);
                }
            }
        }

        if merged.is_empty() && self.options.use_demo_fallback {
            return self.fallback(query, max_results, errors);
        }

        // Stable: equal scores keep source order.
        merged.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));
        merged.truncate(max_results);
        info!(
            query,
            count = merged.len(),
            sources = used.len(),
            errors = errors.len(),
            "search complete"
        );
        SearchOutcome {
            suggestions: merged,
            sources: used,
            is_demo: false,
            errors,
        }
    }

    fn fallback(
        &self,
        query: &str,
        max_results: usize,
        errors: Vec<SourceFailure>,
    ) -> SearchOutcome {
        if !self.options.use_demo_fallback {
            return SearchOutcome {
                errors,
                ..Default::default()
            };
        }
        let mut suggestions = filter_demo(query);
        suggestions.truncate(max_results);
        info!(query, count = suggestions.len(), "using demo suggestions");
        SearchOutcome {
            suggestions,
            sources: vec![SourceProvider::Demo],
            is_demo: true,
            errors,
        }
    }
}
