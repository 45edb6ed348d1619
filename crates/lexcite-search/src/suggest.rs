//! Debounced citation suggestions for a live editor.
//!
//! Every text change re-runs trigger detection. A searchable trigger starts a
//! quiet-period timer; further changes restart it, so a burst of keystrokes
//! produces one search for the final text. Each change also advances a
//! generation counter, and a finished search only publishes its results if
//! no newer change has happened since it was scheduled. Late responses are
//! dropped, never shown.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use lexcite_core::{CitationCandidate, SourceProvider, Splice, TriggerDetector, TriggerMatch};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::aggregator::{Aggregator, SearchOutcome, panic_message};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("citation search failed: {0}")]
    Backend(String),
    #[error("citation search panicked: {0}")]
    Panicked(String),
}

/// Whatever answers a suggestion query.
#[async_trait]
pub trait CitationSearch: Send + Sync {
    async fn search_citations(&self, query: &str) -> Result<SearchOutcome, SearchError>;
}

#[async_trait]
impl CitationSearch for Aggregator {
    async fn search_citations(&self, query: &str) -> Result<SearchOutcome, SearchError> {
        Ok(self.search(query).await)
    }
}

/// What the suggestion dropdown should currently show.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuggestionState {
    /// Generation of the text change this state belongs to.
    pub generation: u64,
    /// Active trigger; `None` means the dropdown is closed.
    pub trigger: Option<TriggerMatch>,
    pub loading: bool,
    pub suggestions: Vec<CitationCandidate>,
    pub sources: Vec<SourceProvider>,
    pub is_demo: bool,
    /// Set when the last search failed outright.
    pub error: Option<String>,
}

impl SuggestionState {
    pub fn is_open(&self) -> bool {
        self.trigger.is_some()
    }
}

pub struct SuggestionEngine {
    inner: Arc<Inner>,
}

struct Inner {
    detector: TriggerDetector,
    backend: Arc<dyn CitationSearch>,
    debounce: Duration,
    generation: AtomicU64,
    /// Debounce timer that has not fired yet.
    pending: Mutex<Option<JoinHandle<()>>>,
    state: watch::Sender<SuggestionState>,
}

impl SuggestionEngine {
    pub fn new(
        detector: TriggerDetector,
        backend: Arc<dyn CitationSearch>,
        debounce: Duration,
    ) -> Self {
        let (state, _) = watch::channel(SuggestionState::default());
        Self {
            inner: Arc::new(Inner {
                detector,
                backend,
                debounce,
                generation: AtomicU64::new(0),
                pending: Mutex::new(None),
                state,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SuggestionState> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> SuggestionState {
        self.inner.state.borrow().clone()
    }

    /// Feed the full editor text and cursor (byte offset) after an edit.
    ///
    /// Must be called from within a Tokio runtime. Returns the searchable
    /// trigger, if any.
    pub fn on_text_change(&self, text: &str, cursor: usize) -> Option<TriggerMatch> {
        let trigger = self
            .inner
            .detector
            .detect(text, cursor)
            .filter(TriggerMatch::is_searchable);
        let generation = self.inner.advance();

        let Some(trigger) = trigger else {
            self.inner.state.send_replace(SuggestionState {
                generation,
                ..Default::default()
            });
            return None;
        };

        self.inner.state.send_modify(|s| {
            s.generation = generation;
            s.trigger = Some(trigger.clone());
            s.loading = true;
            s.error = None;
        });

        let inner = Arc::clone(&self.inner);
        let query = trigger.query.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            if inner.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            // Detached: a later edit must not abort a request already on the wire.
            tokio::spawn(inner.run_search(generation, query));
        });
        *self.inner.lock_pending() = Some(timer);

        debug!(
            generation,
            query = %trigger.query,
            rule = trigger.rule,
            "suggestion search scheduled"
        );
        Some(trigger)
    }

    /// Close the dropdown (Escape). Results still in flight are discarded.
    pub fn dismiss(&self) {
        let generation = self.inner.advance();
        self.inner.state.send_replace(SuggestionState {
            generation,
            ..Default::default()
        });
    }

    /// Insert suggestion `index` over the active trigger span and close the
    /// dropdown.
    pub fn accept(&self, text: &str, cursor: usize, index: usize) -> Option<Splice> {
        let (trigger, citation) = {
            let state = self.inner.state.borrow();
            let trigger = state.trigger.clone()?;
            let citation = state.suggestions.get(index)?.insertion_text().to_string();
            (trigger, citation)
        };
        let splice = trigger.splice(text, cursor, &citation);
        self.dismiss();
        Some(splice)
    }
}

impl Drop for SuggestionEngine {
    fn drop(&mut self) {
        if let Some(timer) = self.inner.lock_pending().take() {
            timer.abort();
        }
    }
}

impl Inner {
    /// Start a new generation and cancel any timer that has not fired.
    fn advance(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(timer) = self.lock_pending().take() {
            timer.abort();
        }
        generation
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_search(self: Arc<Self>, generation: u64, query: String) {
        debug!(generation, query = %query, "searching");
        let result = AssertUnwindSafe(self.backend.search_citations(&query))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(SearchError::Panicked(panic_message(payload.as_ref()))));

        if let Err(e) = &result {
            warn!(generation, error = %e, "suggestion search failed");
        }

        let published = self.state.send_if_modified(|s| {
            let latest = self.generation.load(Ordering::SeqCst);
            if s.generation != generation || latest != generation {
                return false;
            }
            match &result {
                Ok(outcome) => {
                    s.suggestions = outcome.suggestions.clone();
                    s.sources = outcome.sources.clone();
                    s.is_demo = outcome.is_demo;
                    s.error = None;
                }
                Err(e) => {
                    s.suggestions.clear();
                    s.sources.clear();
                    s.is_demo = false;
                    s.error = Some(e.to_string());
                }
            }
            s.loading = false;
            true
        });
        if !published {
            debug!(generation, "discarding stale suggestion results");
        }
    }
}
