//! Place resolver
//!
//! Debounced place-name search against the geocoder. Every call to
//! [`PlaceResolver::search`] bumps a generation counter; a lookup only
//! commits when its generation is still the latest one, so responses to
//! superseded queries are dropped regardless of arrival order. The HTTP
//! call itself is never aborted.

use crate::api::GeocodingApi;
use crate::config::SearchConfig;
use crate::error::SearchCondition;
use crate::models::{GeocodeCandidate, Location};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// What the search box shows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolverState {
    /// Query text as last entered, or the label of the selected place
    pub query: String,
    pub candidates: Vec<GeocodeCandidate>,
    pub condition: Option<SearchCondition>,
}

#[derive(Clone)]
pub struct PlaceResolver {
    inner: Arc<Inner>,
}

struct Inner {
    api: Arc<dyn GeocodingApi>,
    debounce: Duration,
    min_query_length: usize,
    max_results: usize,
    generation: AtomicU64,
    closed: AtomicBool,
    state: watch::Sender<ResolverState>,
}

impl PlaceResolver {
    pub fn new(api: Arc<dyn GeocodingApi>, config: &SearchConfig) -> Self {
        let (state, _) = watch::channel(ResolverState::default());
        Self {
            inner: Arc::new(Inner {
                api,
                debounce: config.debounce(),
                min_query_length: config.min_query_length,
                max_results: config.max_results,
                generation: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                state,
            }),
        }
    }

    /// Debounced search. Only the latest query issues a request once input
    /// has been quiet for the debounce window.
    ///
    /// Must be called from within a tokio runtime.
    pub fn search(&self, query: &str) {
        self.schedule(query, Some(self.inner.debounce));
    }

    /// Search immediately, skipping the debounce window
    pub fn submit(&self, query: &str) {
        self.schedule(query, None);
    }

    /// Take a candidate. Clears the list and any condition, and shows the
    /// candidate's label as the query text.
    pub fn select(&self, candidate: &GeocodeCandidate) -> Location {
        let label = candidate.label();
        self.inner.state.send_modify(|state| {
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            state.query = label.clone();
            state.candidates.clear();
            state.condition = None;
        });
        info!("Selected {}", label);
        Location::from(candidate.clone())
    }

    /// Select the candidate at `index` of the visible list
    pub fn select_index(&self, index: usize) -> Option<Location> {
        let candidate = self.inner.state.borrow().candidates.get(index).cloned()?;
        Some(self.select(&candidate))
    }

    #[must_use]
    pub fn state(&self) -> ResolverState {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ResolverState> {
        self.inner.state.subscribe()
    }

    /// Permanently disable commits from pending and future lookups
    pub fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        debug!("Place resolver shut down");
    }

    fn schedule(&self, query: &str, delay: Option<Duration>) {
        if self.inner.closed.load(Ordering::SeqCst) {
            return;
        }

        let trimmed = query.trim().to_string();
        let too_short = trimmed.chars().count() < self.inner.min_query_length;
        let mut generation = 0;
        self.inner.state.send_modify(|state| {
            generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            state.query = query.to_string();
            if too_short {
                state.candidates.clear();
                state.condition = None;
            }
        });

        if too_short {
            debug!("Query '{}' too short, cleared results", trimmed);
            return;
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            inner.lookup(generation, &trimmed).await;
        });
    }
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.generation.load(Ordering::SeqCst) == generation
    }

    async fn lookup(&self, generation: u64, query: &str) {
        if !self.is_current(generation) {
            return;
        }

        debug!("Geocoding '{}'", query);
        let outcome = self.api.search(query).await;

        let committed = self.state.send_if_modified(|state| {
            // Checked under the state lock, which is also where new queries
            // bump the generation
            if !self.is_current(generation) {
                return false;
            }
            match outcome {
                Ok(mut candidates) if !candidates.is_empty() => {
                    candidates.truncate(self.max_results);
                    state.candidates = candidates;
                    state.condition = None;
                }
                Ok(_) => {
                    state.candidates.clear();
                    state.condition = Some(SearchCondition::NoResults);
                }
                Err(ref e) => {
                    warn!("Geocoding '{}' failed: {}", query, e);
                    state.candidates.clear();
                    state.condition = Some(SearchCondition::FailedGeocode);
                }
            }
            true
        });

        if !committed {
            debug!("Discarding geocoding response for superseded query '{}'", query);
        }
    }
}
