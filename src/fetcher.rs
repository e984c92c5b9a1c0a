//! Forecast fetcher
//!
//! Holds the current [`ForecastQuery`] and drives the
//! `Idle -> Loading -> Success | Failed` state machine. Each new query (or
//! explicit re-fetch) starts a new generation; a fetch commits its outcome
//! only if no newer generation has started in the meantime, and a retry
//! loop gives up as soon as its generation is stale.

use crate::api::ForecastApi;
use crate::config::DashboardConfig;
use crate::materialize::decode_forecast;
use crate::models::weather::{DAILY_VARIABLES, HOURLY_VARIABLES};
use crate::models::{FetchState, ForecastQuery, ForecastResult};
use crate::{DashboardError, Result};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_STEP_MS: u64 = 500;
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Bounded retry with linear backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after failed attempt `n` is `backoff_step * n`
    pub backoff_step: Duration,
    /// Upper bound for a single attempt
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_step: Duration::from_millis(DEFAULT_BACKOFF_STEP_MS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &DashboardConfig) -> Self {
        Self {
            max_attempts: config.fetch.max_attempts,
            backoff_step: Duration::from_millis(config.fetch.backoff_step_ms),
            timeout: config.api.forecast_timeout(),
        }
    }

    /// Delay before the attempt following failed attempt `attempt` (1-based)
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt)
    }
}

/// One request with the per-attempt timeout applied, decoded on success
async fn fetch_once(
    api: &dyn ForecastApi,
    query: &ForecastQuery,
    timeout: Duration,
) -> Result<ForecastResult> {
    let response = tokio::time::timeout(timeout, api.forecast(query))
        .await
        .map_err(|_| DashboardError::Timeout {
            seconds: timeout.as_secs(),
        })??;

    Ok(decode_forecast(
        &response,
        &HOURLY_VARIABLES,
        &DAILY_VARIABLES,
        query.units,
        Utc::now(),
    ))
}

/// Fetch with bounded retries.
///
/// `still_relevant` is consulted before every attempt; once it returns
/// false the loop stops with [`DashboardError::Superseded`] and no further
/// request is issued.
pub async fn fetch_with_retry<F>(
    api: &dyn ForecastApi,
    query: &ForecastQuery,
    policy: &RetryPolicy,
    still_relevant: F,
) -> Result<ForecastResult>
where
    F: Fn() -> bool,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        if !still_relevant() {
            debug!(attempt, "Query superseded, abandoning fetch");
            return Err(DashboardError::Superseded);
        }

        match fetch_once(api, query, policy.timeout).await {
            Ok(result) => {
                if attempt > 1 {
                    info!("Forecast fetch succeeded on attempt {}", attempt);
                }
                return Ok(result);
            }
            Err(e) if attempt >= attempts => {
                error!("Forecast fetch failed after {} attempts: {}", attempts, e);
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    "Forecast attempt {} of {} failed: {}, retrying in {:?}",
                    attempt, attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[derive(Clone)]
pub struct ForecastFetcher {
    inner: Arc<Inner>,
}

struct Inner {
    api: Arc<dyn ForecastApi>,
    policy: RetryPolicy,
    query: Mutex<Option<ForecastQuery>>,
    generation: AtomicU64,
    closed: AtomicBool,
    state: watch::Sender<FetchState>,
}

impl ForecastFetcher {
    pub fn new(api: Arc<dyn ForecastApi>, policy: RetryPolicy) -> Self {
        let (state, _) = watch::channel(FetchState::Idle);
        Self {
            inner: Arc::new(Inner {
                api,
                policy,
                query: Mutex::new(None),
                generation: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                state,
            }),
        }
    }

    /// Point the fetcher at a new query.
    ///
    /// `None` drops any result and goes back to `Idle`. A query equal to
    /// the current one changes nothing. Anything else supersedes whatever
    /// is in flight and starts loading.
    pub fn set_query(&self, query: Option<ForecastQuery>) {
        if self.inner.closed.load(Ordering::SeqCst) {
            return;
        }

        let mut current = self.inner.query.lock();
        if *current == query {
            debug!("Forecast query unchanged");
            return;
        }
        *current = query.clone();

        match query {
            Some(query) => self.inner.start(query),
            None => {
                self.inner.state.send_modify(|state| {
                    self.inner.generation.fetch_add(1, Ordering::SeqCst);
                    *state = FetchState::Idle;
                });
                debug!("Forecast query cleared, fetcher idle");
            }
        }
    }

    /// Re-issue the current query, if any
    pub fn refetch(&self) {
        if self.inner.closed.load(Ordering::SeqCst) {
            return;
        }
        let current = self.inner.query.lock();
        if let Some(query) = current.clone() {
            self.inner.start(query);
        }
    }

    #[must_use]
    pub fn query(&self) -> Option<ForecastQuery> {
        self.inner.query.lock().clone()
    }

    #[must_use]
    pub fn state(&self) -> FetchState {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FetchState> {
        self.inner.state.subscribe()
    }

    /// Permanently disable commits; in-flight retries stop at their next
    /// attempt
    pub fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        debug!("Forecast fetcher shut down");
    }
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.generation.load(Ordering::SeqCst) == generation
    }

    fn start(self: &Arc<Self>, query: ForecastQuery) {
        let mut generation = 0;
        self.state.send_modify(|state| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *state = FetchState::Loading;
        });
        info!(
            lat = query.latitude,
            lon = query.longitude,
            timezone = %query.timezone,
            units = %query.units,
            "Fetching forecast"
        );

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.run(generation, query).await;
        });
    }

    async fn run(&self, generation: u64, query: ForecastQuery) {
        let outcome = fetch_with_retry(self.api.as_ref(), &query, &self.policy, || {
            self.is_current(generation)
        })
        .await;

        if matches!(&outcome, Err(e) if e.is_superseded()) {
            debug!("Fetch abandoned before completing, nothing to commit");
            return;
        }

        let committed = self.state.send_if_modified(|state| {
            if !self.is_current(generation) {
                return false;
            }
            *state = match outcome {
                Ok(result) => FetchState::Success(Arc::new(result)),
                Err(ref e) => FetchState::Failed(e.to_string()),
            };
            true
        });

        if committed {
            info!("Forecast state is now {}", self.state.borrow().name());
        } else {
            debug!("Discarding forecast outcome for superseded query");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materialize::{ColumnarBlock, ColumnarResponse};
    use crate::models::UnitPreferences;
    use async_trait::async_trait;
    use tokio::time::{Instant, sleep};

    type Outcome = fn(usize, &ForecastQuery) -> Result<ColumnarResponse>;

    struct FakeForecast {
        calls: Mutex<Vec<(ForecastQuery, Instant)>>,
        outcome: Outcome,
        latency: fn(&ForecastQuery) -> Duration,
    }

    impl FakeForecast {
        fn new(outcome: Outcome) -> Arc<Self> {
            Self::with_latency(outcome, |_| Duration::ZERO)
        }

        fn with_latency(outcome: Outcome, latency: fn(&ForecastQuery) -> Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                outcome,
                latency,
            })
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().iter().map(|(_, at)| *at).collect()
        }
    }

    #[async_trait]
    impl ForecastApi for FakeForecast {
        async fn forecast(&self, query: &ForecastQuery) -> Result<ColumnarResponse> {
            let index = {
                let mut calls = self.calls.lock();
                calls.push((query.clone(), Instant::now()));
                calls.len() - 1
            };
            sleep((self.latency)(query)).await;
            (self.outcome)(index, query)
        }
    }

    fn response_for(query: &ForecastQuery) -> ColumnarResponse {
        ColumnarResponse {
            latitude: query.latitude,
            longitude: query.longitude,
            utc_offset_seconds: 0,
            hourly: Some(ColumnarBlock {
                start: 1_700_000_000,
                end: 1_700_000_000 + 2 * 3600,
                interval: 3600,
                variables: vec![Some(vec![12.0, 13.0]); 6],
            }),
            ..ColumnarResponse::default()
        }
    }

    fn always_ok(_: usize, query: &ForecastQuery) -> Result<ColumnarResponse> {
        Ok(response_for(query))
    }

    fn always_fail(_: usize, _: &ForecastQuery) -> Result<ColumnarResponse> {
        Err(DashboardError::forecast("503 Service Unavailable"))
    }

    fn query(latitude: f64) -> ForecastQuery {
        ForecastQuery {
            latitude,
            longitude: 13.41,
            timezone: "auto".to_string(),
            units: UnitPreferences::metric(),
        }
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(1000));
        assert_eq!(policy.timeout, Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_failures_end_in_failed() {
        let api = FakeForecast::new(always_fail);
        let fetcher = ForecastFetcher::new(api.clone(), RetryPolicy::default());

        fetcher.set_query(Some(query(52.52)));
        assert!(fetcher.state().is_loading());
        sleep(Duration::from_secs(10)).await;

        let times = api.call_times();
        assert_eq!(times.len(), 3);
        assert_eq!(times[1] - times[0], Duration::from_millis(500));
        assert_eq!(times[2] - times[1], Duration::from_millis(1000));
        assert!(matches!(fetcher.state(), FetchState::Failed(ref msg) if msg.contains("503")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure() {
        let api = FakeForecast::new(|index, query| {
            if index == 0 {
                Err(DashboardError::decode("truncated body"))
            } else {
                Ok(response_for(query))
            }
        });
        let fetcher = ForecastFetcher::new(api.clone(), RetryPolicy::default());

        fetcher.set_query(Some(query(52.52)));
        sleep(Duration::from_secs(2)).await;

        assert_eq!(api.call_times().len(), 2);
        let state = fetcher.state();
        let result = state.result().unwrap();
        assert_eq!(result.hourly.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_response_for_superseded_query_is_dropped() {
        // A answers at t=2s while B is still in flight until t=5s
        let api = FakeForecast::with_latency(always_ok, |q| {
            if q.latitude < 10.0 {
                Duration::from_secs(2)
            } else {
                Duration::from_secs(5)
            }
        });
        let fetcher = ForecastFetcher::new(api.clone(), RetryPolicy::default());

        fetcher.set_query(Some(query(1.0)));
        sleep(Duration::from_millis(10)).await;
        fetcher.set_query(Some(query(50.0)));

        sleep(Duration::from_secs(3)).await;
        assert_eq!(fetcher.state(), FetchState::Loading);

        sleep(Duration::from_secs(3)).await;
        let state = fetcher.state();
        assert_eq!(state.result().unwrap().metadata.latitude, 50.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_change_abandons_retries() {
        let api = FakeForecast::new(always_fail);
        let fetcher = ForecastFetcher::new(api.clone(), RetryPolicy::default());

        fetcher.set_query(Some(query(1.0)));
        sleep(Duration::from_millis(100)).await;
        let mut imperial = query(1.0);
        imperial.units = UnitPreferences::imperial();
        fetcher.set_query(Some(imperial));
        sleep(Duration::from_secs(10)).await;

        let calls = api.calls.lock();
        let metric_calls = calls
            .iter()
            .filter(|(q, _)| q.units == UnitPreferences::metric())
            .count();
        assert_eq!(metric_calls, 1);
        assert_eq!(calls.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_irrelevant_query_is_superseded_without_request() {
        let api = FakeForecast::new(always_ok);
        let err = fetch_with_retry(api.as_ref(), &query(1.0), &RetryPolicy::default(), || false)
            .await
            .unwrap_err();

        assert!(err.is_superseded());
        assert!(api.calls.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout() {
        let api = FakeForecast::with_latency(always_ok, |_| Duration::from_secs(20));
        let fetcher = ForecastFetcher::new(api.clone(), RetryPolicy::default());

        fetcher.set_query(Some(query(52.52)));
        sleep(Duration::from_secs(14)).await;
        assert!(fetcher.state().is_loading());

        sleep(Duration::from_secs(60)).await;
        assert_eq!(api.call_times().len(), 3);
        assert!(matches!(
            fetcher.state(),
            FetchState::Failed(ref msg) if msg.contains("timed out")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_query_is_noop_and_none_is_idle() {
        let api = FakeForecast::new(always_ok);
        let fetcher = ForecastFetcher::new(api.clone(), RetryPolicy::default());

        fetcher.set_query(Some(query(52.52)));
        sleep(Duration::from_millis(10)).await;
        fetcher.set_query(Some(query(52.520_000_000_1)));
        sleep(Duration::from_millis(10)).await;
        assert_eq!(api.call_times().len(), 1);
        assert!(fetcher.state().result().is_some());

        fetcher.set_query(None);
        assert_eq!(fetcher.state(), FetchState::Idle);
        assert!(fetcher.query().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_reissues_current_query() {
        let api = FakeForecast::new(always_ok);
        let fetcher = ForecastFetcher::new(api.clone(), RetryPolicy::default());

        fetcher.refetch();
        sleep(Duration::from_millis(10)).await;
        assert!(api.call_times().is_empty());

        fetcher.set_query(Some(query(52.52)));
        sleep(Duration::from_millis(10)).await;
        fetcher.refetch();
        assert!(fetcher.state().is_loading());
        sleep(Duration::from_millis(10)).await;
        assert_eq!(api.call_times().len(), 2);
        assert!(fetcher.state().result().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_disables_commits() {
        let api = FakeForecast::with_latency(always_ok, |_| Duration::from_secs(1));
        let fetcher = ForecastFetcher::new(api.clone(), RetryPolicy::default());

        fetcher.set_query(Some(query(52.52)));
        sleep(Duration::from_millis(10)).await;
        fetcher.shutdown();
        sleep(Duration::from_secs(2)).await;

        assert_eq!(fetcher.state(), FetchState::Loading);
        fetcher.set_query(Some(query(10.0)));
        assert_eq!(api.call_times().len(), 1);
    }
}
