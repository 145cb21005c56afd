//! Circuit breaker gating attempts per operation.
//!
//! # States
//! - Closed: normal operation, attempts pass through
//! - Open: operation assumed broken, attempts fail fast
//! - Half-Open: one probe attempt tests whether it recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failures >= threshold within the rolling window
//! Open → Half-Open: first gate check after open_duration has elapsed
//! Half-Open → Closed: probe attempt succeeds
//! Half-Open → Open: probe attempt fails (open clock restarts)
//! ```
//!
//! # Design Decisions
//! - One breaker per operation identity, shared by every concurrent caller
//! - All fields sit behind one short-lived mutex, never held across an attempt
//! - Admission hands out a permit guard; an abandoned probe frees its slot on drop

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::observability::metrics;
use crate::operation::OperationId;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Thresholds for one breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Failures within `window` that open the circuit.
    pub failure_threshold: u32,
    /// Length of the rolling failure window.
    pub window: Duration,
    /// How long the circuit stays open before a probe is allowed.
    pub open_duration: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window: Duration::from_secs(60),
            open_duration: Duration::from_secs(30),
        }
    }
}

impl BreakerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn with_open_duration(mut self, open_duration: Duration) -> Self {
        self.open_duration = open_duration;
        self
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    /// Timestamps of recent failures, oldest first, at most `failure_threshold` long.
    failures: VecDeque<Instant>,
    last_transition: Instant,
    probe_in_flight: bool,
    total_successes: u64,
    total_failures: u64,
    total_rejections: u64,
}

impl BreakerInner {
    fn new(now: Instant) -> Self {
        Self {
            state: CircuitState::Closed,
            failures: VecDeque::new(),
            last_transition: now,
            probe_in_flight: false,
            total_successes: 0,
            total_failures: 0,
            total_rejections: 0,
        }
    }

    /// Move to `to`, returning the transition if the state actually changed.
    fn transition(&mut self, to: CircuitState, now: Instant) -> Option<(CircuitState, CircuitState)> {
        let from = self.state;
        if from == to {
            return None;
        }
        self.state = to;
        self.last_transition = now;
        self.probe_in_flight = false;
        self.failures.clear();
        Some((from, to))
    }

    /// Forget failures older than `window` before `now`.
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.failures.front() {
            if now.saturating_duration_since(oldest) < window {
                break;
            }
            self.failures.pop_front();
        }
    }

    fn window_failures(&self) -> u32 {
        self.failures.len() as u32
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStats {
    pub operation: String,
    pub state: CircuitState,
    pub window_failures: u32,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_rejections: u64,
}

/// Per-operation circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    operation: OperationId,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(operation: OperationId, config: BreakerConfig) -> Self {
        Self {
            operation,
            config,
            inner: Mutex::new(BreakerInner::new(Instant::now())),
        }
    }

    pub fn operation(&self) -> &OperationId {
        &self.operation
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().expect("circuit breaker mutex poisoned")
    }

    /// Current state. An open breaker whose duration has elapsed still reports
    /// `Open` until the next gate check moves it to `HalfOpen`.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Gate check. Returns a permit if an attempt may run now.
    pub fn try_acquire(self: &Arc<Self>) -> Option<BreakerPermit> {
        let now = Instant::now();
        let mut inner = self.lock();

        let (probe, transition) = match inner.state {
            CircuitState::Closed => (false, None),
            CircuitState::Open => {
                if now.saturating_duration_since(inner.last_transition) >= self.config.open_duration {
                    let transition = inner.transition(CircuitState::HalfOpen, now);
                    inner.probe_in_flight = true;
                    (true, transition)
                } else {
                    inner.total_rejections += 1;
                    drop(inner);
                    self.on_rejected(CircuitState::Open);
                    return None;
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    inner.total_rejections += 1;
                    drop(inner);
                    self.on_rejected(CircuitState::HalfOpen);
                    return None;
                }
                inner.probe_in_flight = true;
                (true, None)
            }
        };
        drop(inner);

        if let Some((from, to)) = transition {
            self.on_transition(from, to);
        }
        if probe {
            tracing::debug!(operation = %self.operation, "Probe attempt admitted");
        }

        Some(BreakerPermit {
            breaker: self.clone(),
            probe,
            settled: false,
        })
    }

    fn record_success(&self, probe: bool) {
        let now = Instant::now();
        let mut inner = self.lock();
        inner.total_successes += 1;
        inner.failures.clear();
        // Only the probe decides how a half-open circuit resolves.
        let transition = if probe && inner.state == CircuitState::HalfOpen {
            inner.probe_in_flight = false;
            inner.transition(CircuitState::Closed, now)
        } else {
            None
        };
        drop(inner);

        if let Some((from, to)) = transition {
            self.on_transition(from, to);
        }
    }

    fn record_failure(&self, probe: bool) {
        let now = Instant::now();
        let mut inner = self.lock();
        inner.total_failures += 1;

        let window = self.config.window;
        inner.prune(now, window);
        inner.failures.push_back(now);
        let threshold = self.config.failure_threshold.max(1) as usize;
        while inner.failures.len() > threshold {
            inner.failures.pop_front();
        }

        let transition = match inner.state {
            CircuitState::HalfOpen if probe => inner.transition(CircuitState::Open, now),
            CircuitState::Closed if inner.window_failures() >= self.config.failure_threshold => {
                inner.transition(CircuitState::Open, now)
            }
            _ => None,
        };
        let failures = inner.window_failures();
        drop(inner);

        match transition {
            Some((from, to)) => self.on_transition(from, to),
            None => tracing::debug!(
                operation = %self.operation,
                window_failures = failures,
                threshold = self.config.failure_threshold,
                "Failure recorded"
            ),
        }
    }

    fn release_probe(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.probe_in_flight = false;
        }
        drop(inner);
        tracing::debug!(operation = %self.operation, "Probe abandoned, slot released");
    }

    /// Force the breaker back to `Closed` and clear the failure window.
    pub fn reset(&self) {
        let now = Instant::now();
        let mut inner = self.lock();
        let transition = inner.transition(CircuitState::Closed, now);
        inner.failures.clear();
        inner.probe_in_flight = false;
        drop(inner);

        if let Some((from, to)) = transition {
            self.on_transition(from, to);
        }
    }

    pub fn stats(&self) -> BreakerStats {
        let now = Instant::now();
        let mut inner = self.lock();
        inner.prune(now, self.config.window);
        BreakerStats {
            operation: self.operation.to_string(),
            state: inner.state,
            window_failures: inner.window_failures(),
            total_successes: inner.total_successes,
            total_failures: inner.total_failures,
            total_rejections: inner.total_rejections,
        }
    }

    fn on_transition(&self, from: CircuitState, to: CircuitState) {
        match to {
            CircuitState::Open => tracing::warn!(
                operation = %self.operation,
                from = from.as_str(),
                open_for_ms = self.config.open_duration.as_millis() as u64,
                "Circuit opened"
            ),
            _ => tracing::info!(
                operation = %self.operation,
                from = from.as_str(),
                to = to.as_str(),
                "Circuit state changed"
            ),
        }
        metrics::record_transition(&self.operation, to);
    }

    fn on_rejected(&self, state: CircuitState) {
        tracing::debug!(operation = %self.operation, state = state.as_str(), "Attempt rejected");
        metrics::record_rejection(&self.operation);
    }
}

/// Admission to run one attempt.
///
/// Settle it with [`record_success`](Self::record_success) or
/// [`record_failure`](Self::record_failure). Dropping an unsettled probe
/// permit frees the half-open slot without changing state.
#[derive(Debug)]
pub struct BreakerPermit {
    breaker: Arc<CircuitBreaker>,
    probe: bool,
    settled: bool,
}

impl BreakerPermit {
    /// True if this attempt is the half-open probe.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn record_success(mut self) {
        self.settled = true;
        self.breaker.record_success(self.probe);
    }

    pub fn record_failure(mut self) {
        self.settled = true;
        self.breaker.record_failure(self.probe);
    }
}

impl Drop for BreakerPermit {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            self.breaker.release_probe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32) -> Arc<CircuitBreaker> {
        let config = BreakerConfig::new()
            .with_failure_threshold(threshold)
            .with_window(Duration::from_secs(60))
            .with_open_duration(Duration::from_secs(10));
        Arc::new(CircuitBreaker::new(OperationId::named("test"), config))
    }

    fn fail(b: &Arc<CircuitBreaker>) {
        b.try_acquire().expect("admitted").record_failure();
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_at_threshold() {
        let b = breaker(3);
        fail(&b);
        fail(&b);
        assert_eq!(b.state(), CircuitState::Closed);
        fail(&b);
        assert_eq!(b.state(), CircuitState::Open);

        // Fourth gate check is rejected.
        assert!(b.try_acquire().is_none());
        assert_eq!(b.stats().total_rejections, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_window() {
        let b = breaker(3);
        fail(&b);
        fail(&b);
        b.try_acquire().unwrap().record_success();
        fail(&b);
        fail(&b);
        assert_eq!(b.state(), CircuitState::Closed);
        assert_eq!(b.stats().window_failures, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_expiry_restarts_count() {
        let b = breaker(3);
        fail(&b);
        fail(&b);
        tokio::time::advance(Duration::from_secs(61)).await;
        fail(&b);
        assert_eq!(b.state(), CircuitState::Closed);
        assert_eq!(b.stats().window_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_single_probe_then_close() {
        let b = breaker(1);
        fail(&b);
        assert!(b.try_acquire().is_none());

        tokio::time::advance(Duration::from_secs(10)).await;
        let probe = b.try_acquire().expect("probe admitted");
        assert!(probe.is_probe());
        assert_eq!(b.state(), CircuitState::HalfOpen);

        // Concurrent request during the probe is rejected.
        assert!(b.try_acquire().is_none());

        probe.record_success();
        assert_eq!(b.state(), CircuitState::Closed);
        assert!(!b.try_acquire().unwrap().is_probe());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probe_reopens_and_restarts_clock() {
        let b = breaker(1);
        fail(&b);
        tokio::time::advance(Duration::from_secs(10)).await;
        b.try_acquire().unwrap().record_failure();
        assert_eq!(b.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(b.try_acquire().is_none());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(b.try_acquire().unwrap().is_probe());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_probe_releases_slot() {
        let b = breaker(1);
        fail(&b);
        tokio::time::advance(Duration::from_secs(10)).await;

        let probe = b.try_acquire().unwrap();
        drop(probe);
        assert_eq!(b.state(), CircuitState::HalfOpen);

        let next = b.try_acquire().expect("slot freed");
        assert!(next.is_probe());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset() {
        let b = breaker(1);
        fail(&b);
        b.reset();
        assert_eq!(b.state(), CircuitState::Closed);
        assert_eq!(b.stats().window_failures, 0);
        assert!(b.try_acquire().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_rolls_with_each_failure() {
        let b = breaker(3);
        fail(&b);
        tokio::time::advance(Duration::from_secs(59)).await;
        fail(&b);
        tokio::time::advance(Duration::from_secs(2)).await;
        // The failure at t=0 has aged out; t=59 and t=61 remain.
        fail(&b);
        assert_eq!(b.state(), CircuitState::Closed);
        assert_eq!(b.stats().window_failures, 2);

        tokio::time::advance(Duration::from_secs(1)).await;
        fail(&b);
        assert_eq!(b.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_drop_aged_failures() {
        let b = breaker(5);
        fail(&b);
        fail(&b);
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(b.stats().window_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_permits_do_not_settle_half_open() {
        let b = breaker(1);
        let stale_ok = b.try_acquire().unwrap();
        let stale_err = b.try_acquire().unwrap();
        fail(&b);
        assert_eq!(b.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(10)).await;
        let probe = b.try_acquire().expect("probe admitted");

        stale_ok.record_success();
        assert_eq!(b.state(), CircuitState::HalfOpen);
        stale_err.record_failure();
        assert_eq!(b.state(), CircuitState::HalfOpen);
        // The probe still holds the only slot.
        assert!(b.try_acquire().is_none());

        probe.record_success();
        assert_eq!(b.state(), CircuitState::Closed);
    }
}
