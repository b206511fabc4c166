//! Circuit breaker guarding the remote agent service.
//!
//! The breaker counts consecutive submission failures. Once the threshold is
//! reached it opens and rejects requests until the recovery timeout has
//! elapsed, then lets a single trial request through (half-open). The trial's
//! outcome either closes the breaker again or re-opens it.
//!
//! All transitions have `_at` variants taking the current instant so the state
//! machine can be driven deterministically.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Breaker mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerMode {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    mode: BreakerMode,
    failures: u32,
    last_failure: Option<Instant>,
    threshold: u32,
    recovery_timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            mode: BreakerMode::Closed,
            failures: 0,
            last_failure: None,
            threshold,
            recovery_timeout,
        }
    }

    pub fn mode(&self) -> BreakerMode {
        self.mode
    }

    pub fn failure_count(&self) -> u32 {
        self.failures
    }

    pub fn allow_request(&mut self) -> bool {
        self.allow_request_at(Instant::now())
    }

    /// Decide whether a request may proceed at `now`.
    ///
    /// In open mode this moves to half-open once the recovery timeout has
    /// elapsed since the last recorded failure.
    pub fn allow_request_at(&mut self, now: Instant) -> bool {
        match self.mode {
            BreakerMode::Closed | BreakerMode::HalfOpen => true,
            BreakerMode::Open => {
                let elapsed = self
                    .last_failure
                    .map(|at| now.saturating_duration_since(at))
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.recovery_timeout {
                    debug!(failures = self.failures, "breaker half-open, allowing trial request");
                    self.mode = BreakerMode::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// A success only matters while half-open; closed mode keeps its count.
    pub fn record_success(&mut self) {
        if self.mode == BreakerMode::HalfOpen {
            debug!("trial request succeeded, breaker closed");
            self.mode = BreakerMode::Closed;
            self.failures = 0;
        }
    }

    pub fn record_failure(&mut self) {
        self.record_failure_at(Instant::now());
    }

    pub fn record_failure_at(&mut self, now: Instant) {
        self.last_failure = Some(now);
        match self.mode {
            BreakerMode::HalfOpen => {
                warn!("trial request failed, breaker re-opened");
                self.mode = BreakerMode::Open;
            }
            BreakerMode::Closed => {
                self.failures = self.failures.saturating_add(1);
                if self.failures >= self.threshold {
                    warn!(
                        failures = self.failures,
                        recovery_secs = self.recovery_timeout.as_secs_f64(),
                        "failure threshold reached, breaker opened"
                    );
                    self.mode = BreakerMode::Open;
                }
            }
            BreakerMode::Open => {
                self.failures = self.failures.saturating_add(1);
            }
        }
    }
}
