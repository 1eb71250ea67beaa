//! Circuit breaker state machine.
//!
//! Implements the three-state breaker:
//! - Closed: normal operation, calls pass through
//! - Open: calls are rejected without reaching the dependency
//! - HalfOpen: a single probe call tests whether the dependency recovered
//!
//! All state lives behind one mutex. Admission and outcome recording run
//! under the lock; the guarded call itself runs outside it, so slow calls
//! never block other callers' admission decisions.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::BreakerConfig;
use super::metrics::BreakerMetrics;
use crate::error::ConfigError;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum State {
    /// Normal operation - calls are allowed
    Closed,
    /// Circuit is open - calls are rejected
    Open,
    /// Testing recovery - one probe call allowed
    HalfOpen,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Closed => write!(f, "closed"),
            State::Open => write!(f, "open"),
            State::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Rejection raised when the circuit is open and the cooldown has not elapsed.
///
/// Distinct from any error the guarded operation itself can produce, so
/// callers can tell "dependency is down, don't retry yet" apart from "the
/// call failed".
#[derive(Debug, Clone, Error)]
#[error("circuit breaker '{name}' is open; retry in {retry_after:?}")]
pub struct CircuitOpen {
    /// Name of the breaker that rejected the call.
    pub name: String,
    /// Remaining cooldown before a recovery probe is admitted.
    pub retry_after: Duration,
}

/// Error returned by [`CircuitBreaker::call`].
#[derive(Debug, Error)]
pub enum BreakerError<E>
where
    E: std::error::Error + 'static,
{
    /// The call was rejected without being attempted.
    #[error(transparent)]
    Open(#[from] CircuitOpen),
    /// The guarded operation ran and failed; the failure has been recorded.
    #[error("guarded operation failed: {0}")]
    Operation(#[source] E),
}

impl<E> BreakerError<E>
where
    E: std::error::Error + 'static,
{
    /// Whether the call was rejected without running.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }

    /// The wrapped operation's own error, if it ran and failed.
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Operation(err) => Some(err),
            Self::Open(_) => None,
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: State,
    /// Failure timestamps, capacity = failure_threshold, oldest evicted first.
    failure_window: VecDeque<Instant>,
    last_failure_time: Option<Instant>,
    probe_in_flight: bool,
}

/// Tracks failure history for a named dependency and blocks calls once the
/// failure threshold is crossed, self-probing for recovery after a cooldown.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
    metrics: BreakerMetrics,
}

impl CircuitBreaker {
    /// Create a breaker for the named dependency.
    ///
    /// Fails fast on a zero threshold or zero timeout.
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;
        Ok(Self::new_unchecked(name, config))
    }

    /// Create with default configuration.
    pub fn with_default(name: impl Into<String>) -> Arc<Self> {
        Self::new_unchecked(name, BreakerConfig::default())
    }

    pub(crate) fn new_unchecked(name: impl Into<String>, config: BreakerConfig) -> Arc<Self> {
        let capacity = config.failure_threshold as usize;
        Arc::new(Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: State::Closed,
                failure_window: VecDeque::with_capacity(capacity),
                last_failure_time: None,
                probe_in_flight: false,
            }),
            metrics: BreakerMetrics::new(),
        })
    }

    /// Name of the guarded dependency.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The breaker's configuration.
    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Admission and transition counters.
    pub fn metrics(&self) -> &BreakerMetrics {
        &self.metrics
    }

    /// Current state, for diagnostics. Does not advance the state machine;
    /// the open-to-half-open transition happens at acquisition time.
    pub fn state(&self) -> State {
        self.inner.lock().state
    }

    /// Run `operation` under the breaker's protection.
    ///
    /// Rejected calls return [`BreakerError::Open`] without polling the
    /// future. Operation failures are recorded and propagated unchanged
    /// inside [`BreakerError::Operation`].
    pub async fn call<F, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        let permit = self.try_acquire()?;
        match operation.await {
            Ok(value) => {
                permit.success();
                Ok(value)
            }
            Err(err) => {
                permit.failure();
                Err(BreakerError::Operation(err))
            }
        }
    }

    /// Decide admission for one call.
    ///
    /// On success the returned [`Permit`] must be resolved with
    /// [`Permit::success`] or [`Permit::failure`]. A permit dropped
    /// unresolved releases the half-open probe slot without moving the
    /// state machine, so a cancelled probe cannot wedge the breaker.
    pub fn try_acquire(&self) -> Result<Permit<'_>, CircuitOpen> {
        let mut inner = self.inner.lock();
        match inner.state {
            State::Closed => Ok(Permit {
                breaker: self,
                entered_from: State::Closed,
                resolved: false,
            }),
            State::Open => {
                // open implies a recorded failure time; a missing one is
                // treated as an expired cooldown
                let elapsed = inner
                    .last_failure_time
                    .map(|t| t.elapsed())
                    .unwrap_or(self.config.recovery_timeout);
                if elapsed >= self.config.recovery_timeout {
                    self.transition(&mut inner, State::HalfOpen);
                    inner.probe_in_flight = true;
                    Ok(Permit {
                        breaker: self,
                        entered_from: State::HalfOpen,
                        resolved: false,
                    })
                } else {
                    let retry_after = self.config.recovery_timeout - elapsed;
                    self.metrics.record_rejected();
                    debug!(name = %self.name, ?retry_after, "call rejected, circuit open");
                    Err(CircuitOpen {
                        name: self.name.clone(),
                        retry_after,
                    })
                }
            }
            State::HalfOpen => {
                if inner.probe_in_flight {
                    let retry_after = inner
                        .last_failure_time
                        .map(|t| self.config.recovery_timeout.saturating_sub(t.elapsed()))
                        .unwrap_or(Duration::ZERO);
                    self.metrics.record_rejected();
                    debug!(name = %self.name, "call rejected, recovery probe outstanding");
                    Err(CircuitOpen {
                        name: self.name.clone(),
                        retry_after,
                    })
                } else {
                    inner.probe_in_flight = true;
                    Ok(Permit {
                        breaker: self,
                        entered_from: State::HalfOpen,
                        resolved: false,
                    })
                }
            }
        }
    }

    fn on_success(&self, entered_from: State) {
        let mut inner = self.inner.lock();
        self.metrics.record_success();
        if entered_from == State::HalfOpen {
            inner.probe_in_flight = false;
            if inner.state == State::HalfOpen {
                self.transition(&mut inner, State::Closed);
            }
        }
        // success on the closed path leaves the failure window untouched
    }

    fn on_failure(&self, entered_from: State) {
        let mut inner = self.inner.lock();
        self.metrics.record_failure();
        if entered_from == State::HalfOpen {
            inner.probe_in_flight = false;
            // the failed probe is not counted toward the threshold
            inner.failure_window.clear();
            self.transition(&mut inner, State::Open);
        } else {
            let capacity = self.config.failure_threshold as usize;
            if inner.failure_window.len() == capacity {
                inner.failure_window.pop_front();
            }
            inner.failure_window.push_back(Instant::now());
            if inner.state == State::Closed && inner.failure_window.len() >= capacity {
                self.transition(&mut inner, State::Open);
            }
        }
    }

    fn transition(&self, inner: &mut Inner, to: State) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;
        match to {
            State::Closed => {
                inner.failure_window.clear();
                inner.last_failure_time = None;
                inner.probe_in_flight = false;
            }
            State::Open => {
                inner.last_failure_time = Some(Instant::now());
                inner.probe_in_flight = false;
            }
            State::HalfOpen => {}
        }
        self.metrics.record_transition();
        if to == State::Open {
            warn!(name = %self.name, from = %from, "circuit opened");
        } else {
            info!(name = %self.name, from = %from, to = %to, "circuit state changed");
        }
    }
}

/// Admission token for one guarded call.
///
/// Report the outcome with [`Permit::success`] or [`Permit::failure`].
#[derive(Debug)]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    entered_from: State,
    resolved: bool,
}

impl Permit<'_> {
    /// Record a successful call.
    pub fn success(mut self) {
        self.resolved = true;
        self.breaker.on_success(self.entered_from);
    }

    /// Record a failed call. The error itself stays with the caller.
    pub fn failure(mut self) {
        self.resolved = true;
        self.breaker.on_failure(self.entered_from);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.resolved && self.entered_from == State::HalfOpen {
            let mut inner = self.breaker.inner.lock();
            if inner.state == State::HalfOpen {
                inner.probe_in_flight = false;
            }
        }
    }
}
