//! Circuit breaker for outbound provider calls.
//!
//! Tracks failure history for a named external dependency and blocks calls
//! once a failure threshold is crossed, self-probing for recovery after a
//! cooldown:
//!
//! ```text
//!                  failure threshold reached
//!     +--------+ -------------------------> +------+
//!     | CLOSED |                            | OPEN | <--+
//!     +--------+                            +------+    |
//!         ^                                     |       |
//!         | probe success                       |       | probe
//!         |                  recovery timeout   |       | failure
//!         |                  elapsed            v       |
//!         |                              +-----------+  |
//!         +----------------------------- | HALF-OPEN | -+
//!                                        +-----------+
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use breakwater::{BreakerConfig, CircuitBreaker};
//!
//! let breaker = CircuitBreaker::new("anthropic", BreakerConfig::default())?;
//!
//! match breaker.call(client.complete(request)).await {
//!     Ok(response) => handle(response),
//!     Err(err) if err.is_open() => back_off(),
//!     Err(err) => report(err),
//! }
//! ```
//!
//! Retry policy is entirely the caller's responsibility; the breaker only
//! gates admission.

pub mod config;
pub mod metrics;
pub mod state;

pub use config::BreakerConfig;
pub use metrics::{BreakerMetrics, BreakerMetricsSnapshot};
pub use state::{BreakerError, CircuitBreaker, CircuitOpen, Permit, State};
