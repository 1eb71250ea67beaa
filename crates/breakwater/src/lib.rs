//! breakwater - resilience primitives for outbound LLM provider calls.
//!
//! Three independent, composable guards:
//! - [`CircuitBreaker`]: blocks calls to a failing dependency after repeated
//!   failures and self-probes for recovery after a cooldown
//! - [`RateLimiter`]: token-bucket pacing of call throughput per named
//!   resource
//! - [`MessageBudgeter`]: fits a conversation history under a provider's
//!   token budget, preferring recency
//!
//! The guards are orthogonal; none calls another. A typical call path checks
//! the breaker, waits on the limiter, and budgets the payload before
//! dispatch:
//!
//! ```rust,ignore
//! use breakwater::{GuardRegistry, MessageBudgeter};
//!
//! let registry = GuardRegistry::default();
//! let budgeter = MessageBudgeter::new();
//!
//! let breaker = registry.breaker("anthropic");
//! let limiter = registry.limiter("anthropic");
//!
//! limiter.wait_for_token().await;
//! let history = budgeter.truncate(&conversation, 100_000);
//! let response = breaker.call(client.complete(&history)).await?;
//! ```

// circuit breaker module - admission gating for failing dependencies
pub mod circuit_breaker;

// ratelimit module - token-bucket call pacing
pub mod ratelimit;

// budget module - token counting and history truncation
pub mod budget;

// message types shared by the components
pub mod message;

// registry module - per-name instance ownership
pub mod registry;

// shared configuration errors
pub mod error;

// Re-export circuit breaker types
pub use circuit_breaker::{
    BreakerConfig, BreakerError, BreakerMetrics, BreakerMetricsSnapshot, CircuitBreaker,
    CircuitOpen, Permit, State,
};

// Re-export rate limiter types
pub use ratelimit::RateLimiter;

// Re-export budgeter types
#[cfg(feature = "tiktoken")]
pub use budget::TiktokenCounter;
pub use budget::{HeuristicCounter, MessageBudgeter, TokenCounter};

// Re-export message types
pub use message::{ChatMessage, Role};

// Re-export registry and error types
pub use error::ConfigError;
pub use registry::GuardRegistry;
