//! Shared configuration errors.

use thiserror::Error;

/// Errors raised when a guard is constructed with invalid parameters.
///
/// Construction fails fast: a misconfigured guard is never handed out, so
/// callers do not discover bad settings at first use.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The breaker would never trip.
    #[error("failure_threshold must be greater than zero")]
    ZeroFailureThreshold,
    /// The breaker would probe immediately after opening.
    #[error("recovery_timeout must be greater than zero")]
    ZeroRecoveryTimeout,
    /// The limiter would never refill.
    #[error("requests_per_minute must be positive, got {0}")]
    NonPositiveRate(f64),
    /// No tokenizer vocabulary is known for the requested model.
    #[cfg(feature = "tiktoken")]
    #[error("no tokenizer known for model '{0}'")]
    UnknownTokenizerModel(String),
}
