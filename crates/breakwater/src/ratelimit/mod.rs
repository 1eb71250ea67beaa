//! Token-bucket rate limiting for outbound provider calls.
//!
//! One limiter per named resource; capacity accrues continuously at
//! `requests_per_minute / 60` tokens per second and each admitted call
//! consumes one token. Callers that arrive while the bucket is empty are
//! suspended, not rejected.

pub mod limiter;

pub use limiter::RateLimiter;
