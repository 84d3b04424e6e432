//! Resilience primitives composed by the gateway.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`SlidingWindowLimiter`] | Local admission control over a trailing window |
//! | [`RetryExecutor`] | Backoff-bounded retry for transient failures |
//!
//! Admission control rejects work before it starts; retry only ever re-runs
//! work the provider classified as transiently failed. The two never overlap:
//! a rate-limit rejection is surfaced to the caller unchanged and is not
//! retried within the same call.

mod rate_limiter;
mod retry;

pub use rate_limiter::{RateLimiterConfig, RateLimiterSnapshot, SlidingWindowLimiter};
pub use retry::{ClassifyFn, RetryExecutor, RetryPolicy};
