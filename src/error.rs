use std::time::Duration;
use thiserror::Error;

/// Provider-side failure classes, assigned while mapping the raw provider
/// response and consumed by the retry predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Upstream signaled throttling (HTTP 429).
    RateLimited,
    /// Upstream signaled an exhausted quota or billing limit.
    QuotaExceeded,
    /// Timeout, connection failure, or 5xx-equivalent.
    Transient,
    /// Malformed request, authentication failure, or another error that
    /// will fail identically on every attempt.
    Permanent,
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProviderErrorKind::RateLimited => "rate_limited",
            ProviderErrorKind::QuotaExceeded => "quota_exhausted",
            ProviderErrorKind::Transient => "transient",
            ProviderErrorKind::Permanent => "permanent",
        };
        f.write_str(s)
    }
}

/// Unified error type for the gateway.
///
/// Cache-tier failures are intentionally absent from the `generate` path:
/// they degrade functionality and surface only through health queries.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("rate limit exceeded: {max_requests} requests per {}ms window", .window.as_millis())]
    RateLimitExceeded { max_requests: u32, window: Duration },

    #[error("provider error ({kind}{}): {message}", .status.map(|s| format!(", http {s}")).unwrap_or_default())]
    Provider {
        kind: ProviderErrorKind,
        status: Option<u16>,
        message: String,
        /// Upstream-suggested delay before the next attempt, when present.
        retry_after: Option<Duration>,
    },

    #[error("failed to parse provider response: {reason}")]
    Parse { reason: String, raw: String },

    #[error("max retries exceeded after {attempts} attempts in {}ms: {source}", .elapsed.as_millis())]
    RetriesExhausted {
        attempts: u32,
        elapsed: Duration,
        #[source]
        source: Box<Error>,
    },

    #[error("cache backend error: {0}")]
    Cache(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>, status: Option<u16>) -> Self {
        Error::Provider {
            kind: ProviderErrorKind::Transient,
            status,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn permanent(message: impl Into<String>, status: Option<u16>) -> Self {
        Error::Provider {
            kind: ProviderErrorKind::Permanent,
            status,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Default retry classification: only transient provider failures and
    /// upstream throttling are worth another attempt. Parse failures are not
    /// retried (a second call would return the same malformed payload) and
    /// local admission rejections are surfaced unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Provider { kind, .. } => matches!(
                kind,
                ProviderErrorKind::RateLimited
                    | ProviderErrorKind::QuotaExceeded
                    | ProviderErrorKind::Transient
            ),
            _ => false,
        }
    }

    /// Upstream-suggested retry delay, if the provider sent one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::Provider { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_and_throttle_errors_are_retryable() {
        assert!(Error::transient("timeout", None).is_retryable());
        assert!(Error::Provider {
            kind: ProviderErrorKind::RateLimited,
            status: Some(429),
            message: "slow down".into(),
            retry_after: None,
        }
        .is_retryable());
        assert!(Error::Provider {
            kind: ProviderErrorKind::QuotaExceeded,
            status: Some(429),
            message: "quota".into(),
            retry_after: None,
        }
        .is_retryable());
    }

    #[test]
    fn permanent_parse_and_local_errors_are_not_retryable() {
        assert!(!Error::permanent("bad request", Some(400)).is_retryable());
        assert!(!Error::Parse {
            reason: "missing choices".into(),
            raw: "{}".into(),
        }
        .is_retryable());
        assert!(!Error::RateLimitExceeded {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
        .is_retryable());
        assert!(!Error::configuration("no key").is_retryable());
    }

    #[test]
    fn retry_after_only_comes_from_provider_errors() {
        let err = Error::Provider {
            kind: ProviderErrorKind::RateLimited,
            status: Some(429),
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(2)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
        assert_eq!(Error::configuration("x").retry_after(), None);
    }
}
