//! Gateway configuration.
//!
//! Read once at construction and validated there; never re-validated per
//! call. Environment overrides follow the `AI_GATEWAY_*` prefix.

use crate::{Error, Result};
use std::env;
use std::time::Duration;

/// Hard ceiling on retry attempts; a misconfigured caller cannot exceed it.
pub const HARD_ATTEMPT_CEILING: u32 = 8;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Provider credential. Empty is a configuration error at build time.
    pub api_key: String,
    /// Provider endpoint base, e.g. `https://api.openai.com`.
    pub base_url: String,
    /// Model used when a request does not name one.
    pub default_model: String,
    /// Per-attempt timeout for provider calls.
    pub request_timeout: Duration,
    /// Total attempts per request, capped by [`HARD_ATTEMPT_CEILING`].
    pub max_attempts: u32,
    /// Sliding-window admission budget.
    pub rate_limit_max_requests: u32,
    pub rate_limit_window: Duration,
    /// TTL applied when caching fresh responses.
    pub cache_ttl: Duration,
    /// Upper bound on any local-tier TTL, independent of what callers ask
    /// for. Bounds memory growth and staleness in the fast tier.
    pub local_cache_ttl_ceiling: Duration,
    pub local_cache_max_entries: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com".into(),
            default_model: "gpt-4o-mini".into(),
            request_timeout: Duration::from_secs(30),
            max_attempts: 3,
            rate_limit_max_requests: 60,
            rate_limit_window: Duration::from_secs(60),
            cache_ttl: Duration::from_secs(3600),
            local_cache_ttl_ceiling: Duration::from_secs(600),
            local_cache_max_entries: 1000,
        }
    }
}

impl GatewayConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Build a config from `AI_GATEWAY_*` environment variables, falling
    /// back to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        cfg.api_key = env::var("AI_GATEWAY_API_KEY").unwrap_or_default();
        if let Ok(url) = env::var("AI_GATEWAY_BASE_URL") {
            cfg.base_url = url;
        }
        if let Ok(model) = env::var("AI_GATEWAY_MODEL") {
            cfg.default_model = model;
        }
        if let Some(secs) = env_u64("AI_GATEWAY_TIMEOUT_SECS") {
            cfg.request_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = env_u64("AI_GATEWAY_MAX_ATTEMPTS") {
            cfg.max_attempts = n as u32;
        }
        if let Some(n) = env_u64("AI_GATEWAY_RATE_LIMIT_MAX") {
            cfg.rate_limit_max_requests = n as u32;
        }
        if let Some(ms) = env_u64("AI_GATEWAY_RATE_LIMIT_WINDOW_MS") {
            cfg.rate_limit_window = Duration::from_millis(ms);
        }
        if let Some(secs) = env_u64("AI_GATEWAY_CACHE_TTL_SECS") {
            cfg.cache_ttl = Duration::from_secs(secs);
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::configuration("provider api_key is required"));
        }
        if self.base_url.trim().is_empty() {
            return Err(Error::configuration("base_url is required"));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::configuration("request_timeout must be positive"));
        }
        if self.max_attempts == 0 {
            return Err(Error::configuration("max_attempts must be at least 1"));
        }
        if self.rate_limit_max_requests == 0 {
            return Err(Error::configuration(
                "rate_limit_max_requests must be at least 1",
            ));
        }
        if self.rate_limit_window.is_zero() {
            return Err(Error::configuration("rate_limit_window must be positive"));
        }
        if self.local_cache_ttl_ceiling.is_zero() {
            return Err(Error::configuration(
                "local_cache_ttl_ceiling must be positive",
            ));
        }
        if self.local_cache_max_entries == 0 {
            return Err(Error::configuration(
                "local_cache_max_entries must be at least 1",
            ));
        }
        Ok(())
    }
}

fn env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|s| s.parse::<u64>().ok())
}
