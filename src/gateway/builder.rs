use super::Gateway;
use crate::cache::{KeyNormalizer, RemoteTier, TieredCache};
use crate::config::GatewayConfig;
use crate::provider::{HttpProvider, Provider};
use crate::resilience::{RateLimiterConfig, RetryPolicy, SlidingWindowLimiter};
use crate::usage::UsageAccountant;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;

/// Builder for a [`Gateway`].
///
/// The gateway is constructed explicitly and injected into callers; there is
/// no ambient global instance. Configuration is validated once here and
/// never re-checked per call.
pub struct GatewayBuilder {
    config: GatewayConfig,
    remote_tier: Option<Arc<dyn RemoteTier>>,
    provider: Option<Arc<dyn Provider>>,
    reaper_interval: Option<Duration>,
    key_salt: Option<String>,
    retry_policy: Option<RetryPolicy>,
}

impl GatewayBuilder {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            remote_tier: None,
            provider: None,
            reaper_interval: None,
            key_salt: None,
            retry_policy: None,
        }
    }

    /// Attach a shared remote cache tier. Absence disables the remote tier
    /// entirely; it is never an error.
    pub fn with_remote_tier(mut self, tier: Arc<dyn RemoteTier>) -> Self {
        self.remote_tier = Some(tier);
        self
    }

    /// Override the provider implementation. Defaults to [`HttpProvider`]
    /// built from the config; tests inject scripted providers here.
    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Enable the periodic local-cache reaper. Requires a running tokio
    /// runtime at build time.
    pub fn with_reaper(mut self, interval: Duration) -> Self {
        self.reaper_interval = Some(interval);
        self
    }

    /// Namespace cache keys, e.g. per deployment sharing one remote tier.
    pub fn with_key_salt(mut self, salt: impl Into<String>) -> Self {
        self.key_salt = Some(salt.into());
        self
    }

    /// Override the retry policy derived from `config.max_attempts`, e.g.
    /// for custom backoff timing. The attempt ceiling still applies.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn build(self) -> Result<Gateway> {
        self.config.validate()?;

        let provider: Arc<dyn Provider> = match self.provider {
            Some(provider) => provider,
            None => Arc::new(HttpProvider::new(
                self.config.base_url.clone(),
                self.config.api_key.clone(),
                self.config.request_timeout,
            )?),
        };

        let cache = Arc::new(TieredCache::new(
            self.config.local_cache_max_entries,
            self.config.local_cache_ttl_ceiling,
            self.remote_tier,
        ));
        if let Some(interval) = self.reaper_interval {
            TieredCache::spawn_reaper(&cache, interval);
        }

        let mut normalizer = KeyNormalizer::new();
        if let Some(salt) = self.key_salt {
            normalizer = normalizer.with_salt(salt);
        }

        let limiter = SlidingWindowLimiter::new(RateLimiterConfig::new(
            self.config.rate_limit_max_requests,
            self.config.rate_limit_window,
        ));
        let retry_policy = self
            .retry_policy
            .unwrap_or_else(|| RetryPolicy::new(self.config.max_attempts));

        Ok(Gateway {
            provider,
            cache,
            normalizer,
            limiter,
            accountant: UsageAccountant::new(),
            retry_policy,
            config: self.config,
        })
    }
}
