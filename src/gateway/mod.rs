//! Gateway orchestration: cache lookup → admission → retrying provider call
//! → cache store → accounting → typed error mapping.

mod builder;

pub use builder::GatewayBuilder;

use crate::cache::{CacheKey, CacheStats, KeyNormalizer, TieredCache};
use crate::config::GatewayConfig;
use crate::provider::Provider;
use crate::resilience::{RateLimiterSnapshot, RetryExecutor, RetryPolicy, SlidingWindowLimiter};
use crate::types::{GenerationRequest, GenerationResponse, TokenUsage};
use crate::usage::{RequestOutcome, StatsFilter, UsageAccountant, UsageStatistics};
use crate::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Health summary exposed to operators.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStatus {
    pub configured: bool,
    pub model: String,
    pub rate_limit: RateLimiterSnapshot,
    pub cache: CacheStats,
}

/// The resilient AI-request gateway.
///
/// Owns its rate window, cache tiers, and usage counters; all shared state
/// is mutated only through the documented component methods. Per-request
/// flow:
///
/// 1. Unless the request bypasses the cache, normalize a key and probe the
///    tiered cache. A hit short-circuits the provider entirely, is recorded
///    as logical usage with zero added latency, and returns with
///    `from_cache: true`.
/// 2. On miss, sliding-window admission. A rejection surfaces unchanged and
///    is never retried within the same call.
/// 3. The provider call runs under the retry policy with a per-attempt
///    timeout; only transient classifications are retried.
/// 4. Success stores the response through both cache tiers and records a
///    success outcome; failure records a failure outcome and rethrows.
///
/// Two concurrent misses for the same key may both call the provider; the
/// gateway does not coalesce identical in-flight requests.
pub struct Gateway {
    pub(crate) config: GatewayConfig,
    pub(crate) provider: Arc<dyn Provider>,
    pub(crate) cache: Arc<TieredCache>,
    pub(crate) normalizer: KeyNormalizer,
    pub(crate) limiter: SlidingWindowLimiter,
    pub(crate) accountant: UsageAccountant,
    pub(crate) retry_policy: RetryPolicy,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway").finish_non_exhaustive()
    }
}

impl Gateway {
    pub fn builder(config: GatewayConfig) -> GatewayBuilder {
        GatewayBuilder::new(config)
    }

    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.config.default_model.clone());

        let key: Option<CacheKey> = if request.bypass_cache {
            None
        } else {
            Some(self.normalizer.normalize(&request))
        };

        if let Some(key) = &key {
            if let Some(cached) = self.cache.get::<GenerationResponse>(key).await {
                return Ok(self.serve_from_cache(cached, &request));
            }
        }

        // Admission control is not retried; a rejection never reaches the
        // provider and is not a completed provider interaction.
        self.limiter.check()?;

        let started = Instant::now();
        let provider = Arc::clone(&self.provider);
        let timeout = self.config.request_timeout;
        let attempt_request = request.clone();
        let attempt_model = model.clone();

        let result = RetryExecutor::run(&self.retry_policy, move || {
            let provider = Arc::clone(&provider);
            let request = attempt_request.clone();
            let model = attempt_model.clone();
            async move {
                match tokio::time::timeout(timeout, provider.generate(&request, &model)).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::transient(
                        format!("provider call timed out after {}ms", timeout.as_millis()),
                        None,
                    )),
                }
            }
        })
        .await;

        match result {
            Ok(response) => {
                if let Some(key) = &key {
                    self.cache.set(key, &response, self.config.cache_ttl);
                }
                self.accountant.record(&RequestOutcome {
                    model: response.model.clone(),
                    account_tag: request.account_tag.clone(),
                    success: true,
                    usage: response.usage,
                    latency: started.elapsed(),
                    from_cache: false,
                });
                Ok(response)
            }
            Err(err) => {
                warn!(model = %model, error = %err, "generation failed");
                self.accountant.record(&RequestOutcome {
                    model,
                    account_tag: request.account_tag.clone(),
                    success: false,
                    usage: TokenUsage::default(),
                    latency: started.elapsed(),
                    from_cache: false,
                });
                Err(err)
            }
        }
    }

    /// Aggregated usage, optionally filtered by date range.
    pub fn query_statistics(&self, filter: &StatsFilter) -> UsageStatistics {
        self.accountant.query(filter)
    }

    pub fn status(&self) -> GatewayStatus {
        GatewayStatus {
            configured: !self.config.api_key.trim().is_empty(),
            model: self.config.default_model.clone(),
            rate_limit: self.limiter.snapshot(),
            cache: self.cache.stats(),
        }
    }

    /// Removes cached entries from both tiers; glob pattern optional.
    pub async fn invalidate_cache(&self, pattern: Option<&str>) -> Result<usize> {
        self.cache.clear(pattern).await
    }

    /// Clears usage counters. Test support.
    pub fn reset_statistics(&self) {
        self.accountant.reset();
    }

    fn serve_from_cache(
        &self,
        cached: GenerationResponse,
        request: &GenerationRequest,
    ) -> GenerationResponse {
        debug!(model = %cached.model, "serving response from cache");
        let mut response = cached;
        response.metadata.from_cache = true;
        response.metadata.latency_ms = 0;
        // Statistics reflect logical usage: the cached token counts count,
        // the avoided network call does not.
        self.accountant.record(&RequestOutcome {
            model: response.model.clone(),
            account_tag: request.account_tag.clone(),
            success: true,
            usage: response.usage,
            latency: Duration::ZERO,
            from_cache: true,
        });
        response
    }
}
