//! Core request/response types for the gateway.
//!
//! Both types are ephemeral: the gateway never persists them, except that a
//! [`GenerationResponse`] may live in the response cache as a serialized copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A single outbound generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Model override; the gateway's default model is used when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Caller/account identifier for usage breakdowns. Excluded from cache
    /// key derivation: who asked does not change the answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_tag: Option<String>,
    /// Free-form caller metadata; also excluded from cache key derivation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Skip cache lookup and cache store for this request.
    #[serde(default)]
    pub bypass_cache: bool,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            temperature: None,
            max_tokens: None,
            stop: None,
            account_tag: None,
            metadata: None,
            bypass_cache: false,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn with_account_tag(mut self, tag: impl Into<String>) -> Self {
        self.account_tag = Some(tag.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn bypass_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }
}

/// Token accounting for a single provider round trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Delivery metadata attached to every response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub latency_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub from_cache: bool,
}

/// A completed generation, either fresh from the provider or replayed from
/// the cache (`metadata.from_cache` distinguishes the two).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub id: String,
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
    pub finish_reason: String,
    pub metadata: ResponseMetadata,
}

static RESPONSE_SEQ: AtomicU64 = AtomicU64::new(1);

/// Process-monotonic response id. Uniqueness holds within a process; the
/// provider correlation id (a UUID) covers cross-process tracing.
pub fn next_response_id() -> String {
    format!("resp-{:012}", RESPONSE_SEQ.fetch_add(1, Ordering::Relaxed))
}
