//! Cache key derivation.

use crate::types::GenerationRequest;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// A derived cache key. The hash alone addresses the entry; the model is
/// kept alongside for logging and pattern-based invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub hash: String,
    pub model: Option<String>,
}

impl CacheKey {
    pub fn new(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.hash)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Derives a stable digest from the semantically relevant request fields.
///
/// Caller identity (`account_tag`) and free-form `metadata` are stripped so
/// that two requests differing only in who asked or why collapse to the same
/// key. Fields are canonicalized through a `BTreeMap` before hashing, so the
/// digest never depends on field ordering. `normalize` is total: it cannot
/// fail for any request.
#[derive(Debug, Clone, Default)]
pub struct KeyNormalizer {
    salt: Option<String>,
}

impl KeyNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespace the digests, e.g. per deployment, so instances sharing a
    /// remote tier do not cross-serve entries.
    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    pub fn normalize(&self, request: &GenerationRequest) -> CacheKey {
        let mut parts: BTreeMap<&str, String> = BTreeMap::new();
        parts.insert("prompt", request.prompt.clone());
        if let Some(model) = &request.model {
            parts.insert("model", model.clone());
        }
        if let Some(t) = request.temperature {
            // Fixed precision keeps 0.7 and 0.70 on the same key.
            parts.insert("temperature", format!("{t:.2}"));
        }
        if let Some(max) = request.max_tokens {
            parts.insert("max_tokens", max.to_string());
        }
        if let Some(stop) = &request.stop {
            parts.insert("stop", stop.join("\u{1f}"));
        }
        if let Some(salt) = &self.salt {
            parts.insert("salt", salt.clone());
        }

        let canonical = serde_json::to_string(&parts).unwrap_or_else(|_| {
            parts
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("&")
        });

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let hash: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();

        let mut key = CacheKey::new(hash);
        if let Some(model) = &request.model {
            key = key.with_model(model.clone());
        }
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request() -> GenerationRequest {
        GenerationRequest::new("summarize this article")
            .with_model("gpt-4o-mini")
            .with_temperature(0.7)
            .with_max_tokens(256)
    }

    #[test]
    fn account_tag_and_metadata_do_not_change_the_key() {
        let normalizer = KeyNormalizer::new();
        let plain = normalizer.normalize(&base_request());
        let tagged = normalizer.normalize(
            &base_request()
                .with_account_tag("acct-42")
                .with_metadata(serde_json::json!({"reason": "nightly batch"})),
        );
        assert_eq!(plain, tagged);
    }

    #[test]
    fn semantic_fields_change_the_key() {
        let normalizer = KeyNormalizer::new();
        let base = normalizer.normalize(&base_request());
        assert_ne!(
            base,
            normalizer.normalize(&base_request().with_temperature(0.9))
        );
        assert_ne!(
            base,
            normalizer.normalize(&GenerationRequest::new("different prompt").with_model("gpt-4o-mini"))
        );
        assert_ne!(base, normalizer.normalize(&base_request().with_model("gpt-4o")));
    }

    #[test]
    fn temperature_precision_is_canonical() {
        let normalizer = KeyNormalizer::new();
        let a = normalizer.normalize(&base_request().with_temperature(0.7));
        let b = normalizer.normalize(&base_request().with_temperature(0.70));
        assert_eq!(a, b);
    }

    #[test]
    fn salt_separates_namespaces() {
        let req = base_request();
        let a = KeyNormalizer::new().normalize(&req);
        let b = KeyNormalizer::new().with_salt("staging").normalize(&req);
        assert_ne!(a, b);
    }

    #[test]
    fn bypass_flag_does_not_change_the_key() {
        let normalizer = KeyNormalizer::new();
        let a = normalizer.normalize(&base_request());
        let b = normalizer.normalize(&base_request().bypass_cache());
        assert_eq!(a, b);
    }
}
