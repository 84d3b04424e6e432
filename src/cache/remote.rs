//! Remote (shared) cache tier interface.
//!
//! The remote tier is an external store shared across gateway instances,
//! treated as a black box behind [`RemoteTier`]. Unreachability is never a
//! fatal condition; the tiered cache degrades to local-only operation and
//! reflects the outage through its health stats.

use crate::Result;
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// A remote-tier hit: the serialized value plus how long it remains valid.
/// The remaining TTL caps the local backfill TTL.
#[derive(Debug, Clone)]
pub struct RemoteHit {
    pub data: Vec<u8>,
    pub remaining_ttl: Duration,
}

#[async_trait]
pub trait RemoteTier: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<RemoteHit>>;
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<bool>;
    /// Removes every entry matching `pattern`, or everything when `None`.
    /// Returns the count removed.
    async fn clear_matching(&self, pattern: Option<&Regex>) -> Result<usize>;
    fn name(&self) -> &'static str;
}

/// In-memory implementation of the remote-tier contract.
///
/// Serves as the shared tier for single-host deployments and as the
/// reference implementation for tests; a networked store (e.g. Redis) slots
/// in behind the same trait.
pub struct InMemoryRemoteTier {
    entries: Mutex<HashMap<String, (Vec<u8>, Instant, Duration)>>,
}

impl InMemoryRemoteTier {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryRemoteTier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteTier for InMemoryRemoteTier {
    async fn get(&self, key: &str) -> Result<Option<RemoteHit>> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((data, stored_at, ttl)) => {
                let elapsed = stored_at.elapsed();
                if elapsed >= *ttl {
                    entries.remove(key);
                    Ok(None)
                } else {
                    Ok(Some(RemoteHit {
                        data: data.clone(),
                        remaining_ttl: *ttl - elapsed,
                    }))
                }
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), (value.to_vec(), Instant::now(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.lock().await.remove(key).is_some())
    }

    async fn clear_matching(&self, pattern: Option<&Regex>) -> Result<usize> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        match pattern {
            Some(re) => entries.retain(|k, _| !re.is_match(k)),
            None => entries.clear(),
        }
        Ok(before - entries.len())
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn remote_hit_carries_remaining_ttl() {
        let tier = InMemoryRemoteTier::new();
        tier.set("k", b"v", Duration::from_secs(60)).await.unwrap();
        let hit = tier.get("k").await.unwrap().unwrap();
        assert_eq!(hit.data, b"v");
        assert!(hit.remaining_ttl <= Duration::from_secs(60));
        assert!(hit.remaining_ttl > Duration::from_secs(55));
    }

    #[tokio::test]
    async fn expired_remote_entries_miss() {
        let tier = InMemoryRemoteTier::new();
        tier.set("k", b"v", Duration::from_millis(5)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(15)).await;
        assert!(tier.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_matching_counts_removals() {
        let tier = InMemoryRemoteTier::new();
        tier.set("a:1", b"x", Duration::from_secs(60)).await.unwrap();
        tier.set("a:2", b"x", Duration::from_secs(60)).await.unwrap();
        tier.set("b:1", b"x", Duration::from_secs(60)).await.unwrap();
        let re = Regex::new("^a:.*$").unwrap();
        assert_eq!(tier.clear_matching(Some(&re)).await.unwrap(), 2);
        assert_eq!(tier.clear_matching(None).await.unwrap(), 1);
    }
}
