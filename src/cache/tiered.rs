//! Two-tier response cache.

use super::key::CacheKey;
use super::local::LocalTier;
use super::remote::RemoteTier;
use crate::{Error, Result};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, warn};

/// Point-in-time cache health, exposed through the gateway status endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    /// Live entry count in the local tier.
    pub size: usize,
    /// Whether the last remote-tier interaction succeeded. Always `false`
    /// when no remote tier is configured.
    pub remote_connected: bool,
}

struct AtomicCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Two-level cache: a fast local tier always present, an optional shared
/// remote tier behind [`RemoteTier`].
///
/// Reads check local first and fall through to the remote tier, backfilling
/// the local tier on a remote hit with a TTL capped to
/// `min(remaining remote TTL, local ceiling)`. Writes land locally right
/// away; the remote write is a detached task that never blocks or fails the
/// caller. Remote outages degrade silently to local-only operation and are
/// visible only through [`CacheStats::remote_connected`].
pub struct TieredCache {
    local: LocalTier,
    remote: Option<Arc<dyn RemoteTier>>,
    counters: AtomicCounters,
    remote_connected: Arc<AtomicBool>,
}

impl TieredCache {
    pub fn new(
        max_entries: usize,
        local_ttl_ceiling: Duration,
        remote: Option<Arc<dyn RemoteTier>>,
    ) -> Self {
        Self {
            local: LocalTier::new(max_entries, local_ttl_ceiling),
            remote,
            counters: AtomicCounters {
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            },
            remote_connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Looks up `key`, local tier first. Local and remote hits count against
    /// the same hit statistic; only a full miss counts as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        if let Some(data) = self.local.get(key.as_str()) {
            match serde_json::from_slice(&data) {
                Ok(value) => {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %key, tier = "local", "cache hit");
                    return Some(value);
                }
                Err(err) => {
                    // Undecodable entries are dropped, not served.
                    warn!(key = %key, error = %err, "evicting undecodable local cache entry");
                    self.local.delete(key.as_str());
                }
            }
        }

        if let Some(remote) = &self.remote {
            match remote.get(key.as_str()).await {
                Ok(Some(hit)) => {
                    self.remote_connected.store(true, Ordering::Relaxed);
                    match serde_json::from_slice(&hit.data) {
                        Ok(value) => {
                            self.counters.hits.fetch_add(1, Ordering::Relaxed);
                            debug!(key = %key, tier = "remote", "cache hit, backfilling local");
                            self.local.set(key.as_str(), hit.data, hit.remaining_ttl);
                            return Some(value);
                        }
                        Err(err) => {
                            warn!(key = %key, error = %err, "undecodable remote cache entry");
                        }
                    }
                }
                Ok(None) => {
                    self.remote_connected.store(true, Ordering::Relaxed);
                }
                Err(err) => {
                    self.remote_connected.store(false, Ordering::Relaxed);
                    warn!(key = %key, error = %err, "remote cache tier unreachable, degrading to local-only");
                }
            }
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Writes through both tiers. The local write is synchronous with the
    /// TTL capped to the local ceiling; the remote write carries the full
    /// TTL and runs as a detached task whose failure never reaches the
    /// caller.
    pub fn set<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        let data = match serde_json::to_vec(value) {
            Ok(data) => data,
            Err(err) => {
                warn!(key = %key, error = %err, "skipping cache store for unserializable value");
                return;
            }
        };

        self.local.set(key.as_str(), data.clone(), ttl);

        if let Some(remote) = &self.remote {
            let remote = Arc::clone(remote);
            let connected = Arc::clone(&self.remote_connected);
            let key = key.as_str().to_string();
            tokio::spawn(async move {
                match remote.set(&key, &data, ttl).await {
                    Ok(()) => connected.store(true, Ordering::Relaxed),
                    Err(err) => {
                        connected.store(false, Ordering::Relaxed);
                        warn!(key = %key, error = %err, "remote cache write failed");
                    }
                }
            });
        }
    }

    /// Removes `key` from both tiers; true if either tier held it.
    pub async fn delete(&self, key: &CacheKey) -> bool {
        let local_removed = self.local.delete(key.as_str());
        let mut remote_removed = false;
        if let Some(remote) = &self.remote {
            match remote.delete(key.as_str()).await {
                Ok(removed) => {
                    self.remote_connected.store(true, Ordering::Relaxed);
                    remote_removed = removed;
                }
                Err(err) => {
                    self.remote_connected.store(false, Ordering::Relaxed);
                    warn!(key = %key, error = %err, "remote cache delete failed");
                }
            }
        }
        local_removed || remote_removed
    }

    /// Flushes both tiers. With a glob-like pattern (`*` and `?` wildcards)
    /// only matching keys are removed. Returns the combined count removed.
    pub async fn clear(&self, pattern: Option<&str>) -> Result<usize> {
        let regex = pattern.map(glob_to_regex).transpose()?;

        let mut removed = match &regex {
            Some(re) => self.local.clear_matching(re),
            None => self.local.clear(),
        };

        if let Some(remote) = &self.remote {
            match remote.clear_matching(regex.as_ref()).await {
                Ok(n) => {
                    self.remote_connected.store(true, Ordering::Relaxed);
                    removed += n;
                }
                Err(err) => {
                    self.remote_connected.store(false, Ordering::Relaxed);
                    warn!(error = %err, "remote cache clear failed");
                }
            }
        }
        Ok(removed)
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
            size: self.local.len(),
            remote_connected: self.remote.is_some()
                && self.remote_connected.load(Ordering::Relaxed),
        }
    }

    pub fn remote_configured(&self) -> bool {
        self.remote.is_some()
    }

    /// Spawns a periodic sweep of expired local entries. Expiry remains
    /// correct without it (reads check lazily); the reaper only reclaims
    /// memory sooner. The task holds a `Weak` and exits once the cache is
    /// dropped.
    pub fn spawn_reaper(cache: &Arc<Self>, interval: Duration) {
        let weak: Weak<Self> = Arc::downgrade(cache);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(cache) => {
                        let swept = cache.local.sweep_expired();
                        if swept > 0 {
                            debug!(swept, "cache reaper removed expired entries");
                        }
                    }
                    None => break,
                }
            }
        });
    }
}

fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            c => expr.push_str(&regex::escape(&c.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr).map_err(|e| Error::Cache(format!("invalid clear pattern {pattern:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::remote::{InMemoryRemoteTier, RemoteHit};
    use async_trait::async_trait;

    /// Remote tier that fails every call, for degradation tests.
    struct UnreachableRemote;

    #[async_trait]
    impl RemoteTier for UnreachableRemote {
        async fn get(&self, _key: &str) -> Result<Option<RemoteHit>> {
            Err(Error::Cache("connection refused".into()))
        }
        async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<()> {
            Err(Error::Cache("connection refused".into()))
        }
        async fn delete(&self, _key: &str) -> Result<bool> {
            Err(Error::Cache("connection refused".into()))
        }
        async fn clear_matching(&self, _pattern: Option<&Regex>) -> Result<usize> {
            Err(Error::Cache("connection refused".into()))
        }
        fn name(&self) -> &'static str {
            "unreachable"
        }
    }

    fn key(hash: &str) -> CacheKey {
        CacheKey::new(hash)
    }

    #[tokio::test]
    async fn local_round_trip() {
        let cache = TieredCache::new(10, Duration::from_secs(60), None);
        cache.set(&key("k1"), &"hello".to_string(), Duration::from_secs(30));
        let got: Option<String> = cache.get(&key("k1")).await;
        assert_eq!(got, Some("hello".to_string()));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
        assert!(!stats.remote_connected);
    }

    #[tokio::test]
    async fn full_miss_increments_miss_counter() {
        let cache = TieredCache::new(10, Duration::from_secs(60), None);
        let got: Option<String> = cache.get(&key("absent")).await;
        assert!(got.is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn remote_hit_backfills_local() {
        let remote = Arc::new(InMemoryRemoteTier::new());
        remote
            .set("k1", &serde_json::to_vec(&"shared".to_string()).unwrap(), Duration::from_secs(120))
            .await
            .unwrap();

        let cache = TieredCache::new(10, Duration::from_secs(60), Some(remote.clone()));
        let got: Option<String> = cache.get(&key("k1")).await;
        assert_eq!(got, Some("shared".to_string()));
        assert_eq!(cache.stats().hits, 1);
        assert!(cache.stats().remote_connected);

        // Remove from remote: the backfilled local copy still serves.
        remote.delete("k1").await.unwrap();
        let again: Option<String> = cache.get(&key("k1")).await;
        assert_eq!(again, Some("shared".to_string()));
    }

    #[tokio::test]
    async fn unreachable_remote_degrades_to_local_only() {
        let cache = TieredCache::new(10, Duration::from_secs(60), Some(Arc::new(UnreachableRemote)));

        cache.set(&key("k1"), &"v".to_string(), Duration::from_secs(30));
        // Let the detached remote write run and fail.
        tokio::task::yield_now().await;

        let got: Option<String> = cache.get(&key("k1")).await;
        assert_eq!(got, Some("v".to_string()));

        let _: Option<String> = cache.get(&key("absent")).await;
        assert!(!cache.stats().remote_connected);
    }

    #[tokio::test]
    async fn set_propagates_to_remote_tier() {
        let remote = Arc::new(InMemoryRemoteTier::new());
        let cache = TieredCache::new(10, Duration::from_secs(60), Some(remote.clone()));

        cache.set(&key("k1"), &"v".to_string(), Duration::from_secs(300));
        // The remote write is fire-and-forget; give it a moment.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let hit = remote.get("k1").await.unwrap().expect("remote copy");
        // Remote keeps the full TTL, not the local ceiling.
        assert!(hit.remaining_ttl > Duration::from_secs(250));
    }

    #[tokio::test]
    async fn delete_removes_from_both_tiers() {
        let remote = Arc::new(InMemoryRemoteTier::new());
        let cache = TieredCache::new(10, Duration::from_secs(60), Some(remote.clone()));
        cache.set(&key("k1"), &"v".to_string(), Duration::from_secs(30));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(cache.delete(&key("k1")).await);
        let got: Option<String> = cache.get(&key("k1")).await;
        assert!(got.is_none());
        assert!(remote.get("k1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_with_pattern_counts_both_tiers() {
        let remote = Arc::new(InMemoryRemoteTier::new());
        let cache = TieredCache::new(10, Duration::from_secs(60), Some(remote.clone()));

        cache.set(&key("gen:a"), &"1".to_string(), Duration::from_secs(30));
        cache.set(&key("gen:b"), &"2".to_string(), Duration::from_secs(30));
        cache.set(&key("misc"), &"3".to_string(), Duration::from_secs(30));
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Two local + two remote copies match.
        let removed = cache.clear(Some("gen:*")).await.unwrap();
        assert_eq!(removed, 4);
        let kept: Option<String> = cache.get(&key("misc")).await;
        assert!(kept.is_some());
    }

    #[tokio::test]
    async fn reaper_sweeps_expired_entries() {
        let cache = Arc::new(TieredCache::new(10, Duration::from_secs(60), None));
        cache.set(&key("short"), &"v".to_string(), Duration::from_millis(10));
        TieredCache::spawn_reaper(&cache, Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.stats().size, 0);
    }
}
