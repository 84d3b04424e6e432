//! Local in-memory cache tier.

use regex::Regex;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// One cached value. Owned exclusively by this tier; the remote tier holds
/// its own serialized copy and entries are never shared by reference.
struct CacheEntry {
    data: Vec<u8>,
    stored_at: Instant,
    ttl: Duration,
    access_count: u64,
}

impl CacheEntry {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data,
            stored_at: Instant::now(),
            ttl,
            access_count: 0,
        }
    }

    fn is_expired(&self) -> bool {
        self.stored_at.elapsed() >= self.ttl
    }

    #[cfg(test)]
    fn remaining_ttl(&self) -> Duration {
        self.ttl.saturating_sub(self.stored_at.elapsed())
    }
}

/// The fast tier: always present, process-local. Expiry is lazy (checked on
/// read); eviction drops the least-recently-accessed entry when the tier is
/// full. All operations complete synchronously under the lock, so no
/// interleaving can observe a half-applied mutation.
pub(crate) struct LocalTier {
    entries: Mutex<HashMap<String, CacheEntry>>,
    max_entries: usize,
    ttl_ceiling: Duration,
}

impl LocalTier {
    pub fn new(max_entries: usize, ttl_ceiling: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries,
            ttl_ceiling,
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                None
            }
            Some(entry) => {
                entry.access_count += 1;
                Some(entry.data.clone())
            }
            None => None,
        }
    }

    /// Stores `data` with `min(ttl, ceiling)`. The ceiling bounds staleness
    /// in this tier regardless of what the caller requested.
    pub fn set(&self, key: &str, data: Vec<u8>, ttl: Duration) {
        let capped = ttl.min(self.ttl_ceiling);
        let mut entries = self.entries.lock().unwrap();
        self.evict_if_needed(&mut entries);
        entries.insert(key.to_string(), CacheEntry::new(data, capped));
    }

    pub fn delete(&self, key: &str) -> bool {
        self.entries.lock().unwrap().remove(key).is_some()
    }

    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let removed = entries.len();
        entries.clear();
        removed
    }

    pub fn clear_matching(&self, pattern: &Regex) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|k, _| !pattern.is_match(k));
        before - entries.len()
    }

    /// Live (non-expired) entry count.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap()
            .values()
            .filter(|e| !e.is_expired())
            .count()
    }

    /// Remaining TTL of a live entry, for reporting.
    #[cfg(test)]
    pub fn remaining_ttl(&self, key: &str) -> Option<Duration> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(key)
            .filter(|e| !e.is_expired())
            .map(|e| e.remaining_ttl())
    }

    /// Drops expired entries eagerly. Called by the optional reaper task;
    /// reads do not depend on it.
    pub fn sweep_expired(&self) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired());
        before - entries.len()
    }

    fn evict_if_needed(&self, entries: &mut HashMap<String, CacheEntry>) {
        entries.retain(|_, e| !e.is_expired());
        while entries.len() >= self.max_entries {
            let coldest = entries
                .iter()
                .min_by_key(|(_, e)| (e.access_count, e.stored_at))
                .map(|(k, _)| k.clone());
            match coldest {
                Some(k) => {
                    entries.remove(&k);
                }
                None => break,
            }
        }
    }
}
