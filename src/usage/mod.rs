//! Live usage and cost accounting.
//!
//! One [`UsageAccountant`] is created at gateway construction and mutated on
//! every completed provider interaction (success or failure); statistics
//! queries read without mutating. Updates run in a single synchronous
//! critical section under the lock, so concurrent `generate` calls cannot
//! observe or produce half-applied counters.

mod pricing;

pub use pricing::{cost_for, rate_for, ModelRate, DEFAULT_RATE};

use crate::types::TokenUsage;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::RwLock;
use std::time::Duration;

/// One completed provider interaction, as reported by the gateway.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    pub model: String,
    pub account_tag: Option<String>,
    pub success: bool,
    pub usage: TokenUsage,
    pub latency: Duration,
    /// Served from cache: counted as logical usage with zero added latency
    /// and zero added cost (no paid call happened).
    pub from_cache: bool,
}

/// Per-slice counters shared by the model/account/day breakdowns.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageBucket {
    pub requests: u64,
    pub successful: u64,
    pub failed: u64,
    pub total_tokens: u64,
    pub cost: f64,
    pub latency_ms_sum: u64,
}

impl UsageBucket {
    fn apply(&mut self, outcome: &RequestOutcome, cost: f64) {
        self.requests += 1;
        if outcome.success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        self.total_tokens += u64::from(outcome.usage.total_tokens);
        self.cost += cost;
        self.latency_ms_sum += outcome.latency.as_millis() as u64;
    }

    fn merge(&mut self, other: &UsageBucket) {
        self.requests += other.requests;
        self.successful += other.successful;
        self.failed += other.failed;
        self.total_tokens += other.total_tokens;
        self.cost += other.cost;
        self.latency_ms_sum += other.latency_ms_sum;
    }
}

/// Aggregated statistics. `total_requests == successful_requests +
/// failed_requests` holds after every completed update, and each breakdown
/// sums back to the totals when no filter is applied.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageStatistics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub average_latency_ms: f64,
    pub cache_hits: u64,
    pub by_model: HashMap<String, UsageBucket>,
    pub by_account: HashMap<String, UsageBucket>,
    pub by_day: BTreeMap<NaiveDate, UsageBucket>,
}

/// Optional date-range filter for statistics queries (inclusive bounds).
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl StatsFilter {
    pub fn is_empty(&self) -> bool {
        self.start_date.is_none() && self.end_date.is_none()
    }
}

struct Inner {
    stats: UsageStatistics,
    latency_ms_sum: u64,
}

/// Thread-safe aggregation of request counts, tokens, latency, and derived
/// cost, sliceable by model, account, and calendar day.
pub struct UsageAccountant {
    inner: RwLock<Inner>,
}

impl UsageAccountant {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                stats: UsageStatistics::default(),
                latency_ms_sum: 0,
            }),
        }
    }

    pub fn record(&self, outcome: &RequestOutcome) {
        // Cost accrues only for calls that actually hit the provider.
        let cost = if outcome.success && !outcome.from_cache {
            pricing::cost_for(
                &outcome.model,
                outcome.usage.prompt_tokens,
                outcome.usage.completion_tokens,
            )
        } else {
            0.0
        };
        let account = outcome.account_tag.as_deref().unwrap_or("untagged");
        let day = Utc::now().date_naive();

        let mut inner = self.inner.write().unwrap();
        let stats = &mut inner.stats;

        stats.total_requests += 1;
        if outcome.success {
            stats.successful_requests += 1;
        } else {
            stats.failed_requests += 1;
        }
        if outcome.from_cache {
            stats.cache_hits += 1;
        }
        stats.total_tokens += u64::from(outcome.usage.total_tokens);
        stats.total_cost += cost;

        stats
            .by_model
            .entry(outcome.model.clone())
            .or_default()
            .apply(outcome, cost);
        stats
            .by_account
            .entry(account.to_string())
            .or_default()
            .apply(outcome, cost);
        stats.by_day.entry(day).or_default().apply(outcome, cost);

        inner.latency_ms_sum += outcome.latency.as_millis() as u64;
        inner.stats.average_latency_ms = if inner.stats.total_requests == 0 {
            0.0
        } else {
            inner.latency_ms_sum as f64 / inner.stats.total_requests as f64
        };
    }

    /// Returns a possibly date-filtered view. A filtered view recomputes its
    /// totals from the day buckets in range rather than echoing the global
    /// totals; the model/account breakdowns are not day-sliced and are
    /// omitted from filtered views.
    pub fn query(&self, filter: &StatsFilter) -> UsageStatistics {
        let inner = self.inner.read().unwrap();
        if filter.is_empty() {
            return inner.stats.clone();
        }

        // An inverted range is empty, not a panic.
        if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
            if start > end {
                return UsageStatistics::default();
            }
        }

        let start = filter
            .start_date
            .map_or(Bound::Unbounded, Bound::Included);
        let end = filter.end_date.map_or(Bound::Unbounded, Bound::Included);

        let mut totals = UsageBucket::default();
        let mut by_day = BTreeMap::new();
        for (day, bucket) in inner.stats.by_day.range((start, end)) {
            totals.merge(bucket);
            by_day.insert(*day, bucket.clone());
        }

        // Cache hits are not tracked per day, so a filtered view reports 0.
        UsageStatistics {
            total_requests: totals.requests,
            successful_requests: totals.successful,
            failed_requests: totals.failed,
            total_tokens: totals.total_tokens,
            total_cost: totals.cost,
            average_latency_ms: if totals.requests == 0 {
                0.0
            } else {
                totals.latency_ms_sum as f64 / totals.requests as f64
            },
            cache_hits: 0,
            by_model: HashMap::new(),
            by_account: HashMap::new(),
            by_day,
        }
    }

    /// Clears all counters. Test support; production statistics live for the
    /// process lifetime.
    pub fn reset(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.stats = UsageStatistics::default();
        inner.latency_ms_sum = 0;
    }
}

impl Default for UsageAccountant {
    fn default() -> Self {
        Self::new()
    }
}
