//! Sliding-window admission control.

use crate::{Error, Result};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimiterConfig {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

/// Point-in-time occupancy, for health reporting.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RateLimiterSnapshot {
    pub max_requests: u32,
    pub window_ms: u64,
    pub in_window: u32,
    /// Time until the oldest admitted request ages out, when the window is
    /// full.
    pub estimated_wait_ms: Option<u64>,
}

/// Process-scoped sliding-window limiter.
///
/// Holds the admitted timestamps in a deque bounded to the window; each
/// `check` prunes aged-out entries and admits or rejects synchronously under
/// the lock, so concurrent checks cannot oversubscribe the budget. Rejected
/// attempts are not recorded against the window.
///
/// This is local admission control only. Multiple gateway instances each
/// enforce their own share of a global budget; exact distributed enforcement
/// is out of scope.
pub struct SlidingWindowLimiter {
    cfg: RateLimiterConfig,
    admitted: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(cfg: RateLimiterConfig) -> Self {
        Self {
            admitted: Mutex::new(VecDeque::with_capacity(cfg.max_requests as usize)),
            cfg,
        }
    }

    /// Admits the call or returns [`Error::RateLimitExceeded`] carrying the
    /// limit and window for caller-facing messaging.
    pub fn check(&self) -> Result<()> {
        let mut admitted = self.admitted.lock().unwrap();
        let now = Instant::now();
        Self::prune(&self.cfg, &mut admitted, now);

        if admitted.len() as u32 >= self.cfg.max_requests {
            return Err(Error::RateLimitExceeded {
                max_requests: self.cfg.max_requests,
                window: self.cfg.window,
            });
        }
        admitted.push_back(now);
        Ok(())
    }

    pub fn snapshot(&self) -> RateLimiterSnapshot {
        let mut admitted = self.admitted.lock().unwrap();
        let now = Instant::now();
        Self::prune(&self.cfg, &mut admitted, now);

        let in_window = admitted.len() as u32;
        let estimated_wait_ms = if in_window >= self.cfg.max_requests {
            admitted.front().map(|oldest| {
                let expires = *oldest + self.cfg.window;
                expires.saturating_duration_since(now).as_millis() as u64
            })
        } else {
            None
        };

        RateLimiterSnapshot {
            max_requests: self.cfg.max_requests,
            window_ms: self.cfg.window.as_millis() as u64,
            in_window,
            estimated_wait_ms,
        }
    }

    fn prune(cfg: &RateLimiterConfig, admitted: &mut VecDeque<Instant>, now: Instant) {
        if let Some(horizon) = now.checked_sub(cfg.window) {
            while admitted.front().is_some_and(|t| *t <= horizon) {
                admitted.pop_front();
            }
        }
    }
}
