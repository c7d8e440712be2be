//! Per-requester admission control
//!
//! A sliding-window limiter: each requester may be admitted at most
//! `max_requests` times within any window of length `window`. Timestamps older
//! than the window are pruned lazily on every check.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::config::RateLimitConfig;
use crate::types::RequesterId;

/// Admission timestamps of a single requester, oldest first
#[derive(Debug, Default)]
struct Window {
    admitted: VecDeque<Instant>,
}

impl Window {
    /// Drop timestamps that fell out of the window ending at `now`
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.admitted.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }

    /// Admit at `now` if the quota allows, otherwise report the wait time
    fn try_admit(&mut self, now: Instant, window: Duration, quota: usize) -> Option<Duration> {
        self.prune(now, window);

        if self.admitted.len() >= quota {
            // The oldest admission leaves the window first
            let wait = self
                .admitted
                .front()
                .map(|&oldest| window.saturating_sub(now.saturating_duration_since(oldest)))
                .unwrap_or(window);
            Some(wait)
        } else {
            self.admitted.push_back(now);
            None
        }
    }
}

/// Sliding-window rate limiter with per-requester tracking
pub struct RateLimiter {
    /// Per-requester admission windows
    windows: Mutex<HashMap<RequesterId, Window>>,
    /// Configuration
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Create a new rate limiter from configuration
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Check whether `requester` may be admitted at `now`
    ///
    /// Returns `None` and records the admission when accepted. Returns the time until
    /// the next slot frees up when rejected; a rejection does not change any state.
    pub async fn check(&self, requester: RequesterId, now: Instant) -> Option<Duration> {
        let quota = self.config.max_requests as usize;
        let mut windows = self.windows.lock().await;
        windows
            .entry(requester)
            .or_default()
            .try_admit(now, self.config.window, quota)
    }

    /// Boolean form of [`check`](Self::check)
    pub async fn admit(&self, requester: RequesterId, now: Instant) -> bool {
        self.check(requester, now).await.is_none()
    }

    /// Remove requesters whose windows are empty at `now`
    ///
    /// Keeps the map from growing with every requester ever seen. Returns how many
    /// entries were dropped.
    pub async fn purge_idle(&self, now: Instant) -> usize {
        let window = self.config.window;
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, w| {
            w.prune(now, window);
            !w.admitted.is_empty()
        });
        before - windows.len()
    }

    /// Number of requesters currently tracked
    pub async fn tracked_requesters(&self) -> usize {
        self.windows.lock().await.len()
    }
}
