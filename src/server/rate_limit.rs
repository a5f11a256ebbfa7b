use std::collections::HashMap;
use std::sync::{ Arc, Mutex, MutexGuard };
use std::time::Duration;

use log::debug;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::RateLimitSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub window_reset_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed {
        remaining: u32,
    },
    Limited {
        retry_after: Duration,
    },
}

/// Fixed-window request counter keyed by client address.
///
/// Expired windows are reset lazily on the next access for that key; the sweeper only
/// bounds memory. Counting is best-effort and the table is lost on restart.
#[derive(Debug)]
pub struct RateLimiter {
    settings: RateLimitSettings,
    entries: Mutex<HashMap<String, RateLimitEntry>>,
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            settings,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.settings.window
    }

    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let window = self.settings.window;
        let mut entries = self.lock();
        let entry = entries.entry(key.to_owned()).or_insert(RateLimitEntry {
            count: 0,
            window_reset_at: now + window,
        });

        if now >= entry.window_reset_at {
            entry.count = 0;
            entry.window_reset_at = now + window;
        }

        if entry.count >= self.settings.max_requests {
            return RateDecision::Limited { retry_after: window };
        }

        entry.count += 1;
        RateDecision::Allowed {
            remaining: self.settings.max_requests - entry.count,
        }
    }

    /// Drops every entry whose window has expired and returns how many were removed.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| now < entry.window_reset_at);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn spawn_sweeper(self: Arc<Self>) -> JoinHandle<()> {
        let period = self.settings.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = self.sweep_at(Instant::now());
                if removed > 0 {
                    debug!("Rate limit sweep removed {} expired entries ({} left)", removed, self.len());
                }
            }
        })
    }

    // A poisoned table still holds usable counters.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, RateLimitEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
