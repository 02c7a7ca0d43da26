use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use crate::metrics::RATE_LIMIT_CLIENTS;

// Rate limit entry - tracks admitted requests per client id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_time: i64, // unix millis when the window ends
}

/// Fixed window counter keyed by client id.
///
/// A client gets `max_requests` admissions per window; the window starts at
/// its first request and the count goes back to 1 on the first request after
/// `reset_time`. Bursts straddling a boundary can therefore see up to twice
/// the limit.
pub struct RateLimiter {
    entries: DashMap<String, RateLimitEntry>,
    max_requests: u32,
    window_ms: i64,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_requests,
            window_ms: i64::try_from(window.as_millis()).unwrap_or(i64::MAX),
        }
    }

    // Admission check against the wall clock
    pub fn check(&self, client_id: &str) -> bool {
        self.check_at(client_id, now_millis())
    }

    /// Admission check at an explicit time (unix millis).
    ///
    /// The whole read-modify-write happens under the entry's shard lock, so
    /// concurrent checks for the same client never lose an increment.
    pub fn check_at(&self, client_id: &str, now: i64) -> bool {
        match self.entries.entry(client_id.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(self.fresh_entry(now));
                true
            }
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();

                // window expired..? start a new one
                if now > entry.reset_time {
                    *entry = self.fresh_entry(now);
                    return true;
                }

                if entry.count >= self.max_requests {
                    return false;
                }

                entry.count += 1;
                true
            }
        }
    }

    #[cfg(test)]
    pub fn entry(&self, client_id: &str) -> Option<RateLimitEntry> {
        self.entries.get(client_id).map(|e| *e)
    }

    /// Drops every entry whose window ended before `now`, returning how many
    /// were removed. Those clients start a fresh window on their next request
    /// anyway, so removal does not change any admission decision.
    pub fn sweep_expired(&self, now: i64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.reset_time >= now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn fresh_entry(&self, now: i64) -> RateLimitEntry {
        RateLimitEntry {
            count: 1,
            reset_time: now.saturating_add(self.window_ms),
        }
    }
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// Periodic sweep of expired windows, keeps the map from growing forever
pub async fn sweeper(limiter: Arc<RateLimiter>, every: Duration) {
    let mut interval = interval(every);

    tracing::info!(interval = ?every, "rate limit sweeper started");

    loop {
        interval.tick().await;

        let removed = limiter.sweep_expired(now_millis());
        RATE_LIMIT_CLIENTS.set(limiter.len() as f64);

        if removed > 0 {
            tracing::debug!(removed, remaining = limiter.len(), "swept expired rate limit entries");
        }
    }
}
