//! Per-client request limiting

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::ClientId;

/// Token bucket per client: `capacity` requests, fully refilled every `window`
#[derive(Debug)]
pub struct RateLimiter {
    capacity: u32,
    window: Duration,
    buckets: HashMap<ClientId, Bucket>,
}

#[derive(Debug)]
struct Bucket {
    remaining: u32,
    window_start: Instant,
}

impl RateLimiter {
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self {
            capacity,
            window,
            buckets: HashMap::new(),
        }
    }

    /// Returns `true` if the request is allowed, `false` if limited
    pub fn check(&mut self, client_id: &ClientId) -> bool {
        self.check_at(client_id, Instant::now())
    }

    /// Same as [`check`](Self::check) with an explicit current instant
    pub fn check_at(&mut self, client_id: &ClientId, now: Instant) -> bool {
        let capacity = self.capacity;
        let bucket = self.buckets.entry(client_id.clone()).or_insert(Bucket {
            remaining: capacity,
            window_start: now,
        });

        if now.saturating_duration_since(bucket.window_start) >= self.window {
            bucket.remaining = capacity;
            bucket.window_start = now;
        }

        match bucket.remaining.checked_sub(1) {
            Some(left) => {
                bucket.remaining = left;
                true
            }
            None => false,
        }
    }

    pub fn remove_client(&mut self, client_id: &ClientId) {
        self.buckets.remove(client_id);
    }

    /// Drop buckets whose window started more than `stale_after` ago
    pub fn cleanup(&mut self, stale_after: Duration) {
        let now = Instant::now();
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.window_start) < stale_after);
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}
