//! Short-lived "seen" markers for inbound events.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use {
    async_trait::async_trait,
    dashmap::{DashMap, mapref::entry::Entry},
};

const EVICT_EVERY_CHECKS: u64 = 256;

/// Shared marker store. A single-process deployment uses
/// [`MemoryDedupStore`]; several instances behind one webhook URL need a
/// shared backend implementing the same trait.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Mark `key` as seen for `ttl`. Returns `true` when it was already
    /// marked and the mark has not expired.
    async fn check_and_mark(&self, key: &str, ttl: Duration) -> bool;

    /// Forget `key` so its next delivery is handled again.
    async fn unmark(&self, key: &str);

    /// Drop expired marks. Returns how many were removed.
    async fn evict_expired(&self) -> usize;
}

/// Process-local [`DedupStore`] backed by a concurrent map of expiry
/// instants. Expired marks are evicted every few hundred checks.
#[derive(Default)]
pub struct MemoryDedupStore {
    marks: DashMap<String, Instant>,
    checks: AtomicU64,
}

impl MemoryDedupStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.marks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    fn check_and_mark_at(&self, key: &str, ttl: Duration, now: Instant) -> bool {
        let expires_at = now + ttl;
        let seen = match self.marks.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if *occupied.get() > now {
                    true
                } else {
                    occupied.insert(expires_at);
                    false
                }
            },
            Entry::Vacant(vacant) => {
                vacant.insert(expires_at);
                false
            },
        };

        let checks = self.checks.fetch_add(1, Ordering::Relaxed) + 1;
        if checks.is_multiple_of(EVICT_EVERY_CHECKS) {
            self.evict_at(now);
        }
        seen
    }

    fn evict_at(&self, now: Instant) -> usize {
        let before = self.marks.len();
        self.marks.retain(|_, expires_at| *expires_at > now);
        before.saturating_sub(self.marks.len())
    }
}

#[async_trait]
impl DedupStore for MemoryDedupStore {
    async fn check_and_mark(&self, key: &str, ttl: Duration) -> bool {
        self.check_and_mark_at(key, ttl, Instant::now())
    }

    async fn unmark(&self, key: &str) {
        self.marks.remove(key);
    }

    async fn evict_expired(&self) -> usize {
        self.evict_at(Instant::now())
    }
}
