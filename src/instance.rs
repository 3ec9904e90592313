//! Envelope tracking the lifecycle of a pooled resource

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam::atomic::AtomicCell;
use tokio::time::{Duration, Instant};

/// A resource together with its usage metadata
///
/// At any moment an envelope is owned by exactly one party: the available
/// store, the caller holding it, or the destruction path.
pub(crate) struct PooledInstance<T> {
    pub resource: T,
    created_at: Instant,
    last_used_at: AtomicCell<Instant>,
    use_count: AtomicUsize,
}

impl<T> PooledInstance<T> {
    pub fn new(resource: T) -> Self {
        let now = Instant::now();
        Self {
            resource,
            created_at: now,
            last_used_at: AtomicCell::new(now),
            use_count: AtomicUsize::new(0),
        }
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_used_at(&self) -> Instant {
        self.last_used_at.load()
    }

    pub fn use_count(&self) -> usize {
        self.use_count.load(Ordering::Relaxed)
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_used_at.load())
    }

    pub fn is_idle(&self, now: Instant, max_idle: Duration) -> bool {
        self.idle_for(now) > max_idle
    }

    /// Stamp a checkout and return the new use count.
    pub fn mark_checked_out(&self, now: Instant) -> usize {
        self.last_used_at.store(now);
        self.use_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Stamp a return and hand back the previous last-use time.
    pub fn mark_returned(&self, now: Instant) -> Instant {
        self.last_used_at.swap(now)
    }

    pub fn into_resource(self) -> T {
        self.resource
    }
}
