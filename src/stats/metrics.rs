//! Statistics for the broadcaster

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Point-in-time broadcaster statistics
#[derive(Debug, Clone, Default)]
pub struct BroadcastStats {
    /// Frames read off the source and fanned out
    pub frames_published: u64,
    /// Successful per-subscriber handoffs
    pub frames_delivered: u64,
    /// Subscribers removed by the broadcaster
    pub evictions: u64,
    /// Subscriptions ever created
    pub total_subscriptions: u64,
    /// Currently active subscribers
    pub subscriber_count: usize,
    /// Time since the broadcaster was created
    pub uptime: Duration,
}

impl BroadcastStats {
    /// Average number of subscribers reached per published frame
    pub fn mean_fanout(&self) -> f64 {
        if self.frames_published == 0 {
            0.0
        } else {
            self.frames_delivered as f64 / self.frames_published as f64
        }
    }
}

/// Live counters behind [`BroadcastStats`]
#[derive(Debug)]
pub(crate) struct BroadcastCounters {
    started_at: Instant,
    frames_published: AtomicU64,
    frames_delivered: AtomicU64,
    evictions: AtomicU64,
    total_subscriptions: AtomicU64,
}

impl BroadcastCounters {
    pub(crate) fn new() -> Self {
        Self {
            started_at: Instant::now(),
            frames_published: AtomicU64::new(0),
            frames_delivered: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            total_subscriptions: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_published(&self, delivered: u64, evicted: u64) {
        self.frames_published.fetch_add(1, Ordering::Relaxed);
        self.frames_delivered.fetch_add(delivered, Ordering::Relaxed);
        self.evictions.fetch_add(evicted, Ordering::Relaxed);
    }

    pub(crate) fn record_subscription(&self) {
        self.total_subscriptions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, subscriber_count: usize) -> BroadcastStats {
        BroadcastStats {
            frames_published: self.frames_published.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            total_subscriptions: self.total_subscriptions.load(Ordering::Relaxed),
            subscriber_count,
            uptime: self.started_at.elapsed(),
        }
    }
}
