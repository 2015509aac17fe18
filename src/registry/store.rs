//! Subscriber registry implementation
//!
//! The set of active subscribers, guarded by a single mutex. The lock is
//! held only to mutate the set or copy it out; it is never held across a
//! delivery or a source read.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::entry::{EvictionReason, Lifecycle, SubscriberEntry, SubscriberState};
use super::frame::SubscriberId;
use super::subscription::Subscription;

/// Set of active subscribers, ordered by subscription time
pub struct SubscriberRegistry {
    inner: Mutex<RegistryInner>,
}

struct RegistryInner {
    subscribers: BTreeMap<SubscriberId, SubscriberEntry>,
    next_id: u64,
    /// Set once the publisher has stopped; later subscribers start closed
    closed: bool,
}

impl SubscriberRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                subscribers: BTreeMap::new(),
                next_id: 1,
                closed: false,
            }),
        }
    }

    /// Register a new subscriber and return its handle
    ///
    /// The queue holds at most one frame in flight; the publisher waits for
    /// the subscriber to take each frame, so it observes backpressure
    /// immediately.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        self.register().0
    }

    /// Like [`subscribe`](Self::subscribe), also reporting whether the
    /// subscriber entered the registry (false once closed)
    pub(super) fn register(self: &Arc<Self>) -> (Subscription, bool) {
        let (tx, rx) = mpsc::channel(1);
        let mut inner = self.inner.lock();

        let id = SubscriberId(inner.next_id);
        inner.next_id += 1;

        if inner.closed {
            drop(inner);
            drop(tx);
            tracing::debug!(subscriber = %id, "Subscribe after shutdown, handle starts closed");
            let lifecycle = Arc::new(Lifecycle::new(SubscriberState::Closed));
            return (
                Subscription::new(id, rx, lifecycle, Arc::downgrade(self)),
                false,
            );
        }

        let lifecycle = Arc::new(Lifecycle::new(SubscriberState::Active));
        inner
            .subscribers
            .insert(id, SubscriberEntry::new(id, tx, Arc::clone(&lifecycle)));
        let count = inner.subscribers.len();
        drop(inner);

        tracing::debug!(subscriber = %id, subscribers = count, "Subscriber added");

        (
            Subscription::new(id, rx, lifecycle, Arc::downgrade(self)),
            true,
        )
    }

    /// Remove a subscriber if present
    ///
    /// Unknown or already removed ids are ignored. Returns whether an entry
    /// was removed.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.subscribers.remove(&id);
        let count = inner.subscribers.len();
        drop(inner);

        match removed {
            Some(entry) => {
                entry.finish(SubscriberState::Closed);
                tracing::debug!(subscriber = %id, subscribers = count, "Subscriber removed");
                true
            }
            None => false,
        }
    }

    /// Copy out the active subscribers
    pub(super) fn snapshot(&self) -> Vec<SubscriberEntry> {
        self.inner.lock().subscribers.values().cloned().collect()
    }

    /// Remove every listed subscriber in one critical section
    ///
    /// Returns the subscribers that were still registered and active, which
    /// are the ones actually evicted.
    pub(super) fn evict(
        &self,
        victims: &[(SubscriberId, EvictionReason)],
    ) -> Vec<(SubscriberId, EvictionReason)> {
        let mut removed = Vec::with_capacity(victims.len());
        {
            let mut inner = self.inner.lock();
            for &(id, reason) in victims {
                if let Some(entry) = inner.subscribers.remove(&id) {
                    removed.push((entry, reason));
                }
            }
        }

        removed
            .into_iter()
            .filter(|(entry, _)| entry.finish(SubscriberState::Evicted))
            .map(|(entry, reason)| (entry.id, reason))
            .collect()
    }

    /// Close every active subscriber and refuse new ones
    ///
    /// Returns how many subscribers were closed.
    pub(super) fn close_all(&self) -> usize {
        let drained = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            std::mem::take(&mut inner.subscribers)
        };

        drained
            .into_values()
            .filter(|entry| entry.finish(SubscriberState::Closed))
            .count()
    }

    /// Number of active subscribers
    pub fn len(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check whether a subscriber is currently registered
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.inner.lock().subscribers.contains_key(&id)
    }

    /// Whether the publisher has shut the registry down
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}
