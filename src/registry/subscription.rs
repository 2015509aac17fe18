//! Subscriber handle
//!
//! Returned by `Broadcaster::subscribe`. The handle owns the receiving end
//! of the subscriber's delivery queue.

use std::sync::{Arc, Weak};

use tokio::sync::mpsc;

use super::entry::{Delivery, Lifecycle, SubscriberState};
use super::frame::{Frame, SubscriberId};
use super::store::SubscriberRegistry;

/// Receiving side of one subscription
///
/// Dropping the handle unsubscribes it.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Delivery>,
    lifecycle: Arc<Lifecycle>,
    registry: Weak<SubscriberRegistry>,
}

impl Subscription {
    pub(super) fn new(
        id: SubscriberId,
        rx: mpsc::Receiver<Delivery>,
        lifecycle: Arc<Lifecycle>,
        registry: Weak<SubscriberRegistry>,
    ) -> Self {
        Self {
            id,
            rx,
            lifecycle,
            registry,
        }
    }

    /// Identity used to unsubscribe
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> SubscriberState {
        self.lifecycle.get()
    }

    /// Wait for the next frame
    ///
    /// Returns `None` once the queue is closed (eviction, unsubscribe or
    /// broadcaster shutdown). Frames the publisher stopped waiting for are
    /// discarded.
    pub async fn recv(&mut self) -> Option<Frame> {
        loop {
            let delivery = self.rx.recv().await?;

            if !self.lifecycle.is_active() {
                // Drain and discard whatever is still queued
                self.rx.close();
                continue;
            }

            if delivery.ack.send(()).is_ok() {
                return Some(delivery.frame);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}
