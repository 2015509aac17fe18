//! Subscriber entry and lifecycle types
//!
//! This module defines the per-subscriber state stored in the registry and
//! the handoff used to deliver a frame to one subscriber.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use super::frame::{Frame, SubscriberId};

/// Lifecycle state of a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    /// Registered and receiving frames
    Active,
    /// Removed by the broadcaster after a failed delivery
    Evicted,
    /// Removed by unsubscribe or broadcaster shutdown
    Closed,
}

impl SubscriberState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SubscriberState::Active,
            1 => SubscriberState::Evicted,
            _ => SubscriberState::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            SubscriberState::Active => 0,
            SubscriberState::Evicted => 1,
            SubscriberState::Closed => 2,
        }
    }
}

/// Why a subscriber was evicted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// The subscriber did not accept a frame within the delivery timeout
    DeliveryTimeout,
    /// The subscriber's receiving end no longer exists
    SubscriberGone,
}

impl std::fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvictionReason::DeliveryTimeout => write!(f, "delivery timeout"),
            EvictionReason::SubscriberGone => write!(f, "subscriber gone"),
        }
    }
}

/// Lifecycle state shared between the registry entry and the handle
///
/// Transitions only ever leave `Active`; a terminal state is never
/// overwritten.
#[derive(Debug)]
pub(super) struct Lifecycle(AtomicU8);

impl Lifecycle {
    pub(super) fn new(state: SubscriberState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    pub(super) fn get(&self) -> SubscriberState {
        SubscriberState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(super) fn is_active(&self) -> bool {
        self.get() == SubscriberState::Active
    }

    /// Move from `Active` to `next`. Returns false if already terminal.
    pub(super) fn finish(&self, next: SubscriberState) -> bool {
        self.0
            .compare_exchange(
                SubscriberState::Active.as_u8(),
                next.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// A frame in flight to one subscriber
///
/// The subscriber acknowledges by completing `ack` when it takes the frame.
/// If the publisher stopped waiting, the acknowledgement fails and the frame
/// is discarded unseen.
pub(super) struct Delivery {
    pub frame: Frame,
    pub ack: oneshot::Sender<()>,
}

/// Result of one handoff attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DeliveryOutcome {
    /// The subscriber took the frame
    Delivered,
    /// The subscriber did not take the frame in time
    TimedOut,
    /// The receiving end has been dropped
    Gone,
    /// The subscriber left the active state before the attempt
    Inactive,
}

/// Registry-side view of a subscriber
///
/// Cloning an entry clones the queue's sender; the queue closes once the
/// registry and every in-flight snapshot have dropped their clones.
#[derive(Clone)]
pub(super) struct SubscriberEntry {
    pub id: SubscriberId,
    tx: mpsc::Sender<Delivery>,
    lifecycle: Arc<Lifecycle>,
}

impl SubscriberEntry {
    pub(super) fn new(
        id: SubscriberId,
        tx: mpsc::Sender<Delivery>,
        lifecycle: Arc<Lifecycle>,
    ) -> Self {
        Self { id, tx, lifecycle }
    }

    pub(super) fn finish(&self, next: SubscriberState) -> bool {
        self.lifecycle.finish(next)
    }

    /// Hand a frame to this subscriber, waiting at most `bound`
    ///
    /// The wait covers both queueing the frame and the subscriber taking it,
    /// so a subscriber that never reads times out on its first frame.
    pub(super) async fn deliver(&self, frame: Frame, bound: Duration) -> DeliveryOutcome {
        if !self.lifecycle.is_active() {
            return DeliveryOutcome::Inactive;
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        let handoff = async {
            if self
                .tx
                .send(Delivery { frame, ack: ack_tx })
                .await
                .is_err()
            {
                return DeliveryOutcome::Gone;
            }
            match ack_rx.await {
                Ok(()) => DeliveryOutcome::Delivered,
                // Handle dropped the frame without taking it
                Err(_) => DeliveryOutcome::Gone,
            }
        };

        tokio::time::timeout(bound, handoff)
            .await
            .unwrap_or(DeliveryOutcome::TimedOut)
    }
}
