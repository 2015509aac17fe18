//! Subscriber registry and fan-out publisher
//!
//! The broadcaster reads frames from one event source and hands each frame
//! to every active subscriber through a per-subscriber handoff queue.
//!
//! # Architecture
//!
//! ```text
//!                      Broadcaster (publish loop)
//!                 ┌───────────────────────────────┐
//!   EventSource ──► read() ──► snapshot ──► deliver│
//!                 │            (lock)     (no lock)│
//!                 │                          │     │
//!                 │           evict ◄────────┘     │
//!                 │           (lock)               │
//!                 └───────────┬───────────────────┘
//!                             │
//!         ┌───────────────────┼───────────────────┐
//!         ▼                   ▼                   ▼
//!   [Subscription]      [Subscription]      [Subscription]
//!     recv()              recv()              recv()
//!         │                   │                   │
//!         ▼                   ▼                   ▼
//!     FrameSink           FrameSink           FrameSink ──► TCP
//! ```
//!
//! # Delivery policy
//!
//! Each handoff waits at most the configured delivery timeout (200 ms by
//! default) for the subscriber to take the frame. Subscribers that miss the
//! deadline are evicted after the fan-out completes, in a single locked
//! pass. A source error closes every subscriber and stops the loop.

pub mod broadcaster;
pub mod config;
pub mod entry;
pub mod frame;
pub mod store;
pub mod subscription;

pub use broadcaster::Broadcaster;
pub use config::{BroadcastConfig, DEFAULT_DELIVERY_TIMEOUT};
pub use entry::{EvictionReason, SubscriberState};
pub use frame::{Frame, SubscriberId, MAX_FRAME_SIZE};
pub use store::SubscriberRegistry;
pub use subscription::Subscription;
