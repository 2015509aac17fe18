//! Broadcaster statistics

pub mod metrics;

pub use metrics::BroadcastStats;
pub(crate) use metrics::BroadcastCounters;
