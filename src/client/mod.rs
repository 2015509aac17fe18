//! Card event client
//!
//! Consumer side of the stream transport, for tools and tests that want to
//! watch card events from a running service.

pub mod subscriber;

pub use subscriber::CardClient;
