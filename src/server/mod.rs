//! TCP front-end
//!
//! Accepts subscriber connections and runs one frame sink per connection.

pub mod config;
pub(crate) mod connection;
pub mod listener;

pub use config::{
    parse_listen_addr, ServerConfig, Transport, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT,
};
pub use listener::Server;
