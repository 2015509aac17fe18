//! Card reader event fan-out
//!
//! Distributes frames from a single card reader (or an interactive stand-in)
//! to any number of network subscribers in real time. Every subscriber
//! receives, in order, each frame published after it joined; a subscriber
//! that stops keeping up is evicted rather than allowed to stall the others.
//!
//! ```text
//! EventSource ──► Broadcaster ──► Subscription ──► FrameSink ──► TCP peer
//!  (serial,        (publish        (handoff        (raw bytes or
//!   console)        loop)           queue)          CardEvent stream)
//! ```
//!
//! # Example
//! ```no_run
//! use craas::{Broadcaster, Server, ServerConfig};
//! use craas::source::SerialSource;
//!
//! # async fn example() -> craas::error::Result<()> {
//! let broadcaster = Broadcaster::new();
//! let server = Server::bind(ServerConfig::default(), broadcaster.clone()).await?;
//! let source = SerialSource::open("/dev/ttyUSB0").await?;
//!
//! tokio::select! {
//!     result = broadcaster.run(source) => result?,
//!     result = server.run() => result?,
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod sink;
pub mod source;
pub mod stats;

pub use config::{ServiceConfig, ServiceOptions, SourceConfig};
pub use error::{Error, Result};
pub use registry::{Broadcaster, Frame, SubscriberId, Subscription};
pub use server::{Server, ServerConfig, Transport};
pub use sink::FrameSink;
pub use source::EventSource;
