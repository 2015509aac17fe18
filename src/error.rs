//! Error types
//!
//! Only configuration, listener and source errors ever reach the top-level
//! service. Delivery timeouts are handled inside the broadcaster (eviction)
//! and send errors inside the adapter that hit them.

use std::io;

use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or contradictory startup options
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Failed to bind the network listener
    #[error("failed to listen: {0}")]
    Listen(#[source] io::Error),

    /// The event source failed permanently
    #[error("event source failed: {0}")]
    Source(#[from] SourceError),

    /// An adapter failed to write to its peer
    #[error("send failed: {0}")]
    Send(#[from] SendError),

    /// Malformed wire data
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Other I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Startup configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("cannot specify a serial port with testing")]
    SerialWithTesting,

    #[error("no serial port provided")]
    NoSource,

    #[error("invalid listen address '{0}': expected :PORT, HOST:PORT, IP or localhost")]
    InvalidAddress(String),
}

/// Permanent event source failure
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source reached end of input (device disconnected, stdin closed)
    #[error("source closed")]
    Closed,

    /// The underlying device returned an error
    #[error("source read failed: {0}")]
    Io(#[from] io::Error),
}

/// Failure writing a frame to a network peer
#[derive(Debug, Error)]
pub enum SendError {
    #[error("peer write failed: {0}")]
    Io(#[from] io::Error),

    #[error("frame encoding failed: {0}")]
    Encode(#[from] ProtocolError),
}

/// Stream protocol violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unexpected end of data")]
    UnexpectedEof,

    #[error("compressed messages are not supported")]
    Compressed,

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("malformed varint")]
    InvalidVarint,

    #[error("unsupported wire type {0}")]
    InvalidWireType(u8),

    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    #[error("no request received within {0:?}")]
    RequestTimeout(std::time::Duration),
}
