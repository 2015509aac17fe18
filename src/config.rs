//! Service configuration
//!
//! Built once at startup from the command line and passed down by value.

use std::path::PathBuf;

use crate::error::ConfigError;
use crate::registry::BroadcastConfig;
use crate::server::{parse_listen_addr, ServerConfig, Transport};
use crate::source::console::DEFAULT_PROMPT;

/// Default listen address
pub const DEFAULT_LISTEN: &str = ":8080";

/// Which event source feeds the broadcaster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    /// Card reader on a serial port
    Serial { path: PathBuf },
    /// Interactive console for testing
    Console { prompt: String },
}

/// Complete, validated service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub source: SourceConfig,
    pub server: ServerConfig,
    pub broadcast: BroadcastConfig,
}

/// Raw startup options, before validation
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Use the interactive console source
    pub testing: bool,
    /// Serial port path; empty when unset
    pub serial: String,
    /// Listen address
    pub port: String,
    pub transport: Transport,
    pub prompt: String,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            testing: false,
            serial: String::new(),
            port: DEFAULT_LISTEN.to_string(),
            transport: Transport::Raw,
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }
}

impl ServiceConfig {
    /// Validate startup options
    ///
    /// Exactly one source must be selected: `testing`, or a non-empty
    /// `serial` path.
    pub fn from_options(options: ServiceOptions) -> Result<Self, ConfigError> {
        let source = match (options.testing, options.serial.is_empty()) {
            (true, false) => return Err(ConfigError::SerialWithTesting),
            (false, true) => return Err(ConfigError::NoSource),
            (true, true) => SourceConfig::Console {
                prompt: options.prompt,
            },
            (false, false) => SourceConfig::Serial {
                path: PathBuf::from(options.serial),
            },
        };

        let bind_addr = parse_listen_addr(&options.port)?;
        let server = ServerConfig::with_addr(bind_addr).transport(options.transport);

        Ok(Self {
            source,
            server,
            broadcast: BroadcastConfig::default(),
        })
    }
}
