//! Server configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::error::ConfigError;

/// Port used when a listen address does not name one
pub const DEFAULT_PORT: u16 = 8080;

/// How long a stream client may take to send its opening request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Wire format spoken to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    /// Frame bytes copied verbatim onto the connection
    #[default]
    Raw,
    /// Framed `CardEvent` messages after an initial `CardRequest`
    Stream,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Raw => write!(f, "raw"),
            Transport::Stream => write!(f, "stream"),
        }
    }
}

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Wire format for every connection
    pub transport: Transport,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Deadline for the `CardRequest` on the stream transport
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            transport: Transport::Raw,
            max_connections: 0, // Unlimited
            tcp_nodelay: true,  // Card events are tiny; send them immediately
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the transport
    pub fn transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Set the stream request deadline
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Parse a listen address
///
/// Accepts formats:
/// - ":8080" -> 0.0.0.0:8080
/// - "localhost" -> 127.0.0.1:8080
/// - "localhost:9000" -> 127.0.0.1:9000
/// - "127.0.0.1" -> 127.0.0.1:8080
/// - "0.0.0.0:9000" -> 0.0.0.0:9000
/// - "[::1]:9000" -> [::1]:9000
pub fn parse_listen_addr(arg: &str) -> Result<SocketAddr, ConfigError> {
    let invalid = || ConfigError::InvalidAddress(arg.to_string());

    // Port-only form listens on all interfaces
    if let Some(port) = arg.strip_prefix(':') {
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }

    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(invalid())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 8080);
        assert!(config.bind_addr.ip().is_unspecified());
        assert_eq!(config.transport, Transport::Raw);
        assert_eq!(config.max_connections, 0);
        assert!(config.tcp_nodelay);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .transport(Transport::Stream)
            .max_connections(50)
            .tcp_nodelay(false)
            .request_timeout(Duration::from_secs(2));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.transport, Transport::Stream);
        assert_eq!(config.max_connections, 50);
        assert!(!config.tcp_nodelay);
        assert_eq!(config.request_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:1936".parse().unwrap();
        assert_eq!(ServerConfig::with_addr(addr).bind_addr, addr);
    }

    #[test]
    fn test_parse_port_only() {
        let addr = parse_listen_addr(":8080").unwrap();
        assert_eq!(addr, "0.0.0.0:8080".parse().unwrap());
    }

    #[test]
    fn test_parse_localhost() {
        assert_eq!(
            parse_listen_addr("localhost").unwrap(),
            "127.0.0.1:8080".parse().unwrap()
        );
        assert_eq!(
            parse_listen_addr("localhost:9000").unwrap(),
            "127.0.0.1:9000".parse().unwrap()
        );
    }

    #[test]
    fn test_parse_ip_forms() {
        assert_eq!(
            parse_listen_addr("10.0.0.1").unwrap(),
            "10.0.0.1:8080".parse().unwrap()
        );
        assert_eq!(
            parse_listen_addr("[::1]:9000").unwrap(),
            "[::1]:9000".parse().unwrap()
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(
            parse_listen_addr("not an address"),
            Err(ConfigError::InvalidAddress("not an address".into()))
        );
        assert!(parse_listen_addr(":99999").is_err());
        assert!(parse_listen_addr("").is_err());
    }

    #[test]
    fn test_transport_display() {
        assert_eq!(Transport::Raw.to_string(), "raw");
        assert_eq!(Transport::Stream.to_string(), "stream");
    }
}
