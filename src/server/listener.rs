//! Subscriber listener
//!
//! Handles the TCP accept loop and spawns one adapter task per connection.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::error::{Error, Result};
use crate::registry::Broadcaster;
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;

/// Pause after a failed accept so a persistent failure (e.g. fd exhaustion)
/// does not spin
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// TCP front-end serving subscribers of one broadcaster
pub struct Server {
    config: ServerConfig,
    broadcaster: Broadcaster,
    listener: TcpListener,
    next_connection_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl Server {
    /// Bind the listener
    ///
    /// Bind failures are reported as [`Error::Listen`].
    pub async fn bind(config: ServerConfig, broadcaster: Broadcaster) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(Error::Listen)?;

        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        tracing::info!(
            addr = %config.bind_addr,
            transport = %config.transport,
            "TCP service started"
        );

        Ok(Self {
            config,
            broadcaster,
            listener,
            next_connection_id: AtomicU64::new(1),
            connection_semaphore,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Broadcaster whose frames this server distributes
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Run the accept loop
    ///
    /// Accept errors are logged and the loop keeps going; this only returns
    /// if the future is dropped.
    pub async fn run(&self) -> Result<()> {
        self.accept_loop().await
    }

    /// Run the accept loop with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop() => result,
        }
    }

    async fn accept_loop(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            connection_id = connection_id,
            peer = %peer_addr,
            "New connection"
        );

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let connection = Connection::new(
            connection_id,
            socket,
            peer_addr,
            self.config.transport,
            self.config.request_timeout,
            self.broadcaster.clone(),
        );

        tokio::spawn(async move {
            // Held for the connection's lifetime
            let _permit = permit;

            if let Err(e) = connection.run().await {
                tracing::debug!(
                    connection_id = connection_id,
                    error = %e,
                    "Connection error"
                );
            }

            tracing::debug!(connection_id = connection_id, "Connection closed");
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }
}
