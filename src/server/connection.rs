//! Per-connection adapter task
//!
//! Each accepted connection becomes one subscriber. The write half carries
//! frames to the peer; the read half is only watched for a broken
//! connection (and, on the stream transport, for the opening request).

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;

use crate::error::{ProtocolError, Result};
use crate::protocol::CardRequest;
use crate::registry::Broadcaster;
use crate::server::config::Transport;
use crate::sink::stream::accept_request;
use crate::sink::{pump_subscription, FrameSink, RawSink, StreamSink};

/// One subscriber connection
pub(crate) struct Connection {
    id: u64,
    socket: TcpStream,
    peer_addr: SocketAddr,
    transport: Transport,
    request_timeout: Duration,
    broadcaster: Broadcaster,
}

impl Connection {
    pub(crate) fn new(
        id: u64,
        socket: TcpStream,
        peer_addr: SocketAddr,
        transport: Transport,
        request_timeout: Duration,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            id,
            socket,
            peer_addr,
            transport,
            request_timeout,
            broadcaster,
        }
    }

    /// Serve the connection until the subscription ends or the peer leaves
    pub(crate) async fn run(self) -> Result<()> {
        let (mut reader, writer) = self.socket.into_split();

        match self.transport {
            Transport::Raw => {
                let mut sink = RawSink::new(writer);
                serve(&self.broadcaster, self.id, &mut sink, reader).await
            }
            Transport::Stream => {
                open_stream(&mut reader, self.request_timeout).await?;
                tracing::debug!(
                    connection_id = self.id,
                    peer = %self.peer_addr,
                    "Card event stream opened"
                );
                let mut sink = StreamSink::new(writer);
                serve(&self.broadcaster, self.id, &mut sink, reader).await
            }
        }
    }
}

/// Wait at most `bound` for the request that opens the event stream
async fn open_stream<R>(reader: &mut R, bound: Duration) -> Result<CardRequest>
where
    R: AsyncRead + Unpin,
{
    tokio::time::timeout(bound, accept_request(reader))
        .await
        .map_err(|_| ProtocolError::RequestTimeout(bound))?
}

async fn serve<K: FrameSink>(
    broadcaster: &Broadcaster,
    connection_id: u64,
    sink: &mut K,
    reader: OwnedReadHalf,
) -> Result<()> {
    let subscription = broadcaster.subscribe();
    let id = subscription.id();

    tracing::debug!(connection_id = connection_id, subscriber = %id, "Connection subscribed");

    tokio::select! {
        result = pump_subscription(broadcaster, subscription, sink) => Ok(result?),
        _ = wait_for_hangup(reader) => {
            tracing::debug!(connection_id = connection_id, subscriber = %id, "Peer hung up");
            broadcaster.unsubscribe(id);
            Ok(())
        }
    }
}

/// Resolve once reading from the peer fails; stray input is discarded
///
/// End of input only means the peer shut down its write side. It may still
/// be reading, so frames keep flowing until a write fails.
async fn wait_for_hangup(mut reader: OwnedReadHalf) {
    let mut buf = [0u8; 256];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => return std::future::pending::<()>().await,
            Ok(_) => {}
            Err(_) => return,
        }
    }
}
