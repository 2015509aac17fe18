//! Stream transport subscriber
//!
//! Connects to a service running the stream transport, opens the card event
//! stream and yields card ids as they arrive.

use bytes::BytesMut;
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::Result;
use crate::protocol::{read_message, write_message, Card, CardEvent, CardRequest};

/// Client for the card event stream
///
/// # Example
/// ```no_run
/// use craas::client::CardClient;
///
/// # async fn example() -> craas::error::Result<()> {
/// let mut client = CardClient::connect("127.0.0.1:8080").await?;
///
/// while let Some(card) = client.next_card().await? {
///     println!("Received {}", card.id);
/// }
/// # Ok(())
/// # }
/// ```
pub struct CardClient {
    reader: BufReader<OwnedReadHalf>,
    // Kept open: closing our side would end the subscription
    _writer: OwnedWriteHalf,
}

impl CardClient {
    /// Connect and open the event stream
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (reader, mut writer) = stream.into_split();

        let mut request = BytesMut::new();
        CardRequest.encode(&mut request);
        write_message(&mut writer, &request).await?;

        tracing::debug!("Listening for card events");

        Ok(Self {
            reader: BufReader::new(reader),
            _writer: writer,
        })
    }

    /// Wait for the next card event
    ///
    /// Returns `Ok(None)` when the service ends the stream.
    pub async fn next_event(&mut self) -> Result<Option<CardEvent>> {
        match read_message(&mut self.reader).await? {
            Some(payload) => Ok(Some(CardEvent::decode(payload)?)),
            None => Ok(None),
        }
    }

    /// Wait for the next card, skipping events that carry none
    pub async fn next_card(&mut self) -> Result<Option<Card>> {
        while let Some(event) = self.next_event().await? {
            if let Some(card) = event.card {
                return Ok(Some(card));
            }
        }
        Ok(None)
    }
}
