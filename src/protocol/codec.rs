//! Length-prefixed message framing for the stream transport
//!
//! Every message on the wire is:
//!
//! ```text
//! +------------+-------------------+-------------------+
//! | flag (u8)  | length (u32, BE)  | payload (length)  |
//! +------------+-------------------+-------------------+
//! ```
//!
//! The flag marks a compressed payload; compression is not supported, so it
//! must be zero.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, ProtocolError, Result};

/// Size of the message header
pub const HEADER_LEN: usize = 5;

/// Largest accepted payload
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Append one framed message to `dst`
pub fn encode_message(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(HEADER_LEN + payload.len());
    dst.put_u8(0);
    dst.put_u32(payload.len() as u32);
    dst.put_slice(payload);
}

/// Take one complete message off the front of `src`
///
/// Returns `Ok(None)` if more data is needed.
pub fn decode_message(src: &mut BytesMut) -> std::result::Result<Option<Bytes>, ProtocolError> {
    if src.len() < HEADER_LEN {
        return Ok(None);
    }

    let (flag, len) = parse_header(&src[..HEADER_LEN])?;
    if flag != 0 {
        return Err(ProtocolError::Compressed);
    }

    if src.len() < HEADER_LEN + len {
        return Ok(None);
    }

    src.advance(HEADER_LEN);
    Ok(Some(src.split_to(len).freeze()))
}

fn parse_header(mut header: &[u8]) -> std::result::Result<(u8, usize), ProtocolError> {
    let flag = header.get_u8();
    let len = header.get_u32() as usize;

    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    Ok((flag, len))
}

/// Read one message
///
/// Returns `Ok(None)` if the peer closed the stream cleanly between
/// messages.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];

    let n = reader.read(&mut header[..1]).await?;
    if n == 0 {
        return Ok(None);
    }
    read_exact_or_eof(reader, &mut header[1..]).await?;

    let (flag, len) = parse_header(&header)?;
    if flag != 0 {
        return Err(ProtocolError::Compressed.into());
    }

    let mut payload = vec![0u8; len];
    read_exact_or_eof(reader, &mut payload).await?;

    Ok(Some(Bytes::from(payload)))
}

/// Write one message and flush
pub async fn write_message<W>(writer: &mut W, payload: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    encode_message(payload, &mut buf);
    writer.write_all(&buf).await?;
    writer.flush().await
}

async fn read_exact_or_eof<R>(reader: &mut R, buf: &mut [u8]) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(Error::Protocol(ProtocolError::UnexpectedEof))
        }
        Err(e) => Err(e.into()),
    }
}
