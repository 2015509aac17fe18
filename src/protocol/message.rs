//! Card event messages
//!
//! Payloads of the stream transport, encoded with protobuf wire rules:
//!
//! ```text
//! CardRequest {}                      (empty)
//! CardEvent   { Card card = 1; }
//! Card        { string id = 1; }
//! ```
//!
//! Wire types:
//! ```text
//! 0 - Varint
//! 1 - 64-bit
//! 2 - Length-delimited (strings, bytes, embedded messages)
//! 5 - 32-bit
//! ```
//!
//! Unknown fields are skipped on decode. Default values (empty strings) are
//! omitted on encode.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::registry::Frame;

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_FIXED32: u8 = 5;

const FIELD_CARD: u64 = 1;
const FIELD_ID: u64 = 1;

/// Varints longer than this are malformed
const MAX_VARINT_LEN: usize = 10;

/// Request opening a card event stream; carries no fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CardRequest;

impl CardRequest {
    pub fn encode(&self, _buf: &mut BytesMut) {}

    pub fn decode(mut buf: Bytes) -> Result<Self, ProtocolError> {
        while buf.has_remaining() {
            let (_, wire_type) = get_key(&mut buf)?;
            skip_field(wire_type, &mut buf)?;
        }
        Ok(CardRequest)
    }
}

/// A card read by the reader
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Card {
    /// Card identifier as read off the device
    pub id: String,
}

impl Card {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        if !self.id.is_empty() {
            put_key(buf, FIELD_ID, WIRE_LEN);
            put_varint(buf, self.id.len() as u64);
            buf.put_slice(self.id.as_bytes());
        }
    }

    fn encoded_len(&self) -> usize {
        if self.id.is_empty() {
            0
        } else {
            1 + varint_len(self.id.len() as u64) + self.id.len()
        }
    }

    pub fn decode(mut buf: Bytes) -> Result<Self, ProtocolError> {
        let mut card = Card::default();

        while buf.has_remaining() {
            match get_key(&mut buf)? {
                (FIELD_ID, WIRE_LEN) => {
                    let raw = get_len_delimited(&mut buf)?;
                    card.id = String::from_utf8(raw.to_vec())
                        .map_err(|_| ProtocolError::InvalidUtf8)?;
                }
                (_, wire_type) => skip_field(wire_type, &mut buf)?,
            }
        }

        Ok(card)
    }
}

/// One card event pushed to a stream client
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CardEvent {
    pub card: Option<Card>,
}

impl CardEvent {
    pub fn new(card: Card) -> Self {
        Self { card: Some(card) }
    }

    /// Build an event from a frame, reading its bytes as the card id
    pub fn from_frame(frame: &Frame) -> Self {
        Self::new(Card::new(frame.to_id_string()))
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        if let Some(ref card) = self.card {
            put_key(buf, FIELD_CARD, WIRE_LEN);
            put_varint(buf, card.encoded_len() as u64);
            card.encode(buf);
        }
    }

    pub fn encode_to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }

    fn encoded_len(&self) -> usize {
        match self.card {
            Some(ref card) => {
                let inner = card.encoded_len();
                1 + varint_len(inner as u64) + inner
            }
            None => 0,
        }
    }

    pub fn decode(mut buf: Bytes) -> Result<Self, ProtocolError> {
        let mut event = CardEvent::default();

        while buf.has_remaining() {
            match get_key(&mut buf)? {
                (FIELD_CARD, WIRE_LEN) => {
                    let raw = get_len_delimited(&mut buf)?;
                    event.card = Some(Card::decode(raw)?);
                }
                (_, wire_type) => skip_field(wire_type, &mut buf)?,
            }
        }

        Ok(event)
    }

    /// Card id, or an empty string if the event carries no card
    pub fn card_id(&self) -> &str {
        self.card.as_ref().map(|c| c.id.as_str()).unwrap_or("")
    }
}

fn put_key(buf: &mut BytesMut, field: u64, wire_type: u8) {
    put_varint(buf, (field << 3) | wire_type as u64);
}

fn put_varint(buf: &mut BytesMut, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

fn varint_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

fn get_varint(buf: &mut Bytes) -> Result<u64, ProtocolError> {
    let mut value = 0u64;

    for i in 0..MAX_VARINT_LEN {
        if !buf.has_remaining() {
            return Err(ProtocolError::UnexpectedEof);
        }
        let byte = buf.get_u8();
        value |= ((byte & 0x7F) as u64) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }

    Err(ProtocolError::InvalidVarint)
}

fn get_key(buf: &mut Bytes) -> Result<(u64, u8), ProtocolError> {
    let key = get_varint(buf)?;
    Ok((key >> 3, (key & 0x07) as u8))
}

fn get_len_delimited(buf: &mut Bytes) -> Result<Bytes, ProtocolError> {
    let len = get_varint(buf)? as usize;
    if buf.remaining() < len {
        return Err(ProtocolError::UnexpectedEof);
    }
    Ok(buf.split_to(len))
}

fn skip_field(wire_type: u8, buf: &mut Bytes) -> Result<(), ProtocolError> {
    let skip = match wire_type {
        WIRE_VARINT => {
            get_varint(buf)?;
            0
        }
        WIRE_FIXED64 => 8,
        WIRE_LEN => get_varint(buf)? as usize,
        WIRE_FIXED32 => 4,
        other => return Err(ProtocolError::InvalidWireType(other)),
    };

    if buf.remaining() < skip {
        return Err(ProtocolError::UnexpectedEof);
    }
    buf.advance(skip);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_event_wire_format() {
        let event = CardEvent::new(Card::new("1234"));
        let encoded = event.encode_to_bytes();

        // field 1 (card), len 6, field 1 (id), len 4, "1234"
        assert_eq!(
            &encoded[..],
            &[0x0A, 0x06, 0x0A, 0x04, b'1', b'2', b'3', b'4']
        );
        assert_eq!(CardEvent::decode(encoded).unwrap(), event);
    }

    #[test]
    fn test_empty_id_encodes_empty_card() {
        let event = CardEvent::new(Card::new(""));
        let encoded = event.encode_to_bytes();

        assert_eq!(&encoded[..], &[0x0A, 0x00]);
        let decoded = CardEvent::decode(encoded).unwrap();
        assert_eq!(decoded.card_id(), "");
        assert!(decoded.card.is_some());
    }

    #[test]
    fn test_long_id_uses_multibyte_length() {
        let id = "7".repeat(200);
        let event = CardEvent::new(Card::new(id.clone()));
        let encoded = event.encode_to_bytes();

        assert_eq!(encoded.len(), event.encoded_len());
        assert_eq!(CardEvent::decode(encoded).unwrap().card_id(), id);
    }

    #[test]
    fn test_from_frame_reads_id() {
        let event = CardEvent::from_frame(&Frame::from_static(b"badge-9"));
        assert_eq!(event.card_id(), "badge-9");
    }

    #[test]
    fn test_decode_skips_unknown_fields() {
        // field 2 varint 150, then card
        let data = Bytes::from_static(&[0x10, 0x96, 0x01, 0x0A, 0x03, 0x0A, 0x01, b'Z']);
        let event = CardEvent::decode(data).unwrap();
        assert_eq!(event.card_id(), "Z");
    }

    #[test]
    fn test_decode_truncated() {
        let data = Bytes::from_static(&[0x0A, 0x06, 0x0A, 0x04, b'1']);
        assert_eq!(CardEvent::decode(data), Err(ProtocolError::UnexpectedEof));
    }

    #[test]
    fn test_decode_invalid_wire_type() {
        let data = Bytes::from_static(&[0x0F]);
        assert_eq!(
            CardEvent::decode(data),
            Err(ProtocolError::InvalidWireType(7))
        );
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let data = Bytes::from_static(&[0x0A, 0x01, 0xFF]);
        assert_eq!(Card::decode(data), Err(ProtocolError::InvalidUtf8));
    }

    #[test]
    fn test_decode_overlong_varint() {
        let data = Bytes::from_static(&[0xFF; 11]);
        assert_eq!(CardEvent::decode(data), Err(ProtocolError::InvalidVarint));
    }

    #[test]
    fn test_request_is_empty() {
        let mut buf = BytesMut::new();
        CardRequest.encode(&mut buf);
        assert!(buf.is_empty());
        assert_eq!(CardRequest::decode(Bytes::new()).unwrap(), CardRequest);
    }

    #[test]
    fn test_request_ignores_fields() {
        let data = Bytes::from_static(&[0x08, 0x01]);
        assert_eq!(CardRequest::decode(data).unwrap(), CardRequest);
    }
}
