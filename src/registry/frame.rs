//! Frame and subscriber identity types
//!
//! A frame is one opaque read off the event source. It is immutable and
//! cheap to clone, so every subscriber shares the same allocation.

use bytes::Bytes;

/// Maximum number of bytes carried by a single frame
pub const MAX_FRAME_SIZE: usize = 256;

/// One unit of data emitted by the event source
///
/// Frames carry no sequence number; their order is the order in which the
/// publish loop read them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: Bytes,
}

impl Frame {
    /// Create a frame, truncating the payload to [`MAX_FRAME_SIZE`] bytes
    pub fn new(data: impl Into<Bytes>) -> Self {
        let mut data = data.into();
        data.truncate(MAX_FRAME_SIZE);
        Self { data }
    }

    /// Create a frame from a static byte slice
    pub fn from_static(data: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(data))
    }

    /// Frame payload
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Interpret the payload as an identifier string
    ///
    /// Invalid UTF-8 sequences are replaced with U+FFFD.
    pub fn to_id_string(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// Stable identity of a subscriber
///
/// Ids are allocated monotonically by the registry and never reused, so
/// removal by id can never hit the wrong subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(pub(crate) u64);

impl SubscriberId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
