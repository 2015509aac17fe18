//! Stream transport wire protocol
//!
//! The stream transport carries one request/response-stream call over a
//! plain TCP connection:
//!
//! ```text
//! client                         server
//!   │── CardRequest (framed) ──────►│
//!   │◄───────── CardEvent (framed) ─│  one per frame
//!   │◄───────── CardEvent (framed) ─│
//!   │              ...              │
//! ```

pub mod codec;
pub mod message;

pub use codec::{read_message, write_message, MAX_MESSAGE_SIZE};
pub use message::{Card, CardEvent, CardRequest};
