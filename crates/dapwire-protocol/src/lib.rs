//! Content-Length framing and message types for the Debug Adapter Protocol.
//!
//! # Wire format
//!
//! Every message is a header block followed by a UTF-8 JSON payload:
//!
//! ```text
//! Content-Length: <payload byte length>\r\n\r\n<payload>
//! ```
//!
//! Payloads carry a `seq` and a `type` discriminator (`request`, `response`
//! or `event`). Responses name the request they answer in `request_seq`.
//!
//! # Example
//!
//! ```rust
//! use dapwire_protocol::{FrameBuffer, ProtocolMessage, Request, encode_frame};
//!
//! let mut message = ProtocolMessage::from(Request::new("threads", serde_json::Value::Null));
//! message.set_seq(1);
//! let bytes = encode_frame(&message).unwrap();
//!
//! let mut buffer = FrameBuffer::new();
//! buffer.append(&bytes);
//! let payload = buffer.try_extract_frame().unwrap().unwrap();
//! assert_eq!(payload, r#"{"type":"request","seq":1,"command":"threads"}"#);
//! ```

mod error;
mod framing;
mod types;

pub use error::{ProtocolError, ProtocolResult};
pub use framing::{FrameBuffer, Frames, HEADER_TERMINATOR, MAX_HEADER_SIZE, encode_frame};
pub use types::{
    Event, InitializeResponse, MessageHeader, MessageType, ProtocolMessage, Request, Response,
    ResponseBody,
};

/// Default cap on a single payload (16 MiB).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;
