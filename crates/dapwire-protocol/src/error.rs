//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while framing or decoding messages.
///
/// All of these are fatal for a session: once the byte stream is out of
/// sync there is no frame boundary to recover from.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A header block ended without a `Content-Length` field.
    #[error("missing Content-Length header in {header:?}")]
    MissingContentLength { header: String },

    /// The `Content-Length` value does not fit in memory.
    #[error("invalid Content-Length value: {value}")]
    InvalidContentLength { value: String },

    /// Header or payload bytes are not valid UTF-8.
    #[error("frame is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// Message (or unterminated header) exceeds the configured maximum size.
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Failed to encode or decode a JSON payload.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error during read/write.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
