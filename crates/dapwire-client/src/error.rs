//! Client error types.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use dapwire_protocol::ProtocolError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Why a session stopped reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer closed its end of the stream.
    Closed,
    /// `stop()` was requested.
    Stopped,
    /// A read or decode error ended the session.
    Failed(String),
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "stream closed by peer"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Framing or decode error; fatal for the session.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// IO error on the read side.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The message could not be written to the adapter.
    #[error("failed to send request {seq} ({command}): {source}")]
    Write {
        seq: u64,
        command: String,
        source: std::io::Error,
    },

    /// A request with this `seq` is already waiting for its response.
    #[error("request seq {0} is already outstanding")]
    SeqInUse(u64),

    /// The session ended before a response arrived.
    #[error("session ended: {0}")]
    SessionEnded(SessionEnd),

    /// No response arrived within the configured timeout.
    #[error("request {seq} ({command}) timed out after {}ms", .timeout.as_millis())]
    Timeout {
        seq: u64,
        command: String,
        timeout: Duration,
    },

    /// The adapter answered with `success: false`.
    #[error("{command} rejected: {detail}")]
    Rejected { command: String, detail: String },

    /// A response body did not have the expected shape.
    #[error("unexpected body in {command} response: {reason}")]
    UnexpectedBody { command: String, reason: String },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The adapter process could not be started.
    #[error("failed to launch adapter {program}: {source}")]
    Launch {
        program: String,
        source: std::io::Error,
    },
}

impl ClientError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an unexpected body error.
    pub fn unexpected_body(command: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::UnexpectedBody {
            command: command.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns true if the error ends the whole session rather than a
    /// single request.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::Protocol(_) | Self::Io(_) | Self::SessionEnded(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_end_display() {
        assert_eq!(SessionEnd::Closed.to_string(), "stream closed by peer");
        assert_eq!(
            SessionEnd::Failed("bad header".into()).to_string(),
            "failed: bad header"
        );
    }

    #[test]
    fn timeout_message_names_request() {
        let err = ClientError::Timeout {
            seq: 4,
            command: "stackTrace".into(),
            timeout: Duration::from_millis(250),
        };
        assert_eq!(
            err.to_string(),
            "request 4 (stackTrace) timed out after 250ms"
        );
        assert!(!err.is_session_fatal());
    }

    #[test]
    fn session_ended_is_fatal() {
        assert!(ClientError::SessionEnded(SessionEnd::Stopped).is_session_fatal());
        assert!(!ClientError::config("missing program").is_session_fatal());
    }
}
