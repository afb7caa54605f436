//! Content-Length message framing.
//!
//! Every message on the wire is a header block followed by a JSON payload:
//!
//! ```text
//! Content-Length: <byte length>\r\n
//! \r\n
//! <payload>
//! ```
//!
//! [`FrameBuffer`] accumulates bytes as they are read and hands out complete
//! payloads; [`encode_frame`] produces the envelope for outgoing messages.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::MAX_MESSAGE_SIZE;
use crate::error::{ProtocolError, ProtocolResult};

/// Separates the header block from the payload.
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Largest header block accepted while a size cap is active.
pub const MAX_HEADER_SIZE: usize = 8 * 1024;

static CONTENT_LENGTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Content-Length: *(\d+)\r?$").expect("Invalid Content-Length regex")
});

/// Encodes a message as a complete frame, header included.
///
/// # Example
///
/// ```rust
/// use dapwire_protocol::encode_frame;
///
/// let bytes = encode_frame(&serde_json::json!({"seq": 1})).unwrap();
/// assert_eq!(bytes, b"Content-Length: 9\r\n\r\n{\"seq\":1}");
/// ```
pub fn encode_frame<T: Serialize>(message: &T) -> ProtocolResult<Vec<u8>> {
    let json = serde_json::to_vec(message)?;
    let header = format!("Content-Length: {}\r\n\r\n", json.len());

    let mut buffer = Vec::with_capacity(header.len() + json.len());
    buffer.extend_from_slice(header.as_bytes());
    buffer.extend_from_slice(&json);
    Ok(buffer)
}

/// Position of a parsed header whose payload may still be arriving.
#[derive(Debug, Clone, Copy)]
struct PendingFrame {
    /// Header block length including the terminator.
    header_len: usize,
    /// Declared payload length.
    body_len: usize,
}

/// Accumulates raw bytes and extracts complete frame payloads.
///
/// Bytes are only removed once a whole frame (header and payload) is
/// present, so calling [`FrameBuffer::try_extract_frame`] while a payload is
/// still incomplete leaves the buffer untouched.
#[derive(Debug)]
pub struct FrameBuffer {
    buffer: Vec<u8>,
    pending: Option<PendingFrame>,
    max_message_size: Option<usize>,
}

impl FrameBuffer {
    /// Creates a buffer capped at [`MAX_MESSAGE_SIZE`].
    pub fn new() -> Self {
        Self::with_max_message_size(Some(MAX_MESSAGE_SIZE))
    }

    /// Creates a buffer with a custom payload cap; `None` disables the cap
    /// and lets the buffer grow without bound.
    pub fn with_max_message_size(max_message_size: Option<usize>) -> Self {
        Self {
            buffer: Vec::new(),
            pending: None,
            max_message_size,
        }
    }

    /// Appends bytes received from the stream.
    pub fn append(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Removes one complete payload from the front of the buffer.
    ///
    /// Returns `Ok(None)` when more bytes are needed. More than one frame
    /// may arrive in a single read, so callers loop until `None`.
    ///
    /// # Errors
    ///
    /// A header block without a usable `Content-Length`, non UTF-8 data, or
    /// a frame over the size cap. The buffer is unusable afterwards.
    pub fn try_extract_frame(&mut self) -> ProtocolResult<Option<String>> {
        let frame = match self.pending {
            Some(frame) => frame,
            None => match self.parse_header()? {
                Some(frame) => {
                    self.pending = Some(frame);
                    frame
                }
                None => return Ok(None),
            },
        };

        let total = frame.header_len + frame.body_len;
        if self.buffer.len() < total {
            return Ok(None);
        }

        let payload = std::str::from_utf8(&self.buffer[frame.header_len..total])?.to_owned();
        self.buffer.drain(..total);
        self.pending = None;
        Ok(Some(payload))
    }

    /// Returns an iterator draining every complete payload currently buffered.
    pub fn frames(&mut self) -> Frames<'_> {
        Frames {
            buffer: self,
            failed: false,
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn parse_header(&self) -> ProtocolResult<Option<PendingFrame>> {
        let Some(end) = find(&self.buffer, HEADER_TERMINATOR) else {
            if self.max_message_size.is_some() && self.buffer.len() > MAX_HEADER_SIZE {
                return Err(ProtocolError::MessageTooLarge {
                    size: self.buffer.len(),
                    max: MAX_HEADER_SIZE,
                });
            }
            return Ok(None);
        };

        let header = std::str::from_utf8(&self.buffer[..end])?;
        let captures = CONTENT_LENGTH.captures(header).ok_or_else(|| {
            ProtocolError::MissingContentLength {
                header: header.to_string(),
            }
        })?;

        let value = &captures[1];
        let body_len: usize = value
            .parse()
            .map_err(|_| ProtocolError::InvalidContentLength {
                value: value.to_string(),
            })?;

        if let Some(max) = self.max_message_size
            && body_len > max
        {
            return Err(ProtocolError::MessageTooLarge {
                size: body_len,
                max,
            });
        }

        Ok(Some(PendingFrame {
            header_len: end + HEADER_TERMINATOR.len(),
            body_len,
        }))
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator returned by [`FrameBuffer::frames`].
///
/// Stops after the first error.
pub struct Frames<'a> {
    buffer: &'a mut FrameBuffer,
    failed: bool,
}

impl Iterator for Frames<'_> {
    type Item = ProtocolResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.buffer.try_extract_frame() {
            Ok(Some(payload)) => Some(Ok(payload)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(payload: &str) -> Vec<u8> {
        format!("Content-Length: {}\r\n\r\n{}", payload.len(), payload).into_bytes()
    }

    #[test]
    fn single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        buffer.append(&frame(r#"{"seq":1}"#));

        assert_eq!(
            buffer.try_extract_frame().unwrap().as_deref(),
            Some(r#"{"seq":1}"#)
        );
        assert!(buffer.try_extract_frame().unwrap().is_none());
        assert!(buffer.is_empty());
    }

    #[test]
    fn multiple_frames_in_one_append() {
        let payloads = [r#"{"seq":1}"#, r#"{"seq":2,"type":"event"}"#, "{}"];
        let mut bytes = Vec::new();
        for payload in &payloads {
            bytes.extend(frame(payload));
        }

        let mut buffer = FrameBuffer::new();
        buffer.append(&bytes);
        let frames: Vec<String> = buffer.frames().collect::<ProtocolResult<_>>().unwrap();

        assert_eq!(frames, payloads);
        assert!(buffer.is_empty());
    }

    #[test]
    fn frames_split_at_every_boundary() {
        let payloads = [
            r#"{"seq":1,"type":"event","event":"initialized"}"#,
            r#"{"seq":2,"type":"response","request_seq":1,"command":"initialize","success":true}"#,
        ];
        let mut bytes = Vec::new();
        for payload in &payloads {
            bytes.extend(frame(payload));
        }

        for split in 0..=bytes.len() {
            let mut buffer = FrameBuffer::new();
            let mut extracted = Vec::new();

            for chunk in [&bytes[..split], &bytes[split..]] {
                buffer.append(chunk);
                while let Some(payload) = buffer.try_extract_frame().unwrap() {
                    extracted.push(payload);
                }
            }

            assert_eq!(extracted, payloads, "split at byte {}", split);
            assert!(buffer.is_empty());
        }
    }

    #[test]
    fn byte_by_byte_delivery() {
        let bytes = frame(r#"{"body":"héllo wörld"}"#);
        let mut buffer = FrameBuffer::new();
        let mut extracted = Vec::new();

        for byte in &bytes {
            buffer.append(std::slice::from_ref(byte));
            if let Some(payload) = buffer.try_extract_frame().unwrap() {
                extracted.push(payload);
            }
        }

        assert_eq!(extracted, vec![r#"{"body":"héllo wörld"}"#.to_string()]);
    }

    #[test]
    fn incomplete_payload_consumes_nothing() {
        let bytes = frame(r#"{"seq":42}"#);
        let mut buffer = FrameBuffer::new();
        buffer.append(&bytes[..bytes.len() - 3]);

        let before = buffer.len();
        assert!(buffer.try_extract_frame().unwrap().is_none());
        assert!(buffer.try_extract_frame().unwrap().is_none());
        assert_eq!(buffer.len(), before);

        buffer.append(&bytes[bytes.len() - 3..]);
        assert_eq!(
            buffer.try_extract_frame().unwrap().as_deref(),
            Some(r#"{"seq":42}"#)
        );
    }

    #[test]
    fn length_counts_bytes_not_chars() {
        let payload = r#"{"output":"→ ✓"}"#;
        let bytes = frame(payload);
        assert!(payload.len() > payload.chars().count());

        let mut buffer = FrameBuffer::new();
        buffer.append(&bytes);
        assert_eq!(buffer.try_extract_frame().unwrap().as_deref(), Some(payload));
    }

    #[test]
    fn extra_header_lines_are_tolerated() {
        let mut buffer = FrameBuffer::new();
        buffer.append(
            b"Content-Type: application/vscode-jsonrpc; charset=utf-8\r\nContent-Length: 2\r\n\r\n{}",
        );
        assert_eq!(buffer.try_extract_frame().unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn zero_length_payload() {
        let mut buffer = FrameBuffer::new();
        buffer.append(b"Content-Length: 0\r\n\r\n");
        assert_eq!(buffer.try_extract_frame().unwrap().as_deref(), Some(""));
        assert!(buffer.is_empty());
    }

    #[test]
    fn missing_content_length_is_an_error() {
        let mut buffer = FrameBuffer::new();
        buffer.append(b"Content-Type: text/plain\r\n\r\n{}");
        assert!(matches!(
            buffer.try_extract_frame(),
            Err(ProtocolError::MissingContentLength { .. })
        ));
    }

    #[test]
    fn overflowing_content_length_is_an_error() {
        let mut buffer = FrameBuffer::with_max_message_size(None);
        buffer.append(b"Content-Length: 99999999999999999999999999\r\n\r\n");
        assert!(matches!(
            buffer.try_extract_frame(),
            Err(ProtocolError::InvalidContentLength { .. })
        ));
    }

    #[test]
    fn invalid_utf8_payload_is_an_error() {
        let mut buffer = FrameBuffer::new();
        buffer.append(b"Content-Length: 2\r\n\r\n\xff\xfe");
        assert!(matches!(
            buffer.try_extract_frame(),
            Err(ProtocolError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn declared_length_over_cap_is_rejected() {
        let mut buffer = FrameBuffer::with_max_message_size(Some(16));
        buffer.append(b"Content-Length: 17\r\n\r\n");
        assert!(matches!(
            buffer.try_extract_frame(),
            Err(ProtocolError::MessageTooLarge { size: 17, max: 16 })
        ));
    }

    #[test]
    fn unterminated_header_over_cap_is_rejected() {
        let mut buffer = FrameBuffer::new();
        buffer.append(&vec![b'x'; MAX_HEADER_SIZE + 1]);
        assert!(matches!(
            buffer.try_extract_frame(),
            Err(ProtocolError::MessageTooLarge { .. })
        ));

        let mut unbounded = FrameBuffer::with_max_message_size(None);
        unbounded.append(&vec![b'x'; MAX_HEADER_SIZE + 1]);
        assert!(unbounded.try_extract_frame().unwrap().is_none());
    }

    #[test]
    fn frames_iterator_stops_after_error() {
        let mut buffer = FrameBuffer::new();
        buffer.append(&frame("{}"));
        buffer.append(b"Bogus: 1\r\n\r\n");
        buffer.append(&frame("{}"));

        let results: Vec<_> = buffer.frames().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn encode_frame_is_bit_exact() {
        let bytes = encode_frame(&serde_json::json!({"seq": 1, "type": "request"})).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let (header, payload) = text.split_once("\r\n\r\n").unwrap();

        assert_eq!(header, format!("Content-Length: {}", payload.len()));
        assert_eq!(payload, r#"{"seq":1,"type":"request"}"#);
    }

    #[test]
    fn encoded_frames_decode() {
        let mut buffer = FrameBuffer::new();
        buffer.append(&encode_frame(&serde_json::json!({"a": "ü"})).unwrap());
        assert_eq!(
            buffer.try_extract_frame().unwrap().as_deref(),
            Some(r#"{"a":"ü"}"#)
        );
    }
}
