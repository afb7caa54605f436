//! Routing of inbound payloads to waiting requests and the event sink.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace, warn};

use dapwire_protocol::{Event, MessageHeader, MessageType, ProtocolResult, Response};

use crate::error::ClientError;
use crate::pending::PendingTable;

/// Callback receiving every event, in the order events were read.
///
/// It runs on the transport loop, so a slow sink delays all further
/// reading. Forward to a channel if the work is more than trivial.
pub type EventSink = Box<dyn FnMut(Event) + Send>;

/// Decodes one payload at a time and routes it.
pub(crate) struct Dispatcher {
    pending: Arc<PendingTable>,
    sink: Option<EventSink>,
}

impl Dispatcher {
    pub(crate) fn new(pending: Arc<PendingTable>) -> Self {
        Self {
            pending,
            sink: None,
        }
    }

    /// Installs the event sink, replacing any previous one.
    pub(crate) fn set_event_sink(&mut self, sink: EventSink) {
        self.sink = Some(sink);
    }

    /// Routes one frame payload.
    ///
    /// # Errors
    ///
    /// Only a payload that is not JSON, or has no usable `type`, is an
    /// error. A response or event that fails to decode is logged and
    /// dropped; if the response's `request_seq` is known the waiting caller
    /// gets the decode error instead.
    pub(crate) fn dispatch(&mut self, payload: &str) -> ProtocolResult<()> {
        let value: Value = serde_json::from_str(payload)?;
        let header = MessageHeader::deserialize(&value)?;
        trace!(seq = header.seq, kind = ?header.kind, payload, "received");

        match header.kind {
            MessageType::Response => self.dispatch_response(value),
            MessageType::Event => self.dispatch_event(value),
            MessageType::Request | MessageType::Unknown => {
                debug!(seq = header.seq, kind = ?header.kind, "ignoring inbound message");
            }
        }
        Ok(())
    }

    fn dispatch_response(&mut self, value: Value) {
        let request_seq = value.get("request_seq").and_then(Value::as_u64);
        let command = value
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let result = Response::from_value(value).map_err(|e| {
            warn!(request_seq, command = %command, error = %e, "malformed response");
            ClientError::unexpected_body(command.as_str(), e)
        });

        let Some(request_seq) = request_seq else {
            return;
        };
        match self.pending.take(request_seq) {
            Some(tx) => {
                debug!(request_seq, command = %command, "response matched");
                // The waiter may have dropped its handle.
                let _ = tx.send(result);
            }
            None => debug!(request_seq, command = %command, "discarding unmatched response"),
        }
    }

    fn dispatch_event(&mut self, value: Value) {
        let event: Event = match serde_json::from_value(value) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "malformed event");
                return;
            }
        };

        debug!(seq = event.seq, event = %event.event_type, "event received");
        match self.sink.as_mut() {
            Some(sink) => sink(event),
            None => trace!("no event sink installed"),
        }
    }
}
