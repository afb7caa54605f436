//! Protocol message types.
//!
//! Three kinds of message share the wire: requests (client to adapter),
//! responses (answering a request by `request_seq`) and events (unsolicited).
//! Each carries a `seq` and a `type` discriminator.

use dapwire_core::dap::{Capabilities, ErrorResponseBody, EventKind, commands};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// The `type` discriminator of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Request,
    Response,
    Event,
    /// Any discriminator this client does not handle.
    #[serde(other)]
    Unknown,
}

/// The fields every message has, used to classify a payload before
/// decoding it fully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MessageHeader {
    #[serde(default)]
    pub seq: u64,
    #[serde(rename = "type")]
    pub kind: MessageType,
}

/// A message as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProtocolMessage {
    Request(Request),
    Response(Response),
    Event(Event),
}

impl ProtocolMessage {
    /// Returns the sequence number, 0 when not yet assigned.
    pub fn seq(&self) -> u64 {
        match self {
            Self::Request(r) => r.seq,
            Self::Response(r) => r.seq,
            Self::Event(e) => e.seq,
        }
    }

    /// Sets the sequence number.
    pub fn set_seq(&mut self, seq: u64) {
        match self {
            Self::Request(r) => r.seq = seq,
            Self::Response(r) => r.seq = seq,
            Self::Event(e) => e.seq = seq,
        }
    }

    /// Returns the `type` discriminator.
    pub fn kind(&self) -> MessageType {
        match self {
            Self::Request(_) => MessageType::Request,
            Self::Response(_) => MessageType::Response,
            Self::Event(_) => MessageType::Event,
        }
    }

    /// Short label for logs: the command or event name.
    pub fn name(&self) -> &str {
        match self {
            Self::Request(r) => &r.command,
            Self::Response(r) => &r.command,
            Self::Event(e) => &e.event_type,
        }
    }
}

impl From<Request> for ProtocolMessage {
    fn from(request: Request) -> Self {
        Self::Request(request)
    }
}

impl From<Response> for ProtocolMessage {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

impl From<Event> for ProtocolMessage {
    fn from(event: Event) -> Self {
        Self::Event(event)
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A command sent to the adapter, expecting a [`Response`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub seq: u64,
    pub command: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub arguments: Value,
}

impl Request {
    /// Creates a request with opaque arguments.
    pub fn new(command: impl Into<String>, arguments: Value) -> Self {
        Self {
            seq: 0,
            command: command.into(),
            arguments,
        }
    }

    /// Creates a request whose arguments are serialized from a typed value.
    pub fn with_arguments<T: Serialize>(
        command: impl Into<String>,
        arguments: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(command, serde_json::to_value(arguments)?))
    }

    /// Returns true if this is the `initialize` command.
    pub fn is_initialize(&self) -> bool {
        self.command == commands::INITIALIZE
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Payload of a response.
///
/// Bodies are opaque JSON except where the command has a shape this crate
/// knows; currently that is the capabilities answered to `initialize`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    /// No body, or an explicit `null`.
    #[default]
    Empty,
    /// Body of a successful `initialize` response.
    Capabilities(Box<Capabilities>),
    /// Any other body.
    Generic(Value),
}

impl ResponseBody {
    /// Returns true when there is no body.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl<'de> Deserialize<'de> for ResponseBody {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Self::Empty,
            Some(value) => Self::Generic(value),
        })
    }
}

/// An answer to a [`Request`], matched by `request_seq`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub seq: u64,
    pub request_seq: u64,
    pub success: bool,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "ResponseBody::is_empty")]
    pub body: ResponseBody,
}

impl Response {
    /// Creates a response without a body.
    pub fn new(request_seq: u64, command: impl Into<String>, success: bool) -> Self {
        Self {
            seq: 0,
            request_seq,
            success,
            command: command.into(),
            message: None,
            body: ResponseBody::Empty,
        }
    }

    /// Builder: set a generic body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = match body {
            Value::Null => ResponseBody::Empty,
            value => ResponseBody::Generic(value),
        };
        self
    }

    /// Builder: set the failure message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Decodes a response from a parsed payload.
    ///
    /// A successful `initialize` response gets its body decoded as
    /// [`Capabilities`]; every other body stays generic.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let mut response: Response = serde_json::from_value(value)?;
        if response.command == commands::INITIALIZE && response.success {
            let capabilities = match std::mem::take(&mut response.body) {
                ResponseBody::Generic(body) => serde_json::from_value(body)?,
                ResponseBody::Capabilities(capabilities) => *capabilities,
                ResponseBody::Empty => Capabilities::default(),
            };
            response.body = ResponseBody::Capabilities(Box::new(capabilities));
        }
        Ok(response)
    }

    /// Returns the adapter capabilities if this answers `initialize`.
    pub fn capabilities(&self) -> Option<&Capabilities> {
        match &self.body {
            ResponseBody::Capabilities(capabilities) => Some(capabilities.as_ref()),
            _ => None,
        }
    }

    /// Decodes the body into a command-specific shape.
    ///
    /// Returns `Ok(None)` when the response has no body.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        match &self.body {
            ResponseBody::Empty => Ok(None),
            ResponseBody::Generic(value) => serde_json::from_value(value.clone()).map(Some),
            ResponseBody::Capabilities(capabilities) => {
                serde_json::from_value(serde_json::to_value(capabilities)?).map(Some)
            }
        }
    }

    /// Human-readable failure detail, `None` for successful responses.
    ///
    /// Prefers `message`, then a structured error in the body, then a
    /// generic text naming the command.
    pub fn error_detail(&self) -> Option<String> {
        if self.success {
            return None;
        }
        if let Some(ref message) = self.message {
            return Some(message.clone());
        }
        let structured = self
            .body_as::<ErrorResponseBody>()
            .ok()
            .flatten()
            .and_then(|body| body.error)
            .map(|error| error.render());
        Some(structured.unwrap_or_else(|| format!("{} failed", self.command)))
    }
}

/// A response to `initialize` with its capabilities decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct InitializeResponse {
    pub seq: u64,
    pub request_seq: u64,
    pub success: bool,
    pub message: Option<String>,
    pub body: Capabilities,
}

impl InitializeResponse {
    /// Converts a response whose body was decoded as capabilities.
    ///
    /// Gives the response back unchanged when it carries no capabilities.
    pub fn from_response(response: Response) -> Result<Self, Response> {
        match response.body {
            ResponseBody::Capabilities(capabilities) => Ok(Self {
                seq: response.seq,
                request_seq: response.request_seq,
                success: response.success,
                message: response.message,
                body: *capabilities,
            }),
            body => Err(Response { body, ..response }),
        }
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// An unsolicited notification from the adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub seq: u64,
    #[serde(rename = "event")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Event {
    /// Creates an event without a body.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            seq: 0,
            event_type: event_type.into(),
            body: None,
        }
    }

    /// Builder: set the body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Classifies the event name.
    pub fn kind(&self) -> EventKind {
        EventKind::from_name(&self.event_type)
    }

    /// Decodes the body into an event-specific shape.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        self.body
            .as_ref()
            .map(|body| serde_json::from_value(body.clone()))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dapwire_core::dap::{Message, OutputEventBody, ThreadsResponseBody};
    use serde_json::json;

    #[test]
    fn request_wire_shape() {
        let mut message = ProtocolMessage::from(Request::new("initialize", json!({})));
        message.set_seq(1);

        let json = serde_json::to_string(&message).unwrap();
        assert_eq!(
            json,
            r#"{"type":"request","seq":1,"command":"initialize","arguments":{}}"#
        );
    }

    #[test]
    fn initialize_request_snapshot() {
        let mut message =
            ProtocolMessage::from(Request::new("initialize", json!({"adapterID": "coreclr"})));
        message.set_seq(1);
        insta::assert_json_snapshot!("initialize_request", message);
    }

    #[test]
    fn request_without_arguments_omits_field() {
        let message = ProtocolMessage::from(Request::new("threads", Value::Null));
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value, json!({"type": "request", "seq": 0, "command": "threads"}));
    }

    #[test]
    fn request_with_typed_arguments() {
        let args = dapwire_core::LaunchRequestArguments::program("/bin/app");
        let request = Request::with_arguments("launch", &args).unwrap();
        assert_eq!(request.arguments, json!({"program": "/bin/app"}));
        assert!(!request.is_initialize());
    }

    #[test]
    fn header_classifies_types() {
        let header: MessageHeader =
            serde_json::from_str(r#"{"seq":3,"type":"event","event":"stopped"}"#).unwrap();
        assert_eq!(header.seq, 3);
        assert_eq!(header.kind, MessageType::Event);

        let header: MessageHeader = serde_json::from_str(r#"{"type":"cancel"}"#).unwrap();
        assert_eq!(header.kind, MessageType::Unknown);
        assert_eq!(header.seq, 0);

        assert!(serde_json::from_str::<MessageHeader>(r#"{"seq":1}"#).is_err());
    }

    #[test]
    fn generic_response_keeps_body_opaque() {
        let value = json!({
            "seq": 5, "type": "response", "request_seq": 2, "command": "threads",
            "success": true, "body": {"threads": [{"id": 1, "name": "main"}]}
        });
        let response = Response::from_value(value).unwrap();

        assert!(response.capabilities().is_none());
        let body: ThreadsResponseBody = response.body_as().unwrap().unwrap();
        assert_eq!(body.threads[0].name, "main");
    }

    #[test]
    fn initialize_response_decodes_capabilities() {
        let value = json!({
            "seq": 1, "type": "response", "request_seq": 1, "command": "initialize",
            "success": true, "body": {"supportsConfigurationDoneRequest": true}
        });
        let response = Response::from_value(value).unwrap();

        let capabilities = response.capabilities().unwrap();
        assert!(capabilities.supports_configuration_done_request);

        let init = InitializeResponse::from_response(response).unwrap();
        assert!(init.success);
        assert_eq!(init.request_seq, 1);
        assert!(init.body.supports_configuration_done_request);
    }

    #[test]
    fn initialize_response_without_body_gets_default_capabilities() {
        let value = json!({
            "seq": 1, "type": "response", "request_seq": 1,
            "command": "initialize", "success": true
        });
        let response = Response::from_value(value).unwrap();
        assert_eq!(response.capabilities(), Some(&Capabilities::default()));
    }

    #[test]
    fn failed_initialize_keeps_error_body() {
        let value = json!({
            "seq": 1, "type": "response", "request_seq": 1, "command": "initialize",
            "success": false,
            "body": {"error": {"id": 7, "format": "unsupported adapter {id}", "variables": {"id": "x"}}}
        });
        let response = Response::from_value(value).unwrap();

        assert!(response.capabilities().is_none());
        assert_eq!(
            response.error_detail().as_deref(),
            Some("unsupported adapter x")
        );
        assert!(InitializeResponse::from_response(response).is_err());
    }

    #[test]
    fn error_detail_prefers_message() {
        let response = Response::new(4, "launch", false)
            .with_message("program not found")
            .with_body(json!({"error": Message::new(1, "ignored")}));
        assert_eq!(response.error_detail().as_deref(), Some("program not found"));

        let bare = Response::new(4, "launch", false);
        assert_eq!(bare.error_detail().as_deref(), Some("launch failed"));

        let ok = Response::new(4, "launch", true);
        assert!(ok.error_detail().is_none());
    }

    #[test]
    fn null_body_is_empty() {
        let response: Response = serde_json::from_value(json!({
            "request_seq": 1, "command": "next", "success": true, "body": null
        }))
        .unwrap();
        assert!(response.body.is_empty());
        assert_eq!(response.body_as::<Value>().unwrap(), None);
    }

    #[test]
    fn event_uses_event_wire_key() {
        let event = Event::new("output").with_body(json!({"category": "stdout", "output": "hi\n"}));
        let value = serde_json::to_value(ProtocolMessage::from(event)).unwrap();
        assert_eq!(value["type"], "event");
        assert_eq!(value["event"], "output");

        let parsed: Event = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.kind(), EventKind::Output);
        let body: OutputEventBody = parsed.body_as().unwrap().unwrap();
        assert_eq!(body.output, "hi\n");
    }

    #[test]
    fn event_without_body() {
        let event: Event =
            serde_json::from_str(r#"{"seq":9,"type":"event","event":"terminated"}"#).unwrap();
        assert_eq!(event.event_type, "terminated");
        assert!(event.body.is_none());
        assert_eq!(event.body_as::<Value>().unwrap(), None);
    }

    #[test]
    fn protocol_message_accessors() {
        let mut message = ProtocolMessage::from(Event::new("stopped"));
        assert_eq!(message.kind(), MessageType::Event);
        assert_eq!(message.name(), "stopped");
        assert_eq!(message.seq(), 0);
        message.set_seq(12);
        assert_eq!(message.seq(), 12);
    }

    #[test]
    fn response_roundtrips_through_protocol_message() {
        let response = Response::new(3, "evaluate", true).with_body(json!({"result": "42"}));
        let json = serde_json::to_string(&ProtocolMessage::from(response.clone())).unwrap();
        let parsed: ProtocolMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ProtocolMessage::Response(response));
    }
}
