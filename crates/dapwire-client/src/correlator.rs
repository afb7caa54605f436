//! Outbound side of a session: sequence numbers, writes and correlation.
//!
//! A [`Client`] is a cheap handle that can be cloned into as many tasks as
//! needed. Every outbound message takes the writer lock, gets the next
//! `seq` and is written in full before the lock is released, so the order
//! in which numbers are handed out is the order in which frames hit the
//! wire.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use dapwire_core::dap::commands;
use dapwire_core::{InitializeRequestArguments, LaunchRequestArguments};
use dapwire_protocol::{
    InitializeResponse, ProtocolError, ProtocolMessage, Request, Response, encode_frame,
};

use crate::error::{ClientError, ClientResult, SessionEnd};
use crate::pending::{CompletionReceiver, PendingTable};

/// Write half of a session, type-erased.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

struct WriterState {
    sink: BoxedWriter,
    next_seq: u64,
    /// Set while a frame is being written. Still set afterwards means the
    /// write failed or its future was dropped part way, so the peer may hold
    /// a truncated frame and nothing more can be written safely.
    poisoned: bool,
}

impl WriterState {
    /// Hands out the next sequence number.
    fn fresh_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        seq
    }

    /// Gives the message a `seq` unless it already has one.
    fn assign(&mut self, message: &mut ProtocolMessage) -> u64 {
        let seq = message.seq();
        if seq != 0 {
            self.next_seq = self.next_seq.max(seq.saturating_add(1));
            return seq;
        }
        let seq = self.fresh_seq();
        message.set_seq(seq);
        seq
    }

    fn check_poisoned(&self) -> std::io::Result<()> {
        if self.poisoned {
            return Err(std::io::Error::other(
                "an earlier write was interrupted, the stream is out of sync",
            ));
        }
        Ok(())
    }

    async fn write_frame(&mut self, frame: &[u8]) -> std::io::Result<()> {
        self.check_poisoned()?;
        self.poisoned = true;
        self.sink.write_all(frame).await?;
        self.sink.flush().await?;
        self.poisoned = false;
        Ok(())
    }
}

/// Evicts a registered completion unless disarmed, so a failed or dropped
/// `issue` leaves nothing behind in the pending table.
struct Registration<'a> {
    pending: &'a PendingTable,
    seq: u64,
    armed: bool,
}

impl Registration<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        if self.armed && self.pending.evict(self.seq) {
            debug!(seq = self.seq, "request abandoned before it was written");
        }
    }
}

struct Shared {
    writer: Mutex<WriterState>,
    pending: Arc<PendingTable>,
    stop: Arc<AtomicBool>,
    request_timeout: Option<Duration>,
}

/// Handle for sending messages to the adapter and awaiting responses.
#[derive(Clone)]
pub struct Client {
    shared: Arc<Shared>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("pending", &self.shared.pending.len())
            .field("request_timeout", &self.shared.request_timeout)
            .finish_non_exhaustive()
    }
}

impl Client {
    pub(crate) fn new(
        sink: BoxedWriter,
        pending: Arc<PendingTable>,
        stop: Arc<AtomicBool>,
        request_timeout: Option<Duration>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                writer: Mutex::new(WriterState {
                    sink,
                    next_seq: 1,
                    poisoned: false,
                }),
                pending,
                stop,
                request_timeout,
            }),
        }
    }

    /// Sends a message without waiting for anything.
    ///
    /// Returns the `seq` the message went out with. A message that already
    /// carries a nonzero `seq` keeps it. Write failures are logged and
    /// otherwise ignored; the transport loop notices a dead peer on its own.
    ///
    /// # Errors
    ///
    /// `Write` if an earlier write was interrupted, since anything written
    /// after a truncated frame would be misread by the adapter.
    pub async fn send(&self, message: impl Into<ProtocolMessage>) -> ClientResult<u64> {
        let mut message = message.into();
        let mut writer = self.shared.writer.lock().await;
        let seq = writer.assign(&mut message);
        if let Err(source) = writer.check_poisoned() {
            return Err(ClientError::Write {
                seq,
                command: message.name().to_string(),
                source,
            });
        }
        let frame = encode_frame(&message)?;

        match writer.write_frame(&frame).await {
            Ok(()) => trace!(
                seq,
                name = message.name(),
                frame = %String::from_utf8_lossy(&frame),
                "sent"
            ),
            Err(e) => warn!(seq, name = message.name(), error = %e, "failed to send message"),
        }
        Ok(seq)
    }

    /// Sends a request and returns a handle to its response.
    ///
    /// The request always gets a fresh `seq`; whatever it carried is
    /// replaced. The completion is registered before the frame is written,
    /// so a response can never arrive ahead of its entry. If the returned
    /// future is dropped before the write finishes, the entry is evicted and
    /// later writes fail with `Write`.
    pub async fn issue(&self, request: Request) -> ClientResult<PendingResponse> {
        let mut message = ProtocolMessage::Request(request);
        let mut writer = self.shared.writer.lock().await;
        let seq = writer.fresh_seq();
        message.set_seq(seq);
        let command = message.name().to_string();
        let frame = encode_frame(&message)?;
        let receiver = self.shared.pending.register(seq)?;
        let registration = Registration {
            pending: &self.shared.pending,
            seq,
            armed: true,
        };

        if let Err(source) = writer.write_frame(&frame).await {
            return Err(ClientError::Write {
                seq,
                command,
                source,
            });
        }
        registration.disarm();
        drop(writer);

        debug!(seq, command = %command, "request sent");
        trace!(seq, frame = %String::from_utf8_lossy(&frame), "sent");

        Ok(PendingResponse {
            seq,
            command,
            receiver,
            pending: Arc::clone(&self.shared.pending),
            timeout: self.shared.request_timeout,
        })
    }

    /// Sends a request and waits for its response.
    ///
    /// An unsuccessful response is still returned as `Ok`; use
    /// [`Response::error_detail`] or one of the typed helpers to turn it
    /// into an error.
    pub async fn request(&self, request: Request) -> ClientResult<Response> {
        self.issue(request).await?.wait().await
    }

    /// Sends `command` with typed arguments and decodes the response body.
    ///
    /// Returns `Ok(None)` for a successful response without a body.
    pub async fn call<A, B>(&self, command: &str, arguments: &A) -> ClientResult<Option<B>>
    where
        A: Serialize,
        B: DeserializeOwned,
    {
        let request = Request::with_arguments(command, arguments).map_err(ProtocolError::from)?;
        let response = ensure_success(self.request(request).await?)?;
        response
            .body_as()
            .map_err(|e| ClientError::unexpected_body(command, e))
    }

    /// Performs the `initialize` handshake.
    pub async fn initialize(
        &self,
        arguments: &InitializeRequestArguments,
    ) -> ClientResult<InitializeResponse> {
        let request =
            Request::with_arguments(commands::INITIALIZE, arguments).map_err(ProtocolError::from)?;
        let response = ensure_success(self.request(request).await?)?;
        InitializeResponse::from_response(response).map_err(|response| {
            ClientError::unexpected_body(
                commands::INITIALIZE,
                format!("expected capabilities, got {:?}", response.body),
            )
        })
    }

    /// Sends `launch`.
    pub async fn launch(&self, arguments: &LaunchRequestArguments) -> ClientResult<Response> {
        let request =
            Request::with_arguments(commands::LAUNCH, arguments).map_err(ProtocolError::from)?;
        ensure_success(self.request(request).await?)
    }

    /// Asks the transport loop to stop before its next read.
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::Release);
    }

    /// Number of requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.shared.pending.len()
    }

    /// Returns why the session ended, or `None` while it is running.
    pub fn session_end(&self) -> Option<SessionEnd> {
        self.shared.pending.ended()
    }

    /// Returns true once the transport loop has torn the session down.
    pub fn is_ended(&self) -> bool {
        self.session_end().is_some()
    }
}

fn ensure_success(response: Response) -> ClientResult<Response> {
    match response.error_detail() {
        Some(detail) => Err(ClientError::Rejected {
            command: response.command,
            detail,
        }),
        None => Ok(response),
    }
}

/// A request that has been written and is waiting for its response.
#[derive(Debug)]
pub struct PendingResponse {
    seq: u64,
    command: String,
    receiver: CompletionReceiver,
    pending: Arc<PendingTable>,
    timeout: Option<Duration>,
}

impl PendingResponse {
    /// The `seq` the request was sent with.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// The request's command.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Overrides the session's request timeout for this request.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Waits for the response.
    ///
    /// # Errors
    ///
    /// `SessionEnded` if the session is torn down first, `Timeout` if the
    /// timeout elapses. A timed out request is evicted and its response, if
    /// it ever shows up, is discarded.
    pub async fn wait(self) -> ClientResult<Response> {
        let Self {
            seq,
            command,
            mut receiver,
            pending,
            timeout,
        } = self;

        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut receiver).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    if !pending.evict(seq) {
                        // Resolved while the timer fired.
                        if let Ok(result) = receiver.try_recv() {
                            return result;
                        }
                    }
                    debug!(seq, command = %command, "request timed out");
                    return Err(ClientError::Timeout {
                        seq,
                        command,
                        timeout: limit,
                    });
                }
            },
            None => receiver.await,
        };

        match outcome {
            Ok(result) => result,
            Err(_) => Err(ClientError::SessionEnded(
                pending.ended().unwrap_or(SessionEnd::Closed),
            )),
        }
    }
}
