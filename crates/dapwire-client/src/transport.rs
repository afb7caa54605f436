//! The read side of a session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace, warn};

use dapwire_protocol::{Event, FrameBuffer};

use crate::dispatch::Dispatcher;
use crate::error::{ClientResult, SessionEnd};
use crate::pending::PendingTable;

/// Requests that a [`TransportLoop`] stop.
///
/// The flag is checked before each read, so a loop blocked in a read only
/// notices it once the read returns.
#[derive(Debug, Clone)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub(crate) fn new(flag: Arc<AtomicBool>) -> Self {
        Self { flag }
    }

    /// Sets the stop flag.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns true once a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Reads frames from the adapter and dispatches them until the stream
/// ends, a stop is requested or a fatal error occurs.
pub struct TransportLoop<R> {
    reader: R,
    frames: FrameBuffer,
    dispatcher: Dispatcher,
    pending: Arc<PendingTable>,
    stop: StopHandle,
    read_buffer_size: usize,
}

impl<R> TransportLoop<R>
where
    R: AsyncRead + Unpin,
{
    pub(crate) fn new(
        reader: R,
        frames: FrameBuffer,
        pending: Arc<PendingTable>,
        stop: StopHandle,
        read_buffer_size: usize,
    ) -> Self {
        Self {
            reader,
            frames,
            dispatcher: Dispatcher::new(Arc::clone(&pending)),
            pending,
            stop,
            read_buffer_size: read_buffer_size.max(1),
        }
    }

    /// Installs the event sink.
    pub fn on_event<F>(mut self, sink: F) -> Self
    where
        F: FnMut(Event) + Send + 'static,
    {
        self.dispatcher.set_event_sink(Box::new(sink));
        self
    }

    /// Returns a handle that can stop this loop.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Runs until the session ends.
    ///
    /// Every request still waiting when the loop exits is failed with
    /// [`ClientError::SessionEnded`](crate::ClientError::SessionEnded),
    /// whatever the reason.
    ///
    /// # Errors
    ///
    /// Read errors and malformed frames. A clean end (EOF or stop) is
    /// `Ok` with the reason.
    pub async fn run(mut self) -> ClientResult<SessionEnd> {
        debug!(buffer = self.read_buffer_size, "transport loop started");
        let result = self.pump().await;

        let end = match result {
            Ok(ref end) => end.clone(),
            Err(ref e) => SessionEnd::Failed(e.to_string()),
        };
        let failed = self.pending.close(end.clone());

        match result {
            Ok(_) => debug!(reason = %end, failed, "session ended"),
            Err(ref e) => warn!(error = %e, failed, "session failed"),
        }
        result
    }

    async fn pump(&mut self) -> ClientResult<SessionEnd> {
        let mut buf = vec![0u8; self.read_buffer_size];
        loop {
            if self.stop.is_stopped() {
                return Ok(SessionEnd::Stopped);
            }

            let n = self.reader.read(&mut buf).await?;
            if n == 0 {
                return Ok(SessionEnd::Closed);
            }
            trace!(bytes = n, "read");

            self.frames.append(&buf[..n]);
            while let Some(payload) = self.frames.try_extract_frame()? {
                self.dispatcher.dispatch(&payload)?;
            }
        }
    }
}

impl<R> Drop for TransportLoop<R> {
    /// Fails outstanding requests if the loop is dropped without finishing,
    /// for instance when its task is aborted or the event sink panics. After
    /// a normal exit this changes nothing, the first recorded end wins.
    fn drop(&mut self) {
        let failed = self
            .pending
            .close(SessionEnd::Failed("transport loop aborted".into()));
        if failed > 0 {
            warn!(failed, "transport loop dropped with requests outstanding");
        }
    }
}
