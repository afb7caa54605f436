//! Wiring a reader and writer into a running session.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tracing::debug;

use dapwire_protocol::{Event, FrameBuffer};

use crate::config::SessionConfig;
use crate::correlator::Client;
use crate::error::{ClientResult, SessionEnd};
use crate::pending::PendingTable;
use crate::transport::{StopHandle, TransportLoop};

/// Builds a session over an adapter's output (`reader`) and input
/// (`writer`).
///
/// Nothing is read until the returned [`TransportLoop`] is run; requests
/// issued before that simply wait.
pub fn connect<R, W>(reader: R, writer: W, config: SessionConfig) -> (Client, TransportLoop<R>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let pending = Arc::new(PendingTable::new());
    let stop = Arc::new(AtomicBool::new(false));

    let client = Client::new(
        Box::new(writer),
        Arc::clone(&pending),
        Arc::clone(&stop),
        config.request_timeout,
    );
    let transport = TransportLoop::new(
        reader,
        FrameBuffer::with_max_message_size(config.max_message_size),
        pending,
        StopHandle::new(stop),
        config.read_buffer_size,
    );
    (client, transport)
}

/// Like [`connect`], but runs the transport loop on a new task.
pub fn spawn_session<R, W, F>(
    reader: R,
    writer: W,
    config: SessionConfig,
    on_event: F,
) -> (Client, JoinHandle<ClientResult<SessionEnd>>)
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
    F: FnMut(Event) + Send + 'static,
{
    let (client, transport) = connect(reader, writer, config);
    debug!("spawning transport loop");
    let handle = tokio::spawn(transport.on_event(on_event).run());
    (client, handle)
}
