//! Client side of a Content-Length framed debug adapter connection.
//!
//! [`connect`] splits a session into a [`Client`], used to send requests
//! and await their responses from any task, and a [`TransportLoop`] that
//! reads the adapter's output and routes responses and events. The
//! `dapwire` binary builds on these to drive an adapter process from the
//! command line.

pub mod adapter;
pub mod cli;
pub mod commands;
pub mod config;
pub mod correlator;
pub mod dispatch;
pub mod error;
mod pending;
pub mod session;
pub mod transport;

pub use adapter::{AdapterProcess, AdapterStreams};
pub use cli::Cli;
pub use config::{ClientConfig, SessionConfig};
pub use correlator::{BoxedWriter, Client, PendingResponse};
pub use dispatch::EventSink;
pub use error::{ClientError, ClientResult, SessionEnd};
pub use session::{connect, spawn_session};
pub use transport::{StopHandle, TransportLoop};
