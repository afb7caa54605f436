//! Launching a debug adapter as a child process.
//!
//! Adapters speak the protocol over their standard streams: the client
//! writes to the adapter's stdin and reads from its stdout. Stderr is left
//! attached to ours so adapter diagnostics stay visible.

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use crate::config::AdapterSettings;
use crate::error::{ClientError, ClientResult};

/// A running adapter process.
///
/// The process is killed when this value is dropped.
#[derive(Debug)]
pub struct AdapterProcess {
    child: Child,
    program: String,
}

/// The pipes connected to the adapter.
#[derive(Debug)]
pub struct AdapterStreams {
    /// Adapter output, read by the transport loop.
    pub reader: ChildStdout,
    /// Adapter input, written by the client.
    pub writer: ChildStdin,
}

impl AdapterProcess {
    /// Spawns the adapter described by `settings`.
    pub fn spawn(settings: &AdapterSettings) -> ClientResult<(Self, AdapterStreams)> {
        let program = settings
            .program
            .as_deref()
            .ok_or_else(|| ClientError::config("adapter.program is not set"))?;
        Self::spawn_program(program, settings)
    }

    fn spawn_program(
        program: &Path,
        settings: &AdapterSettings,
    ) -> ClientResult<(Self, AdapterStreams)> {
        let name = program.display().to_string();

        let mut cmd = Command::new(program);
        cmd.args(&settings.args);
        if let Some(ref cwd) = settings.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &settings.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        debug!(program = %name, args = ?settings.args, "spawning adapter");

        let mut child = cmd.spawn().map_err(|source| ClientError::Launch {
            program: name.clone(),
            source,
        })?;

        let (Some(reader), Some(writer)) = (child.stdout.take(), child.stdin.take()) else {
            return Err(ClientError::Launch {
                program: name,
                source: std::io::Error::other("adapter stdio was not captured"),
            });
        };

        debug!(program = %name, pid = child.id(), "adapter started");
        Ok((
            Self {
                child,
                program: name,
            },
            AdapterStreams { reader, writer },
        ))
    }

    /// OS process id, `None` once the process has been reaped.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// The program that was launched.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Waits for the adapter to exit.
    pub async fn wait(&mut self) -> ClientResult<ExitStatus> {
        let status = self.child.wait().await?;
        debug!(program = %self.program, %status, "adapter exited");
        Ok(status)
    }

    /// Kills the adapter and reaps it.
    pub async fn kill(&mut self) -> ClientResult<()> {
        if let Err(e) = self.child.kill().await {
            warn!(program = %self.program, error = %e, "failed to kill adapter");
            return Err(e.into());
        }
        Ok(())
    }
}
