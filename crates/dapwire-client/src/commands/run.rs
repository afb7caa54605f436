//! The `run` command: launch an adapter and follow its session.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use dapwire_core::dap::{OutputEventBody, commands};
use dapwire_core::{Capabilities, InitializeRequestArguments, LaunchRequestArguments};
use dapwire_protocol::{Event, ProtocolError, Request};

use crate::adapter::AdapterProcess;
use crate::config::{AdapterSettings, ClientConfig, SessionConfig};
use crate::correlator::Client;
use crate::error::{ClientError, ClientResult};
use crate::session::spawn_session;

/// How long `disconnect` may take before the adapter is killed anyway.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Command-line overrides for the adapter settings.
#[derive(Debug, Default)]
pub struct AdapterOverrides {
    pub program: Option<PathBuf>,
    pub adapter_id: Option<String>,
    pub args: Vec<String>,
}

/// Merges command-line overrides into the configured adapter settings.
pub fn resolve_adapter(config: &ClientConfig, overrides: AdapterOverrides) -> ClientConfig {
    let mut config = config.clone();
    if let Some(program) = overrides.program {
        config.adapter.program = Some(program);
    }
    if let Some(adapter_id) = overrides.adapter_id {
        config.adapter.adapter_id = adapter_id;
    }
    if !overrides.args.is_empty() {
        config.adapter.args = overrides.args;
    }
    config
}

/// Parses the `--launch` JSON object.
pub fn parse_launch(raw: &str) -> ClientResult<LaunchRequestArguments> {
    serde_json::from_str(raw)
        .map_err(|e| ClientError::config(format!("invalid --launch arguments: {}", e)))
}

/// Runs a session against the configured adapter until it terminates or
/// the user interrupts.
pub async fn run(
    config: &ClientConfig,
    launch: Option<LaunchRequestArguments>,
    session: SessionConfig,
) -> ClientResult<()> {
    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    run_until(config, launch, session, interrupted).await
}

/// Like [`run`], but stops at whatever point `interrupt` completes.
///
/// The adapter is always asked to disconnect and then killed, even when the
/// interrupt lands in the middle of the handshake.
pub async fn run_until(
    config: &ClientConfig,
    launch: Option<LaunchRequestArguments>,
    session: SessionConfig,
    interrupt: impl Future<Output = ()>,
) -> ClientResult<()> {
    config.validate()?;
    let settings: &AdapterSettings = &config.adapter;

    let (mut process, streams) = AdapterProcess::spawn(settings)?;
    let (tx, mut events) = mpsc::unbounded_channel();
    let (client, handle) = spawn_session(streams.reader, streams.writer, session, move |event| {
        let _ = tx.send(event);
    });

    let result = tokio::select! {
        result = drive(&client, &settings.adapter_id, launch, &mut events) => result,
        () = interrupt => {
            info!("interrupted");
            Ok(())
        }
    };

    if !client.is_ended() {
        disconnect(&client).await;
    }
    client.stop();
    if let Err(e) = process.kill().await {
        debug!(error = %e, "adapter already gone");
    }

    match handle.await {
        Ok(Ok(end)) => info!(reason = %end, "session ended"),
        Ok(Err(e)) => {
            // A protocol failure is the interesting error unless the
            // conversation itself failed first.
            if result.is_ok() {
                return Err(e);
            }
            warn!(error = %e, "session failed");
        }
        Err(e) => warn!(error = %e, "transport task panicked"),
    }
    result
}

async fn drive(
    client: &Client,
    adapter_id: &str,
    launch: Option<LaunchRequestArguments>,
    events: &mut mpsc::UnboundedReceiver<Event>,
) -> ClientResult<()> {
    let init = client
        .initialize(&InitializeRequestArguments::new(adapter_id))
        .await?;
    println!("{}", format_capabilities(&init.body)?);

    if let Some(arguments) = launch {
        client.launch(&arguments).await?;
        if init.body.supports_configuration_done_request {
            client
                .call::<_, Value>(commands::CONFIGURATION_DONE, &json!({}))
                .await?;
        }
    }

    while let Some(event) = events.recv().await {
        print!("{}", format_event(&event));
        if event.kind().ends_session() {
            break;
        }
    }
    // A closed channel means the transport loop dropped the sink.
    Ok(())
}

async fn disconnect(client: &Client) {
    let request = Request::new(commands::DISCONNECT, json!({"terminateDebuggee": true}));
    let outcome = match client.issue(request).await {
        Ok(pending) => pending.with_timeout(Some(DISCONNECT_TIMEOUT)).wait().await,
        Err(e) => Err(e),
    };
    if let Err(e) = outcome {
        debug!(error = %e, "disconnect failed");
    }
}

/// Renders adapter capabilities for the terminal.
pub fn format_capabilities(capabilities: &Capabilities) -> ClientResult<String> {
    let json = serde_json::to_string_pretty(capabilities).map_err(ProtocolError::from)?;
    Ok(format!("capabilities: {}", json))
}

/// Renders one event for the terminal, newline terminated.
///
/// Program output is printed as-is; everything else as its name and body.
pub fn format_event(event: &Event) -> String {
    if event.event_type == "output"
        && let Ok(Some(body)) = event.body_as::<OutputEventBody>()
    {
        return if body.output.ends_with('\n') {
            body.output
        } else {
            format!("{}\n", body.output)
        };
    }

    match event.body {
        Some(ref body) => format!("[{}] {}\n", event.event_type, body),
        None => format!("[{}]\n", event.event_type),
    }
}
