//! dapwire CLI entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use dapwire_client::cli::{Cli, Command, ConfigAction};
use dapwire_client::commands;
use dapwire_client::commands::run::AdapterOverrides;
use dapwire_client::config::ClientConfig;
use dapwire_client::error::ClientResult;
use dapwire_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let (config_path, config) = match load_config(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize tracing
    let tracing = if cli.debug || config.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::cli()
    };
    if let Err(e) = init_tracing(tracing.with_wire_trace(cli.trace)) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli, config_path, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> ClientResult<(PathBuf, ClientConfig)> {
    match cli.config {
        Some(ref path) => Ok((path.clone(), ClientConfig::load_from(path)?)),
        None => Ok((ClientConfig::default_path(), ClientConfig::load()?)),
    }
}

async fn run(cli: Cli, config_path: PathBuf, config: ClientConfig) -> ClientResult<()> {
    match cli.command {
        Command::Run {
            adapter,
            adapter_id,
            launch,
            args,
        } => {
            let config = commands::run::resolve_adapter(
                &config,
                AdapterOverrides {
                    program: adapter,
                    adapter_id,
                    args,
                },
            );
            let launch = launch
                .as_deref()
                .map(commands::run::parse_launch)
                .transpose()?;

            let mut session = config.session.to_session_config();
            if let Some(secs) = cli.timeout {
                session.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
            }
            commands::run::run(&config, launch, session).await
        }
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(&config_path),
        },
    }
}
