//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// dapwire - talk to a debug adapter over its standard streams
#[derive(Debug, Parser)]
#[command(name = "dapwire")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "DAPWIRE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Log every frame sent and received
    #[arg(long, global = true)]
    pub trace: bool,

    /// Request timeout in seconds (0 waits forever)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start an adapter, initialize it and print its events
    Run {
        /// Adapter executable (overrides adapter.program)
        #[arg(long, short)]
        adapter: Option<PathBuf>,

        /// Value sent as adapterID (overrides adapter.adapter_id)
        #[arg(long)]
        adapter_id: Option<String>,

        /// JSON arguments for a launch request; no launch is sent without it
        #[arg(long, short)]
        launch: Option<String>,

        /// Arguments passed to the adapter
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_run_with_adapter_args() {
        let cli = Cli::parse_from([
            "dapwire",
            "--trace",
            "run",
            "--adapter",
            "/usr/bin/lldb-dap",
            "--launch",
            r#"{"program":"./a.out"}"#,
            "--",
            "--repl-mode",
            "command",
        ]);
        assert!(cli.trace);
        match cli.command {
            Command::Run {
                adapter,
                launch,
                args,
                ..
            } => {
                assert_eq!(adapter, Some(PathBuf::from("/usr/bin/lldb-dap")));
                assert_eq!(launch.as_deref(), Some(r#"{"program":"./a.out"}"#));
                assert_eq!(args, vec!["--repl-mode", "command"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parse_config_path_with_global_flags() {
        let cli = Cli::parse_from(["dapwire", "config", "path", "--timeout", "3"]);
        assert_eq!(cli.timeout, Some(3));
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Path
            }
        ));
    }
}
