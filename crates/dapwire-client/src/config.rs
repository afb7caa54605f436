//! Session and client configuration.
//!
//! [`SessionConfig`] tunes a single transport session. [`ClientConfig`] is
//! the on-disk `config.toml` (by default `~/.config/dapwire/config.toml`)
//! describing which adapter the CLI launches.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use dapwire_protocol::MAX_MESSAGE_SIZE;

use crate::error::{ClientError, ClientResult};

/// Size of the scratch buffer used for each read.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Settings for one transport session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long a request waits for its response; `None` waits forever.
    pub request_timeout: Option<Duration>,
    /// Cap on a single payload; `None` lets the read buffer grow unbounded.
    pub max_message_size: Option<usize>,
    /// Bytes requested from the stream per read.
    pub read_buffer_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout: None,
            max_message_size: Some(MAX_MESSAGE_SIZE),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl SessionConfig {
    /// Builder: set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Builder: set the payload cap.
    pub fn with_max_message_size(mut self, max: Option<usize>) -> Self {
        self.max_message_size = max;
        self
    }

    /// Builder: set the read buffer size (at least one byte).
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }
}

// ---------------------------------------------------------------------------
// ClientConfig (config.toml)
// ---------------------------------------------------------------------------

/// Configuration for the dapwire command-line client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug mode.
    pub debug: bool,

    /// Which adapter to launch.
    pub adapter: AdapterSettings,

    /// Transport settings.
    pub session: SessionSettings,
}

/// Debug adapter launch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterSettings {
    /// Adapter executable.
    pub program: Option<PathBuf>,

    /// Arguments passed to the adapter.
    pub args: Vec<String>,

    /// Working directory for the adapter process.
    pub cwd: Option<PathBuf>,

    /// Value sent as `adapterID` in `initialize`.
    pub adapter_id: String,

    /// Extra environment variables.
    pub env: BTreeMap<String, String>,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            program: None,
            args: Vec::new(),
            cwd: None,
            adapter_id: "dapwire".to_string(),
            env: BTreeMap::new(),
        }
    }
}

/// Transport settings as written in config.toml.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Request timeout in seconds; 0 disables the timeout.
    pub timeout: u64,

    /// Maximum payload size in bytes; 0 disables the cap.
    pub max_message_size: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout: 30,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}

impl SessionSettings {
    /// Converts to a [`SessionConfig`].
    pub fn to_session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::default()
            .with_max_message_size((self.max_message_size > 0).then_some(self.max_message_size));
        if self.timeout > 0 {
            config = config.with_request_timeout(Duration::from_secs(self.timeout));
        }
        config
    }
}

impl ClientConfig {
    /// Loads configuration from the default path, falling back to defaults
    /// when no file exists.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            ClientError::config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dapwire")
    }

    /// Checks that the configuration can launch an adapter.
    pub fn validate(&self) -> ClientResult<()> {
        match self.adapter.program {
            None => {
                return Err(ClientError::config(
                    "adapter.program is not set; add it to config.toml or pass --adapter",
                ));
            }
            Some(ref program) if program.as_os_str().is_empty() => {
                return Err(ClientError::config("adapter.program must not be empty"));
            }
            Some(_) => {}
        }

        if self.adapter.adapter_id.trim().is_empty() {
            return Err(ClientError::config("adapter.adapter_id must not be empty"));
        }

        if let Some(ref cwd) = self.adapter.cwd
            && !cwd.is_dir()
        {
            return Err(ClientError::config(format!(
                "adapter.cwd {} is not a directory",
                cwd.display()
            )));
        }

        Ok(())
    }
}
