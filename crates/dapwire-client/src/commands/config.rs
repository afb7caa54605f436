//! Configuration commands.

use std::path::Path;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Dump the current configuration to stdout.
pub fn dump(config: &ClientConfig, path: &Path) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(config)
        .map_err(|e| ClientError::config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", path.display());
    println!("{}", toml_str);

    Ok(())
}

/// Validate the configuration.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    config.validate()?;
    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file path.
pub fn path(path: &Path) -> ClientResult<()> {
    let exists = if path.exists() { "" } else { " (not found)" };
    println!("config: {}{}", path.display(), exists);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_default_config_serializes() {
        let config = ClientConfig::default();
        let rendered = toml::to_string_pretty(&config).unwrap();
        let parsed: ClientConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
        assert!(dump(&config, Path::new("/tmp/dapwire.toml")).is_ok());
    }

    #[test]
    fn validate_reports_missing_program() {
        let err = validate(&ClientConfig::default()).unwrap_err();
        assert!(err.to_string().contains("adapter.program"));
    }
}
