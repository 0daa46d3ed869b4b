//! Daemon configuration.
//!
//! Three layers, later layers winning: built-in defaults, an optional
//! TOML file (`$AEB_CONFIG`, else `<config_dir>/aeb/config.toml`), then
//! the `AEB_HOST` / `AEB_PORT` environment variables.

use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Default listen host. The protocol serves one trusted local client, so
/// the daemon only ever binds loopback by default.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default listen port.
pub const DEFAULT_PORT: u16 = 65234;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "AEB_CONFIG";

/// Listener configuration for the bridge daemon.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    pub host: String,
    pub port: u16,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl BridgeConfig {
    /// Loads configuration from all layers.
    ///
    /// # Errors
    ///
    /// Fails if an explicitly named config file is unreadable or invalid,
    /// or if an environment override does not parse. A missing default
    /// config file is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match config_file_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            Some(path) if env::var_os(CONFIG_ENV).is_some() => {
                // An explicitly requested file must exist.
                return Err(ConfigError::Read {
                    path: path.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "config file not found",
                    ),
                });
            }
            _ => Self::default(),
        };

        config.apply_overrides(
            env::var(HOST_ENV).ok(),
            env::var(PORT_ENV).ok(),
        )?;

        Ok(config)
    }

    /// Parses a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Applies host/port overrides on top of the current values.
    fn apply_overrides(
        &mut self,
        host: Option<String>,
        port: Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidPort { value: port })?;
        }
        Ok(())
    }

    /// The `host:port` string to bind.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

const HOST_ENV: &str = "AEB_HOST";
const PORT_ENV: &str = "AEB_PORT";

fn config_file_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("aeb").join("config.toml"))
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid port value: {value}")]
    InvalidPort { value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_bind_loopback() {
        let config = BridgeConfig::default();
        assert_eq!(config.addr(), "127.0.0.1:65234");
    }

    #[test]
    fn file_layer_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host = \"0.0.0.0\"\nport = 9000").unwrap();

        let config = BridgeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 7777").unwrap();

        let config = BridgeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, 7777);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "prot = 7777").unwrap();

        assert!(matches!(
            BridgeConfig::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn env_layer_overrides_file_values() {
        let mut config = BridgeConfig {
            host: "10.0.0.1".to_string(),
            port: 9000,
        };
        config
            .apply_overrides(Some("127.0.0.1".to_string()), Some("65234".to_string()))
            .unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn invalid_port_override_is_an_error() {
        let mut config = BridgeConfig::default();
        let err = config
            .apply_overrides(None, Some("not-a-port".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("not-a-port"));
    }
}
