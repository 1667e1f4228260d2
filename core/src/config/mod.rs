//! Client configuration
//!
//! Loaded from TOML. Example:
//!
//! ```toml
//! client_type = "agent"
//!
//! [executor]
//! path = "/usr/libexec/libstorage/lsx-linux"
//! no_download = false
//!
//! [server]
//! proto = "unix"
//! address = "/var/run/libstorage/localhost.sock"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::types::{ClientRole, PathConfig, TlsConfig};

/// Environment variable that disables executor download when truthy
pub const ENV_EXECUTOR_NO_DOWNLOAD: &str = "LIBSTORAGE_EXECUTOR_DISABLEDOWNLOAD";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error occurred while reading the config file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Executor settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Absolute path of the executor binary
    pub path: PathBuf,
    /// Lock file, defaults to `<path>.lock`
    #[serde(default)]
    pub lock_path: Option<PathBuf>,
    /// Skip executor refresh during bootstrap
    #[serde(default, alias = "disable_download")]
    pub no_download: bool,
}

/// Server endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_proto")]
    pub proto: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

fn default_proto() -> String {
    "tcp".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            proto: default_proto(),
            address: String::new(),
            tls: None,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    #[serde(default)]
    pub client_type: ClientRole,
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl ClientConfig {
    /// Minimal agent configuration for the executor at `lsx`
    pub fn new(client_type: ClientRole, lsx: impl Into<PathBuf>) -> Self {
        Self {
            client_type,
            executor: ExecutorConfig {
                path: lsx.into(),
                lock_path: None,
                no_download: false,
            },
            server: ServerConfig::default(),
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate the config file at `path`
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).await?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let path = &self.executor.path;
        if !path.is_absolute() {
            return Err(ConfigError::InvalidValue(format!(
                "executor.path must be absolute: {}",
                path.display()
            )));
        }
        if path.file_name().and_then(|n| n.to_str()).is_none() {
            return Err(ConfigError::InvalidValue(format!(
                "executor.path has no file name: {}",
                path.display()
            )));
        }
        if let Some(lock) = &self.executor.lock_path {
            if lock == path {
                return Err(ConfigError::InvalidValue(
                    "executor.lock_path must differ from executor.path".to_string(),
                ));
            }
        }
        if self.server.proto.is_empty() {
            return Err(ConfigError::InvalidValue(
                "server.proto must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply overrides from `lookup`, normally `std::env::var`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_EXECUTOR_NO_DOWNLOAD) {
            self.executor.no_download = parse_bool(&raw).ok_or_else(|| {
                ConfigError::InvalidValue(format!("{}={}", ENV_EXECUTOR_NO_DOWNLOAD, raw))
            })?;
        }
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn paths(&self) -> PathConfig {
        let paths = PathConfig::new(self.executor.path.clone());
        match &self.executor.lock_path {
            Some(lock) => paths.with_lock(lock.clone()),
            None => paths,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
client_type = "integration"

[executor]
path = "/usr/libexec/libstorage/lsx-linux"
disable_download = true

[server]
proto = "unix"
address = "/var/run/libstorage/localhost.sock"

[server.tls]
server_name = "storage.example.com"
"#;

    #[test]
    fn test_parse_sample() {
        let config = ClientConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.client_type, ClientRole::Agent);
        assert!(config.executor.no_download);
        assert_eq!(config.server.proto, "unix");
        assert_eq!(
            config.server.tls.and_then(|t| t.server_name).as_deref(),
            Some("storage.example.com")
        );
    }

    #[test]
    fn test_defaults() {
        let toml = "[executor]\npath = \"/opt/lsx-linux\"\n";
        let config = ClientConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.client_type, ClientRole::Agent);
        assert!(!config.executor.no_download);
        assert_eq!(config.server.proto, "tcp");
        assert_eq!(config.paths().lsx_lock, PathBuf::from("/opt/lsx-linux.lock"));
    }

    #[test]
    fn test_relative_executor_path_rejected() {
        let err = ClientConfig::from_toml_str("[executor]\npath = \"lsx-linux\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn test_lock_path_must_differ() {
        let mut config = ClientConfig::new(ClientRole::Agent, "/opt/lsx-linux");
        config.executor.lock_path = Some(PathBuf::from("/opt/lsx-linux"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = ClientConfig::new(ClientRole::Agent, "/opt/lsx-linux");
        config
            .apply_overrides(|key| (key == ENV_EXECUTOR_NO_DOWNLOAD).then(|| "TRUE".to_string()))
            .unwrap();
        assert!(config.executor.no_download);

        let err = config
            .apply_overrides(|_| Some("maybe".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
        assert!(config.executor.no_download);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = ClientConfig::load(&path).await.unwrap();
        assert_eq!(config.executor.path, PathBuf::from("/usr/libexec/libstorage/lsx-linux"));

        let err = ClientConfig::load(&dir.path().join("missing.toml")).await.unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
