//! Configuration management for Neochat
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{Result, NeochatError};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for Neochat
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Model server connection settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Persistence settings
    #[serde(default)]
    pub storage: StorageConfig,
    /// Chat defaults
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Model server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the Ollama server
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_host() -> String {
    "http://localhost:11434".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
        }
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory of the embedded store; the per-user data directory when unset
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Prefix applied to every persisted key
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String {
    "neo2_".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            namespace: default_namespace(),
        }
    }
}

impl StorageConfig {
    /// Resolve the on-disk location of the store
    ///
    /// Returns `None` when no path is configured and the platform data
    /// directory cannot be determined.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.path {
            return Some(path.clone());
        }
        ProjectDirs::from("dev", "neochat", "neochat").map(|dirs| dirs.data_dir().join("store"))
    }
}

/// Chat defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Model used when none has been selected yet
    #[serde(default)]
    pub default_model: Option<String>,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| NeochatError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| NeochatError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(host) = std::env::var("NEOCHAT_HOST") {
            self.server.host = host;
        }

        if let Ok(model) = std::env::var("NEOCHAT_MODEL") {
            self.chat.default_model = Some(model);
        }

        if let Ok(path) = std::env::var("NEOCHAT_STORAGE_PATH") {
            self.storage.path = Some(PathBuf::from(path));
        }

        if let Ok(namespace) = std::env::var("NEOCHAT_NAMESPACE") {
            self.storage.namespace = namespace;
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(host) = &cli.host {
            tracing::debug!("Using host override from CLI: {}", host);
            self.server.host = host.clone();
        }
        if let Some(path) = &cli.storage_path {
            tracing::debug!("Using storage path override from CLI: {}", path.display());
            self.storage.path = Some(path.clone());
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if the host is not an http(s) URL or the namespace is empty
    pub fn validate(&self) -> Result<()> {
        validate_server_url(&self.server.host)?;

        if self.storage.namespace.is_empty() {
            return Err(
                NeochatError::Config("storage.namespace cannot be empty".to_string()).into(),
            );
        }

        Ok(())
    }
}

/// Check that a server base URL is an absolute http(s) URL
pub fn validate_server_url(raw: &str) -> Result<()> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| NeochatError::Config(format!("Invalid server URL '{}': {}", raw, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(NeochatError::Config(format!(
            "Invalid server URL scheme '{}': must be http or https",
            other
        ))
        .into()),
    }
}
