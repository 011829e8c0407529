//! Configuration management for the filemover daemon.
//!
//! This module provides TOML-based configuration file loading.
//! The default configuration path is `~/.config/filemover/config.toml`.
//! Values are layered: built-in defaults, then the file, then `FILEMOVER_*`
//! environment variables, then command-line flags (applied by the binary).

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;

use crate::selection::CandidateFileList;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("max_sessions must be between 1 and 1000, got {0}")]
    InvalidMaxSessions(usize),

    #[error("listen_addr must be a socket address like 127.0.0.1:2022, got {0}")]
    InvalidListenAddr(String),

    #[error("root must not be empty")]
    EmptyRoot,

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Default listen address for the session server.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:2022";

/// Main configuration structure for the filemover daemon.
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// General daemon configuration.
    pub daemon: DaemonConfig,

    /// Session server configuration.
    pub server: ServerConfig,

    /// Served files configuration.
    pub files: FilesConfig,
}

/// General daemon configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Directory for daemon data (log files).
    pub data_dir: PathBuf,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

/// Session server configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the server listens on.
    pub listen_addr: String,

    /// Maximum number of concurrent sessions.
    pub max_sessions: usize,
}

/// Served files configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilesConfig {
    /// Sandboxed root. Relative paths resolve against the working directory.
    pub root: PathBuf,

    /// Comma separated names offered for interactive selection.
    pub candidates: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            max_sessions: 64,
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./testdata"),
            candidates: String::new(),
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("filemover")
        .join("config.toml")
}

/// Returns the default data directory path.
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("filemover")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - FILEMOVER_ROOT: Override the served root
    /// - FILEMOVER_FILES: Override the candidate file list
    /// - FILEMOVER_LISTEN: Override the listen address
    /// - FILEMOVER_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    pub fn apply_env_overrides(&mut self) {
        if let Some(root) = non_empty_env("FILEMOVER_ROOT") {
            tracing::info!("Overriding root from environment: {}", root);
            self.files.root = PathBuf::from(root);
        }

        if let Some(files) = non_empty_env("FILEMOVER_FILES") {
            tracing::info!("Overriding candidates from environment: {}", files);
            self.files.candidates = files;
        }

        if let Some(addr) = non_empty_env("FILEMOVER_LISTEN") {
            tracing::info!("Overriding listen_addr from environment: {}", addr);
            self.server.listen_addr = addr;
        }

        if let Some(level) = non_empty_env("FILEMOVER_LOG_LEVEL") {
            tracing::info!("Overriding log_level from environment: {}", level);
            self.daemon.log_level = level;
        }
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.max_sessions < 1 || self.server.max_sessions > 1000 {
            return Err(ConfigError::InvalidMaxSessions(self.server.max_sessions));
        }

        if self.server.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::InvalidListenAddr(
                self.server.listen_addr.clone(),
            ));
        }

        if self.files.root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyRoot);
        }

        let level = self.daemon.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.daemon.log_level.clone()));
        }

        Ok(())
    }

    /// The served root as an absolute path.
    ///
    /// Relative roots are joined onto the current working directory. The
    /// directory does not need to exist yet.
    pub fn resolved_root(&self) -> Result<PathBuf> {
        if self.files.root.is_absolute() {
            return Ok(self.files.root.clone());
        }
        let cwd = std::env::current_dir().context("Failed to read working directory")?;
        Ok(cwd.join(&self.files.root))
    }

    /// The parsed candidate file list.
    pub fn candidate_files(&self) -> CandidateFileList {
        CandidateFileList::parse(&self.files.candidates)
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
