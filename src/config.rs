// Configuration File Support
//
// This module provides configuration file parsing for shopcopilot.
// Supports TOML format with environment variable overrides.
// Configuration files are loaded from the user config directory: ~/.config/shopcopilot/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::mcp::client::ClientOptions;
use crate::mcp::drain::{DrainConfig, DEFAULT_READY_MARKER, DEFAULT_STDERR_FILTERS};
use crate::mcp::protocol::{ClientInfo, DEFAULT_PROTOCOL_VERSION};
use crate::mcp::supervisor::{default_strategies, SpawnStrategy};

/// Upper bound for every configurable timeout
const MAX_TIMEOUT_SECS: u64 = 600;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Tool provider configuration
    pub server: ServerConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Tool provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Timeout in seconds for each tool call
    pub request_timeout_secs: u64,

    /// Timeout in seconds for the initialize handshake
    pub handshake_timeout_secs: u64,

    /// Seconds to wait for the readiness marker before the handshake (0 = don't wait)
    pub ready_timeout_secs: u64,

    /// Substring on stderr that signals the provider is listening
    pub ready_marker: Option<String>,

    /// stderr lines containing any of these are not logged
    pub stderr_filters: Vec<String>,

    /// Protocol version sent in `initialize`
    pub protocol_version: String,

    /// Client name sent in `initialize`
    pub client_name: String,

    /// Launch strategies, tried in order; empty means the built-in list
    pub strategies: Vec<SpawnStrategy>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            handshake_timeout_secs: 30,
            ready_timeout_secs: 0,
            ready_marker: Some(DEFAULT_READY_MARKER.to_string()),
            stderr_filters: DEFAULT_STDERR_FILTERS.iter().map(|s| s.to_string()).collect(),
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            client_name: env!("CARGO_PKG_NAME").to_string(),
            strategies: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    /// Readiness wait, if enabled
    pub fn ready_timeout(&self) -> Option<Duration> {
        (self.ready_timeout_secs > 0).then(|| Duration::from_secs(self.ready_timeout_secs))
    }

    /// Strategies to try, falling back to the built-in order
    pub fn spawn_strategies(&self) -> Vec<SpawnStrategy> {
        if self.strategies.is_empty() {
            default_strategies()
        } else {
            self.strategies.clone()
        }
    }

    pub fn drain_config(&self) -> DrainConfig {
        DrainConfig {
            filters: self.stderr_filters.clone(),
            ready_marker: self.ready_marker.clone(),
        }
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            request_timeout: self.request_timeout(),
            handshake_timeout: self.handshake_timeout(),
            protocol_version: self.protocol_version.clone(),
            client_info: ClientInfo {
                name: self.client_name.clone(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from the default config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// Missing files yield the defaults. Environment overrides and
    /// validation apply either way.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;

            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;

            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/shopcopilot/config.toml` on Linux
    pub fn config_path() -> PathBuf {
        match dirs::config_dir() {
            Some(dir) => dir.join("shopcopilot").join("config.toml"),
            None => {
                // Fallback if the platform config dir cannot be determined
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home)
                    .join(".config")
                    .join("shopcopilot")
                    .join("config.toml")
            }
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - SHOPCOPILOT_LOG_LEVEL
    /// - SHOPCOPILOT_LOG_FORMAT
    /// - SHOPCOPILOT_REQUEST_TIMEOUT_SECS
    fn apply_env_overrides(self) -> Self {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    fn apply_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("SHOPCOPILOT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("SHOPCOPILOT_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Some(timeout) = lookup("SHOPCOPILOT_REQUEST_TIMEOUT_SECS") {
            match timeout.parse::<u64>() {
                Ok(secs) if (1..=MAX_TIMEOUT_SECS).contains(&secs) => {
                    self.server.request_timeout_secs = secs;
                }
                _ => tracing::warn!(
                    "Ignoring SHOPCOPILOT_REQUEST_TIMEOUT_SECS={}: expected 1..={}",
                    timeout,
                    MAX_TIMEOUT_SECS
                ),
            }
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        // Validate logging level
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        // Validate logging format
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        let server = &self.server;
        for (name, secs) in [
            ("request_timeout_secs", server.request_timeout_secs),
            ("handshake_timeout_secs", server.handshake_timeout_secs),
        ] {
            if !(1..=MAX_TIMEOUT_SECS).contains(&secs) {
                anyhow::bail!("{} must be between 1 and {} seconds", name, MAX_TIMEOUT_SECS);
            }
        }
        if server.ready_timeout_secs > MAX_TIMEOUT_SECS {
            anyhow::bail!("ready_timeout_secs must be at most {} seconds", MAX_TIMEOUT_SECS);
        }
        if server.protocol_version.is_empty() {
            anyhow::bail!("protocol_version must not be empty");
        }

        for strategy in &server.strategies {
            if strategy.command.is_empty() {
                anyhow::bail!("Spawn strategy '{}' has empty command", strategy.label);
            }
        }

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }
}
