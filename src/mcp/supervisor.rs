//! Tool provider process supervision
//!
//! Launching the dev-docs tool provider is modelled as an ordered list of
//! [`SpawnStrategy`] values tried in sequence. The first strategy that yields
//! a running child wins; every failure is recorded so a [`McpError::Startup`]
//! can explain all of them.
//!
//! The default order is a pinned local install first, then a fetch of the
//! latest published package through `npx`.

use crate::mcp::drain::DrainConfig;
use crate::mcp::error::{McpError, SpawnAttempt};
use crate::mcp::transport::StdioTransport;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::Command;

/// Published tool-provider package
pub const DEV_MCP_PACKAGE: &str = "@shopify/dev-mcp";

/// Executable name the package installs into `node_modules/.bin`
pub const DEV_MCP_BIN: &str = "shopify-dev-mcp";

/// One way of launching the tool provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpawnStrategy {
    /// Short name used in logs ("local", "latest")
    pub label: String,

    /// Program to execute
    pub command: String,

    /// Arguments for the program
    #[serde(default)]
    pub args: Vec<String>,
}

impl SpawnStrategy {
    pub fn new(label: impl Into<String>, command: impl Into<String>, args: &[&str]) -> Self {
        Self {
            label: label.into(),
            command: command.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Locally installed, version-pinned binary
    pub fn local() -> Self {
        Self::new("local", DEV_MCP_BIN, &[])
    }

    /// Latest package fetched through the package runner
    pub fn latest() -> Self {
        let package = format!("{}@latest", DEV_MCP_PACKAGE);
        Self::new("latest", "npx", &["-y", package.as_str()])
    }

    /// Command line as a single string (for diagnostics)
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }

    /// Spawn this strategy with all three pipes captured
    ///
    /// Fails if the OS refuses to start the program, or if the child is
    /// already dead by the time the spawn returns.
    pub fn launch(&self, drain_config: DrainConfig) -> Result<StdioTransport, String> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => format!("executable not found: {}", e),
                std::io::ErrorKind::PermissionDenied => format!("permission denied: {}", e),
                _ => format!("spawn failed: {}", e),
            })?;

        if let Ok(Some(status)) = child.try_wait() {
            return Err(format!("exited immediately with {}", status));
        }

        StdioTransport::from_child(child, self.command_line(), drain_config)
            .map_err(|e| format!("failed to capture stdio: {}", e))
    }
}

/// Default launch order: pinned local install, then latest via npx
pub fn default_strategies() -> Vec<SpawnStrategy> {
    vec![SpawnStrategy::local(), SpawnStrategy::latest()]
}

/// Owns the launch policy for the tool provider process
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    strategies: Vec<SpawnStrategy>,
    drain_config: DrainConfig,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new(default_strategies())
    }
}

impl ProcessSupervisor {
    pub fn new(strategies: Vec<SpawnStrategy>) -> Self {
        Self {
            strategies,
            drain_config: DrainConfig::default(),
        }
    }

    /// Set the stderr drain settings used for every spawned child
    pub fn with_drain_config(mut self, config: DrainConfig) -> Self {
        self.drain_config = config;
        self
    }

    /// Configured strategies, in launch order
    pub fn strategies(&self) -> &[SpawnStrategy] {
        &self.strategies
    }

    /// Start the tool provider
    ///
    /// Tries each strategy in order and returns the first running child as a
    /// transport. The stderr drain is already running when this returns.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::Startup`] listing every failed attempt.
    pub fn spawn(&self) -> Result<StdioTransport, McpError> {
        let mut attempts = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            tracing::info!(
                "Spawning tool provider ({}): {}",
                strategy.label,
                strategy.command_line()
            );

            match strategy.launch(self.drain_config.clone()) {
                Ok(transport) => {
                    tracing::info!(
                        "Tool provider started via '{}' strategy (pid {:?})",
                        strategy.label,
                        transport.pid()
                    );
                    return Ok(transport);
                }
                Err(cause) => {
                    tracing::warn!("Spawn strategy '{}' failed: {}", strategy.label, cause);
                    attempts.push(SpawnAttempt {
                        label: strategy.label.clone(),
                        command: strategy.command_line(),
                        cause,
                    });
                }
            }
        }

        Err(McpError::Startup { attempts })
    }
}
