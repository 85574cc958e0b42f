//! Tool Provider Client Error Types
//!
//! Every failure the client can surface to a caller of `initialize`,
//! `call_tool` or `list_tools`. All of them mean "this invocation failed";
//! the caller decides whether to retry, degrade or give up.

use serde_json::Value;
use std::time::Duration;

use crate::mcp::client::ChannelState;
use crate::mcp::protocol::error_message;

/// A single failed spawn attempt, kept for the startup report
#[derive(Debug)]
pub struct SpawnAttempt {
    /// Strategy label (e.g. "local", "latest")
    pub label: String,

    /// Full command line that was tried
    pub command: String,

    /// Why it failed
    pub cause: String,
}

impl std::fmt::Display for SpawnAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (`{}`): {}", self.label, self.command, self.cause)
    }
}

/// Error types for tool provider operations
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// No spawn strategy produced a running process
    #[error("Failed to start tool provider: {}", format_attempts(.attempts))]
    Startup { attempts: Vec<SpawnAttempt> },

    /// `initialize` was answered with an error payload
    #[error("Handshake rejected by tool provider: {}", error_message(.payload))]
    Handshake { payload: Value },

    /// The child process is gone, or the channel was already terminated
    #[error("Tool provider process exited{}", format_exit(.code))]
    ProcessExited { code: Option<i32> },

    /// Writing the request line failed; the process has been killed
    #[error("Failed to write to tool provider stdin: {0}")]
    Write(#[source] std::io::Error),

    /// The response stream could not be interpreted
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The tool answered with an error payload
    #[error("Tool '{tool}' failed: {} (arguments: {arguments})", error_message(.payload))]
    Tool {
        tool: String,
        arguments: Value,
        payload: Value,
    },

    /// No valid response within the bounded wait; the process has been killed
    #[error("Timed out after {elapsed:?} waiting for '{operation}'")]
    Timeout { operation: String, elapsed: Duration },

    /// A request was issued before the handshake completed
    #[error("Client not ready: state is {0:?}")]
    NotReady(ChannelState),
}

impl McpError {
    /// Whether the channel can no longer be used after this error
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Startup { .. }
                | Self::Handshake { .. }
                | Self::ProcessExited { .. }
                | Self::Write(_)
                | Self::Timeout { .. }
        )
    }
}

fn format_attempts(attempts: &[SpawnAttempt]) -> String {
    if attempts.is_empty() {
        return "no spawn strategies configured".to_string();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" with status {}", code),
        None => String::new(),
    }
}
