//! Tool Provider Client
//!
//! A client for a tool provider that runs as a child process and speaks
//! newline-delimited JSON-RPC 2.0 over its stdin/stdout.
//!
//! # Architecture
//!
//! The implementation is organized into layers:
//!
//! 1. **Protocol Layer** (`protocol`): JSON-RPC 2.0 message types
//! 2. **Process Layer** (`supervisor`, `drain`): spawn strategies and the
//!    stderr drain
//! 3. **Transport Layer** (`transport`): line I/O with a reader task and
//!    bounded waits
//! 4. **Client Layer** (`client`): handshake, correlated tool calls and the
//!    channel state machine

// Protocol layer: JSON-RPC 2.0 message types
pub mod protocol;

// Errors surfaced to callers
pub mod error;

// Child stderr consumer
pub mod drain;

// Transport layer: stdio transport and the Transport trait
pub mod transport;

// Spawn strategies and process launch
pub mod supervisor;

// Client layer: handshake and tool calls
pub mod client;

pub use client::{ChannelState, ClientOptions, McpClient};
pub use drain::{DrainConfig, Readiness, ReadySignal, StderrDrain};
pub use error::{McpError, SpawnAttempt};
pub use protocol::{
    ClientInfo, InitializeParams, McpMethod, RpcRequest, RpcResponse, ServerInfo, Tool,
    ToolCallParams,
};
pub use supervisor::{default_strategies, ProcessSupervisor, SpawnStrategy};
pub use transport::{RecvError, StdioTransport, Transport};

// Property-based tests module
#[cfg(test)]
mod proptests;
