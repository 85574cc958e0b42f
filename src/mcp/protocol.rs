//! Tool Provider Protocol Types (JSON-RPC 2.0)
//!
//! This module defines the messages exchanged with the tool-provider child
//! process. Every message is a single JSON object on its own line.
//!
//! # Protocol Specification
//!
//! - JSON-RPC 2.0: <https://www.jsonrpc.org/specification>
//! - MCP Spec: <https://modelcontextprotocol.io/specification/2024-11-05>
//!
//! # Architecture
//!
//! The protocol layer only knows how to build and parse messages.
//! Process concerns (pipes, timeouts, liveness) live in the transport layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol version advertised during the `initialize` handshake
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// An outbound JSON-RPC 2.0 message
///
/// Requests carry a UUID correlation id and expect exactly one response line.
/// Notifications carry no id and expect nothing back.
///
/// # Example
///
/// ```json
/// {
///   "jsonrpc": "2.0",
///   "id": "1b4e28ba-2fa1-11d2-883f-0016d3cca427",
///   "method": "tools/call",
///   "params": {"name": "search_dev_docs", "arguments": {"prompt": "discount code"}}
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcRequest {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,

    /// Correlation id; absent for notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Method name to invoke
    pub method: String,

    /// Method parameters (optional, depends on method)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcRequest {
    /// Create a request with a fresh correlation id
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(Uuid::new_v4().to_string()),
            method: method.into(),
            params,
        }
    }

    /// Create a fire-and-forget notification (no id, no response expected)
    pub fn notification(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: method.into(),
            params: None,
        }
    }

    /// Whether a response line is expected for this message
    pub fn expects_response(&self) -> bool {
        self.id.is_some()
    }

    /// Serialize to a single newline-terminated line
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// An inbound JSON-RPC 2.0 message
///
/// A response carries either `result` or `error`. The error payload is kept
/// as raw JSON because its shape is defined by the tool provider.
///
/// Lines that carry a `method` are server-initiated (notifications when
/// there is no `id`, requests otherwise), not responses; see
/// [`RpcResponse::is_server_initiated`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcResponse {
    /// JSON-RPC version (some providers omit it)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,

    /// Correlation id of the request this answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    /// Method name, only present on server-initiated messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Result payload (present on success)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error payload (present on failure)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl RpcResponse {
    /// Create a successful response
    pub fn ok(id: impl Into<String>, result: Value) -> Self {
        Self {
            jsonrpc: Some(JSONRPC_VERSION.to_string()),
            id: Some(Value::String(id.into())),
            method: None,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn err(id: impl Into<String>, error: Value) -> Self {
        Self {
            jsonrpc: Some(JSONRPC_VERSION.to_string()),
            id: Some(Value::String(id.into())),
            method: None,
            result: None,
            error: Some(error),
        }
    }

    /// Parse a single stdout line
    pub fn parse(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line.trim())
    }

    /// Correlation id as a string, if it is one
    ///
    /// Numeric ids are rendered in decimal so they can still be looked up.
    pub fn correlation_id(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Server-initiated message that is not an answer to any request
    pub fn is_notification(&self) -> bool {
        self.method.is_some() && self.id.is_none()
    }

    /// Server-initiated message (notification or request), never an answer
    pub fn is_server_initiated(&self) -> bool {
        self.method.is_some()
    }

    /// Check if the response is successful
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.result.is_some()
    }
}

/// Human-readable message out of a provider error payload
///
/// Falls back to the compact JSON of the whole payload.
pub fn error_message(payload: &Value) -> String {
    payload
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| payload.as_str().map(str::to_string))
        .unwrap_or_else(|| payload.to_string())
}

/// Methods spoken on the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum McpMethod {
    /// Handshake request (must be sent first)
    Initialize,

    /// Handshake completion notification
    Initialized,

    /// List available tools
    ToolsList,

    /// Call a specific tool
    ToolsCall,
}

impl McpMethod {
    /// Convert to string for the JSON-RPC method field
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Initialized => "initialized",
            Self::ToolsList => "tools/list",
            Self::ToolsCall => "tools/call",
        }
    }
}

impl std::fmt::Display for McpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Initialization parameters
///
/// Sent during the initialize handshake to negotiate capabilities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InitializeParams {
    /// Client protocol version
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,

    /// Client capabilities (sent as `{}`)
    pub capabilities: ClientCapabilities,

    /// Client information
    #[serde(rename = "clientInfo")]
    pub client_info: ClientInfo,
}

impl InitializeParams {
    pub fn new(protocol_version: impl Into<String>, client_info: ClientInfo) -> Self {
        Self {
            protocol_version: protocol_version.into(),
            capabilities: ClientCapabilities::default(),
            client_info,
        }
    }
}

/// Client capabilities advertised during initialization
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Value>,
}

/// Client identification information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientInfo {
    /// Client name
    pub name: String,

    /// Client version
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Server identification returned by `initialize`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,

    #[serde(default)]
    pub version: String,
}

/// Tool definition returned by `tools/list`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    /// Tool name (unique identifier)
    pub name: String,

    /// Tool description
    #[serde(default)]
    pub description: String,

    /// Tool input schema (JSON Schema)
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

/// Tool call parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallParams {
    /// Name of the tool to call
    pub name: String,

    /// Tool arguments (must match input schema)
    pub arguments: Value,
}
