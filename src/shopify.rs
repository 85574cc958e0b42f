//! Shopify dev-docs client handle
//!
//! [`DevDocsClient`] is the one object the rest of an application holds to
//! talk to the dev-docs tool provider. It is constructed once, shared by
//! reference, and shut down explicitly.
//!
//! ```ignore
//! let config = Config::load()?;
//! let docs = DevDocsClient::connect(&config.server).await?;
//! let answer = docs.search_dev_docs("discount code").await?;
//! docs.shutdown().await;
//! ```

use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::config::ServerConfig;
use crate::mcp::client::{ChannelState, McpClient};
use crate::mcp::drain::Readiness;
use crate::mcp::error::McpError;
use crate::mcp::protocol::{ServerInfo, Tool};
use crate::mcp::supervisor::ProcessSupervisor;
use crate::mcp::transport::StdioTransport;

/// Tool that searches the developer documentation
pub const SEARCH_DEV_DOCS: &str = "search_dev_docs";

/// Tool that searches the Admin GraphQL schema
pub const INTROSPECT_ADMIN_SCHEMA: &str = "introspect_admin_schema";

/// Shared handle to a running dev-docs tool provider
///
/// Calls are serialized through an async mutex, so concurrent callers never
/// interleave requests on the channel.
pub struct DevDocsClient {
    channel: Mutex<McpClient<StdioTransport>>,
}

impl DevDocsClient {
    /// Spawn the tool provider and complete the handshake
    ///
    /// # Errors
    ///
    /// [`McpError::Startup`] when no strategy could launch the provider, or
    /// any handshake failure from [`McpClient::initialize`].
    pub async fn connect(config: &ServerConfig) -> Result<Self, McpError> {
        let supervisor = ProcessSupervisor::new(config.spawn_strategies())
            .with_drain_config(config.drain_config());
        let transport = supervisor.spawn()?;
        Self::handshake(transport, config).await
    }

    /// Complete the handshake over an already spawned transport
    pub async fn handshake(
        transport: StdioTransport,
        config: &ServerConfig,
    ) -> Result<Self, McpError> {
        if let Some(limit) = config.ready_timeout() {
            let mut ready = transport.ready_signal();
            match ready.wait(limit).await {
                Readiness::Ready => tracing::debug!("Tool provider reported ready"),
                Readiness::Closed => {
                    tracing::warn!("Tool provider closed stderr before reporting ready")
                }
                Readiness::Pending => tracing::warn!(
                    "Tool provider not ready after {:?}, starting handshake anyway",
                    limit
                ),
            }
        }

        let mut client = McpClient::with_options(transport, config.client_options());
        client.initialize().await?;

        Ok(Self {
            channel: Mutex::new(client),
        })
    }

    /// Call a tool and return its raw `result`
    pub async fn call_tool(&self, tool_name: &str, input: Value) -> Result<Value, McpError> {
        self.channel.lock().await.call_tool(tool_name, input).await
    }

    pub async fn list_tools(&self) -> Result<Vec<Tool>, McpError> {
        self.channel.lock().await.list_tools().await
    }

    /// Search the developer documentation
    ///
    /// Returns the text snippets joined by blank lines.
    pub async fn search_dev_docs(&self, prompt: &str) -> Result<String, McpError> {
        let result = self
            .call_tool(SEARCH_DEV_DOCS, json!({ "prompt": prompt }))
            .await?;
        content_text(&result)
    }

    /// Search the Admin GraphQL schema
    pub async fn introspect_admin_schema(&self, prompt: &str) -> Result<String, McpError> {
        let result = self
            .call_tool(INTROSPECT_ADMIN_SCHEMA, json!({ "prompt": prompt }))
            .await?;
        content_text(&result)
    }

    /// Kill the tool provider; idempotent
    pub async fn shutdown(&self) {
        self.channel.lock().await.shutdown();
    }

    pub async fn state(&self) -> ChannelState {
        self.channel.lock().await.state()
    }

    pub async fn is_alive(&self) -> bool {
        self.channel.lock().await.is_alive()
    }

    pub async fn server_info(&self) -> Option<ServerInfo> {
        self.channel.lock().await.server_info().cloned()
    }
}

/// Join every `content[].text` entry of a tool result with a blank line
///
/// Entries without text (images, resources) are skipped.
pub fn content_text(result: &Value) -> Result<String, McpError> {
    let content = result
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| McpError::Protocol("tool result has no content array".to_string()))?;

    Ok(content
        .iter()
        .filter_map(|entry| entry.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n\n"))
}
