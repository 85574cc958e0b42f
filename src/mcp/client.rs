//! RPC Channel
//!
//! This module provides the request/response channel on top of a
//! [`Transport`]: the `initialize` handshake, correlated `tools/call`
//! requests and bounded waits for their responses.
//!
//! # Lifecycle
//!
//! ```text
//! Spawned → Initializing → Ready → (Calling → Ready)* → Terminated
//! ```
//!
//! `Terminated` is absorbing and is reached on shutdown, on a failed
//! handshake, on a write failure, on a timeout and whenever the child is
//! found dead. Any request in that state fails with
//! [`McpError::ProcessExited`] without touching the pipes.
//!
//! The channel is strictly half-duplex: one request is in flight at a time
//! and `&mut self` enforces it. Each request is recorded in a pending table
//! keyed by correlation id; a response whose id is not pending means the
//! stream is out of step, which is treated as a protocol error.
//!
//! # Usage
//!
//! ```ignore
//! use shopcopilot::mcp::{McpClient, ProcessSupervisor};
//!
//! let transport = ProcessSupervisor::default().spawn()?;
//! let mut client = McpClient::new(transport);
//! client.initialize().await?;
//! let result = client
//!     .call_tool("search_dev_docs", json!({"prompt": "discount code"}))
//!     .await?;
//! ```

use crate::mcp::error::McpError;
use crate::mcp::protocol::{
    error_message, ClientInfo, InitializeParams, McpMethod, RpcRequest, RpcResponse, ServerInfo, Tool,
    ToolCallParams, DEFAULT_PROTOCOL_VERSION,
};
use crate::mcp::transport::{RecvError, Transport};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default bound on a single tool call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on the `initialize` round trip
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Channel state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Child is running, handshake not started
    Spawned,

    /// `initialize` is in flight
    Initializing,

    /// Handshake complete, no request in flight
    Ready,

    /// A request is in flight
    Calling,

    /// Child killed or gone; no further requests possible
    Terminated,
}

/// Channel tuning
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Bound on each `tools/call` / `tools/list` wait
    pub request_timeout: Duration,

    /// Bound on the `initialize` wait
    pub handshake_timeout: Duration,

    /// Protocol version advertised in `initialize`
    pub protocol_version: String,

    /// Client identity advertised in `initialize`
    pub client_info: ClientInfo,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            client_info: ClientInfo::default(),
        }
    }
}

/// Outstanding request awaiting its response
#[derive(Debug)]
struct PendingRequest {
    method: McpMethod,
    sent_at: Instant,
}

/// Request/response channel to a tool provider
///
/// # Type Parameters
///
/// * `T` - The transport type (normally [`crate::mcp::StdioTransport`])
pub struct McpClient<T>
where
    T: Transport,
{
    /// Underlying transport for sending/receiving lines
    transport: T,

    /// Timeouts and handshake identity
    options: ClientOptions,

    /// Channel state
    state: ChannelState,

    /// Requests written but not yet answered, by correlation id
    pending: HashMap<String, PendingRequest>,

    /// Server identity (after initialization, when reported)
    server_info: Option<ServerInfo>,

    /// Available tools (after listing)
    tools: Vec<Tool>,
}

impl<T> McpClient<T>
where
    T: Transport,
{
    /// Create a channel over a freshly spawned transport
    pub fn new(transport: T) -> Self {
        Self::with_options(transport, ClientOptions::default())
    }

    pub fn with_options(transport: T, options: ClientOptions) -> Self {
        Self {
            transport,
            options,
            state: ChannelState::Spawned,
            pending: HashMap::new(),
            server_info: None,
            tools: Vec::new(),
        }
    }

    /// Override the per-request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.options.request_timeout = timeout;
        self
    }

    /// Get the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the underlying transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Get the current channel state
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Channel options in effect
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Server identity reported during the handshake
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Tools cached by the last `list_tools`
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Whether the child process is still running
    pub fn is_alive(&mut self) -> bool {
        self.state != ChannelState::Terminated && self.transport.is_alive()
    }

    /// Perform the `initialize` / `initialized` handshake
    ///
    /// Must be called exactly once, before any tool call.
    ///
    /// # Errors
    ///
    /// - [`McpError::Handshake`] if the server answers with an error payload
    /// - [`McpError::Timeout`], [`McpError::ProcessExited`], [`McpError::Write`]
    ///   on transport failures
    ///
    /// Every failure is fatal: the child is killed and the channel becomes
    /// `Terminated`.
    pub async fn initialize(&mut self) -> Result<(), McpError> {
        match self.state {
            ChannelState::Spawned => {}
            ChannelState::Terminated => return Err(self.exited()),
            other => {
                return Err(McpError::Protocol(format!(
                    "initialize is only valid once, channel is {:?}",
                    other
                )))
            }
        }

        if !self.transport.is_alive() {
            return Err(self.fail(self.exited()));
        }

        let params = InitializeParams::new(
            self.options.protocol_version.clone(),
            self.options.client_info.clone(),
        );
        let params = serde_json::to_value(&params)
            .map_err(|e| McpError::Protocol(format!("failed to encode initialize params: {}", e)))?;
        let request = RpcRequest::new(McpMethod::Initialize.as_str(), Some(params));

        self.state = ChannelState::Initializing;
        tracing::info!("Initializing tool provider connection...");

        let timeout = self.options.handshake_timeout;
        let response = match self
            .round_trip(request, McpMethod::Initialize, "initialize", timeout)
            .await
        {
            Ok(response) => response,
            Err(e) => return Err(self.fail(e)),
        };

        if let Some(payload) = response.error {
            tracing::error!("Tool provider rejected handshake: {}", payload);
            return Err(self.fail(McpError::Handshake { payload }));
        }

        self.server_info = response
            .result
            .as_ref()
            .and_then(|result| result.get("serverInfo"))
            .and_then(|info| serde_json::from_value(info.clone()).ok());

        let notification = RpcRequest::notification(McpMethod::Initialized.as_str());
        if let Err(e) = self.transport.send(&notification).await {
            return Err(self.fail(e));
        }

        self.state = ChannelState::Ready;
        match &self.server_info {
            Some(info) => tracing::info!(
                "Tool provider connection initialized: {} v{}",
                info.name,
                info.version
            ),
            None => tracing::info!("Tool provider connection initialized"),
        }
        Ok(())
    }

    /// Call a tool on the provider
    ///
    /// Returns the `result` field of the response unchanged.
    ///
    /// # Errors
    ///
    /// - [`McpError::NotReady`] before the handshake (nothing is written)
    /// - [`McpError::ProcessExited`] if the child is dead (checked before
    ///   writing and while waiting)
    /// - [`McpError::Tool`] if the provider answered with an error payload
    /// - [`McpError::Timeout`] if no response arrived in time (child killed)
    /// - [`McpError::Write`] / [`McpError::Protocol`] on stream failures
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Value, McpError> {
        self.ensure_ready()?;

        tracing::debug!("Calling tool: {} with arguments: {}", name, arguments);

        let params = ToolCallParams {
            name: name.to_string(),
            arguments,
        };
        let encoded = serde_json::to_value(&params)
            .map_err(|e| McpError::Protocol(format!("failed to encode tool arguments: {}", e)))?;
        let request = RpcRequest::new(McpMethod::ToolsCall.as_str(), Some(encoded));

        let response = self.request(request, McpMethod::ToolsCall, name).await?;

        if let Some(payload) = response.error {
            tracing::warn!("Tool '{}' returned error: {}", name, payload);
            return Err(McpError::Tool {
                tool: name.to_string(),
                arguments: params.arguments,
                payload,
            });
        }

        let result = response.result.ok_or_else(|| {
            McpError::Protocol(format!(
                "response to '{}' carried neither result nor error",
                name
            ))
        })?;

        tracing::debug!("Tool '{}' returned result: {}", name, result);
        Ok(result)
    }

    /// List available tools from the provider
    ///
    /// Same rendezvous and error rules as [`McpClient::call_tool`].
    pub async fn list_tools(&mut self) -> Result<Vec<Tool>, McpError> {
        self.ensure_ready()?;

        tracing::debug!("Listing available tools from tool provider");

        let request = RpcRequest::new(McpMethod::ToolsList.as_str(), None);
        let operation = McpMethod::ToolsList.as_str();
        let response = self.request(request, McpMethod::ToolsList, operation).await?;

        if let Some(payload) = response.error {
            return Err(McpError::Tool {
                tool: operation.to_string(),
                arguments: Value::Null,
                payload,
            });
        }

        let result = response
            .result
            .ok_or_else(|| McpError::Protocol("tools/list response missing result".to_string()))?;
        let tools: Vec<Tool> = serde_json::from_value(result["tools"].clone())
            .map_err(|e| McpError::Protocol(format!("failed to parse tools: {}", e)))?;

        tracing::info!("Listed {} tools from tool provider", tools.len());
        for tool in &tools {
            tracing::debug!("  - {}", tool.name);
        }

        self.tools = tools.clone();
        Ok(tools)
    }

    /// Kill the child and terminate the channel
    ///
    /// Idempotent; does not wait for the process to exit.
    pub fn shutdown(&mut self) {
        if self.state != ChannelState::Terminated {
            tracing::info!("Shutting down tool provider channel");
        }
        self.transport.terminate();
        self.pending.clear();
        self.state = ChannelState::Terminated;
    }

    /// Check if the channel accepts a request right now
    fn ensure_ready(&mut self) -> Result<(), McpError> {
        match self.state {
            ChannelState::Ready => {}
            ChannelState::Terminated => return Err(self.exited()),
            other => return Err(McpError::NotReady(other)),
        }
        if !self.transport.is_alive() {
            tracing::warn!("Tool provider is no longer running");
            return Err(self.fail(self.exited()));
        }
        Ok(())
    }

    /// Run one request through the `Ready → Calling → Ready` cycle
    async fn request(
        &mut self,
        request: RpcRequest,
        method: McpMethod,
        operation: &str,
    ) -> Result<RpcResponse, McpError> {
        self.state = ChannelState::Calling;
        let timeout = self.options.request_timeout;

        match self.round_trip(request, method, operation, timeout).await {
            Ok(response) => {
                self.state = ChannelState::Ready;
                Ok(response)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Write a request and wait for its correlated response
    async fn round_trip(
        &mut self,
        request: RpcRequest,
        method: McpMethod,
        operation: &str,
        limit: Duration,
    ) -> Result<RpcResponse, McpError> {
        let Some(id) = request.id.clone() else {
            return Err(McpError::Protocol(
                "refusing to wait on a notification".to_string(),
            ));
        };

        self.transport.send(&request).await?;
        self.pending.insert(
            id.clone(),
            PendingRequest {
                method,
                sent_at: Instant::now(),
            },
        );

        let outcome = self.await_response(&id, operation, limit).await;
        self.pending.remove(&id);
        outcome
    }

    async fn await_response(
        &mut self,
        id: &str,
        operation: &str,
        limit: Duration,
    ) -> Result<RpcResponse, McpError> {
        let started = Instant::now();

        loop {
            // Skipped lines spend the same budget as silence
            let elapsed = started.elapsed();
            if elapsed >= limit {
                return Err(Self::timed_out(operation, elapsed));
            }

            let line = match self.transport.recv_line(limit - elapsed).await {
                Ok(line) => line,
                Err(RecvError::TimedOut) => {
                    return Err(Self::timed_out(operation, started.elapsed()));
                }
                Err(RecvError::Exited(code)) => return Err(McpError::ProcessExited { code }),
            };

            let response = match RpcResponse::parse(&line) {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("Skipping non-JSON line from tool provider ({}): {}", e, line);
                    continue;
                }
            };

            if response.is_server_initiated() {
                tracing::debug!(
                    "Skipping server-initiated {}: {}",
                    if response.is_notification() { "notification" } else { "request" },
                    response.method.as_deref().unwrap_or_default()
                );
                continue;
            }

            match response.correlation_id() {
                Some(response_id) => {
                    if let Some(pending) = self.pending.remove(&response_id) {
                        tracing::debug!(
                            "{} answered in {:?}",
                            pending.method,
                            pending.sent_at.elapsed()
                        );
                        return Ok(response);
                    }
                    return Err(McpError::Protocol(format!(
                        "response id {} does not match pending request {}",
                        response_id, id
                    )));
                }
                None => match response.error {
                    Some(payload) => {
                        return Err(McpError::Protocol(format!(
                            "uncorrelated error from tool provider: {}",
                            error_message(&payload)
                        )));
                    }
                    None => {
                        tracing::warn!("Skipping uncorrelated line from tool provider: {}", line);
                    }
                },
            }
        }
    }

    fn timed_out(operation: &str, elapsed: Duration) -> McpError {
        tracing::warn!(
            "No response to '{}' after {:?}, terminating tool provider",
            operation,
            elapsed
        );
        McpError::Timeout {
            operation: operation.to_string(),
            elapsed,
        }
    }

    /// Error for a dead or terminated channel
    fn exited(&self) -> McpError {
        McpError::ProcessExited {
            code: self.transport.exit_code(),
        }
    }

    /// Terminate the channel after a stream-level failure
    fn fail(&mut self, error: McpError) -> McpError {
        if error.is_fatal() || matches!(error, McpError::Protocol(_)) {
            self.transport.terminate();
            self.pending.clear();
            self.state = ChannelState::Terminated;
        } else if self.state == ChannelState::Calling {
            self.state = ChannelState::Ready;
        }
        error
    }
}
