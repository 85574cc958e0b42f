//! Tool Provider Transport Layer
//!
//! This module defines the transport abstraction between the RPC channel and
//! the tool-provider child process, and its stdio implementation.
//!
//! # Architecture
//!
//! The transport only moves lines. It never parses responses; that is the
//! client's job. `StdioTransport` owns three concurrent pieces:
//!
//! - the foreground writer (child stdin), used only by the caller of `send`
//! - a reader task pushing stdout lines into a bounded queue
//! - the [`StderrDrain`] task forwarding diagnostics to the log
//!
//! `recv_line` waits on the queue with a real deadline while also watching
//! for child exit, so a dead process is reported immediately instead of
//! after the full timeout.

use crate::mcp::drain::{DrainConfig, ReadySignal, StderrDrain};
use crate::mcp::error::McpError;
use crate::mcp::protocol::RpcRequest;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Capacity of the stdout line queue
const LINE_QUEUE_CAPACITY: usize = 64;

/// How long to keep collecting stdout after the child has exited
const EXIT_GRACE: Duration = Duration::from_millis(100);

/// Why `recv_line` returned without a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvError {
    /// The deadline passed with no line
    TimedOut,

    /// The child exited (or closed stdout); exit code if known
    Exited(Option<i32>),
}

/// Transport trait for the RPC channel
///
/// Implemented by [`StdioTransport`] and by test doubles, so the channel
/// logic can be exercised without spawning processes.
#[allow(async_fn_in_trait)]
pub trait Transport: Send {
    /// Write one request line and flush it
    ///
    /// On I/O failure the implementation terminates the child and returns
    /// [`McpError::Write`].
    async fn send(&mut self, request: &RpcRequest) -> Result<(), McpError>;

    /// Wait up to `limit` for the next non-empty stdout line
    async fn recv_line(&mut self, limit: Duration) -> Result<String, RecvError>;

    /// Whether the child process is still running
    fn is_alive(&mut self) -> bool;

    /// Exit code of the child, once known
    fn exit_code(&self) -> Option<i32>;

    /// Send a kill signal; idempotent and non-blocking
    fn terminate(&mut self);
}

/// stdio transport for a local tool-provider process
///
/// Built from an already spawned [`Child`] whose stdin, stdout and stderr
/// are all piped. See [`crate::mcp::supervisor`] for how children are
/// launched.
pub struct StdioTransport {
    /// Child process handle
    child: Option<Child>,

    /// stdin handle for sending requests
    stdin: Option<ChildStdin>,

    /// Lines read from stdout by the reader task
    lines: mpsc::Receiver<String>,

    /// Reader task feeding `lines`
    reader: JoinHandle<()>,

    /// Background stderr consumer
    drain: StderrDrain,

    /// Server command (for diagnostics)
    command: String,

    /// Set once `terminate` ran or the child was observed dead
    terminated: bool,

    /// Exit code once observed
    exit_code: Option<i32>,
}

impl StdioTransport {
    /// Wrap a spawned child
    ///
    /// Starts the stderr drain and the stdout reader immediately, before any
    /// handshake traffic. Fails if any of the three pipes is missing.
    pub fn from_child(
        mut child: Child,
        command: impl Into<String>,
        drain_config: DrainConfig,
    ) -> std::io::Result<Self> {
        let missing = |name: &str| {
            std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                format!("child {} was not piped", name),
            )
        };
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        let drain = StderrDrain::start(stderr, drain_config);
        let (tx, lines) = mpsc::channel(LINE_QUEUE_CAPACITY);
        let reader = tokio::spawn(read_stdout(stdout, tx));

        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            lines,
            reader,
            drain,
            command: command.into(),
            terminated: false,
            exit_code: None,
        })
    }

    /// Get the server command string (for diagnostics)
    pub fn command(&self) -> &str {
        &self.command
    }

    /// OS process id, while the child is running
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Readiness signal fed by the stderr drain
    pub fn ready_signal(&self) -> ReadySignal {
        self.drain.ready_signal()
    }

    /// Wait for the child to exit and return its exit code
    pub async fn wait(&mut self) -> Option<i32> {
        if let Some(child) = self.child.as_mut() {
            if let Ok(status) = child.wait().await {
                self.record_exit(status);
            }
        }
        self.exit_code
    }

    fn record_exit(&mut self, status: ExitStatus) {
        self.terminated = true;
        self.exit_code = status.code();
    }

    /// Collect a line that was already in flight when the child exited
    async fn drain_after_exit(&mut self) -> Result<String, RecvError> {
        match tokio::time::timeout(EXIT_GRACE, self.lines.recv()).await {
            Ok(Some(line)) => Ok(line),
            _ => Err(RecvError::Exited(self.exit_code)),
        }
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            if !self.terminated {
                tracing::debug!("Dropping StdioTransport, killing tool provider");
                // Note: We can't await in Drop, so we just start the kill
                let _ = child.start_kill();
            }
        }
        self.reader.abort();
        self.drain.abort();
    }
}

enum Wake {
    Line(Option<String>),
    Exited(std::io::Result<ExitStatus>),
    Deadline,
}

impl Transport for StdioTransport {
    async fn send(&mut self, request: &RpcRequest) -> Result<(), McpError> {
        let line = request
            .to_line()
            .map_err(|e| McpError::Protocol(format!("failed to serialize request: {}", e)))?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(McpError::ProcessExited {
                code: self.exit_code,
            });
        };

        tracing::debug!("Sending to tool provider: {}", line.trim_end());

        let written = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.flush().await
        }
        .await;

        if let Err(e) = written {
            tracing::warn!("Write to tool provider failed, terminating: {}", e);
            self.terminate();
            return Err(McpError::Write(e));
        }
        Ok(())
    }

    async fn recv_line(&mut self, limit: Duration) -> Result<String, RecvError> {
        let deadline = Instant::now() + limit;
        let watch_exit = !self.terminated;

        let Some(child) = self.child.as_mut() else {
            return Err(RecvError::Exited(self.exit_code));
        };

        let wake = {
            let lines = &mut self.lines;
            tokio::select! {
                biased;
                _ = tokio::time::sleep_until(deadline) => Wake::Deadline,
                line = lines.recv() => Wake::Line(line),
                status = child.wait(), if watch_exit => Wake::Exited(status),
            }
        };

        match wake {
            Wake::Line(Some(line)) => {
                tracing::debug!("Received from tool provider: {}", line);
                Ok(line)
            }
            Wake::Line(None) => {
                // stdout closed: the child is gone or about to be
                if let Some(child) = self.child.as_mut() {
                    if let Ok(Ok(status)) = tokio::time::timeout(EXIT_GRACE, child.wait()).await {
                        self.record_exit(status);
                    }
                }
                self.terminated = true;
                Err(RecvError::Exited(self.exit_code))
            }
            Wake::Exited(status) => {
                match status {
                    Ok(status) => self.record_exit(status),
                    Err(_) => self.terminated = true,
                }
                tracing::info!(
                    "Tool provider exited (code {:?}) while awaiting a response",
                    self.exit_code
                );
                self.drain_after_exit().await
            }
            Wake::Deadline => Err(RecvError::TimedOut),
        }
    }

    fn is_alive(&mut self) -> bool {
        if self.terminated {
            return false;
        }
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                self.record_exit(status);
                false
            }
            Err(e) => {
                tracing::debug!("Failed to poll tool provider status: {}", e);
                false
            }
        }
    }

    fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        self.stdin = None;
        if let Some(child) = self.child.as_mut() {
            tracing::info!("Terminating tool provider: {}", self.command);
            if let Err(e) = child.start_kill() {
                // Already reaped; nothing left to signal
                tracing::debug!("Kill signal not delivered: {}", e);
            }
        }
    }
}

/// Forward complete stdout lines into the queue until EOF
async fn read_stdout(stdout: ChildStdout, tx: mpsc::Sender<String>) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::with_capacity(4096);

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).trim().to_string();
                if line.is_empty() {
                    continue;
                }
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!("stdout reader stopped: {}", e);
                break;
            }
        }
    }
}
