//! Child stderr drain
//!
//! Continuously consumes the tool provider's diagnostic stream so the child
//! never stalls on a full stderr pipe. Each line goes to `tracing` under the
//! `shopcopilot::server_stderr` target, except lines matching one of the
//! noise filters.
//!
//! The drain also watches for a readiness marker: the tool provider prints a
//! line such as `running on stdio` once it is listening. Callers can await
//! that through [`ReadySignal`] without ever touching the stream themselves.

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Tracing target for forwarded child stderr lines
pub const STDERR_TARGET: &str = "shopcopilot::server_stderr";

/// Default noise filter: the provider dumps truncated response bodies
pub const DEFAULT_STDERR_FILTERS: &[&str] = &["Response text (truncated)"];

/// Default readiness marker printed by the dev-docs server
pub const DEFAULT_READY_MARKER: &str = "running on stdio";

/// Drain settings
#[derive(Debug, Clone)]
pub struct DrainConfig {
    /// Lines containing any of these substrings are dropped
    pub filters: Vec<String>,

    /// Substring that flips the readiness signal
    pub ready_marker: Option<String>,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            filters: DEFAULT_STDERR_FILTERS.iter().map(|s| s.to_string()).collect(),
            ready_marker: Some(DEFAULT_READY_MARKER.to_string()),
        }
    }
}

impl DrainConfig {
    fn is_noise(&self, line: &str) -> bool {
        self.filters
            .iter()
            .any(|f| !f.is_empty() && line.contains(f.as_str()))
    }

    fn is_ready_line(&self, line: &str) -> bool {
        self.ready_marker
            .as_deref()
            .is_some_and(|marker| line.contains(marker))
    }
}

/// Readiness state observed by the drain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Marker not seen yet
    Pending,

    /// Marker seen
    Ready,

    /// stderr closed before the marker appeared
    Closed,
}

/// Receiver side of the readiness watch
#[derive(Debug, Clone)]
pub struct ReadySignal {
    rx: watch::Receiver<Readiness>,
}

impl ReadySignal {
    /// Current readiness without waiting
    pub fn current(&self) -> Readiness {
        *self.rx.borrow()
    }

    /// Wait until the marker is seen, stderr closes, or `limit` elapses
    ///
    /// Returns the last observed state; `Pending` means the wait timed out.
    pub async fn wait(&mut self, limit: Duration) -> Readiness {
        let outcome = tokio::time::timeout(
            limit,
            self.rx.wait_for(|state| *state != Readiness::Pending),
        )
        .await;

        match outcome {
            Ok(Ok(state)) => *state,
            // Sender dropped without a final state: the drain is gone
            Ok(Err(_)) => Readiness::Closed,
            Err(_) => Readiness::Pending,
        }
    }
}

/// Background stderr consumer
///
/// Started once per child process; ends on EOF or read error.
pub struct StderrDrain {
    handle: JoinHandle<u64>,
    ready: ReadySignal,
}

impl StderrDrain {
    /// Spawn the drain task over any async reader (normally `ChildStderr`)
    pub fn start<R>(stream: R, config: DrainConfig) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let initial = if config.ready_marker.is_some() {
            Readiness::Pending
        } else {
            Readiness::Ready
        };
        let (tx, rx) = watch::channel(initial);

        let handle = tokio::spawn(async move {
            let mut reader = BufReader::new(stream);
            let mut buf = Vec::with_capacity(1024);
            let mut forwarded = 0u64;

            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {
                        // Diagnostics are not guaranteed to be UTF-8
                        let line = String::from_utf8_lossy(&buf);
                        if config.is_ready_line(&line) {
                            tx.send_if_modified(|state| {
                                let changed = *state == Readiness::Pending;
                                *state = Readiness::Ready;
                                changed
                            });
                        }
                        if config.is_noise(&line) {
                            continue;
                        }
                        tracing::info!(target: STDERR_TARGET, "{}", line.trim_end());
                        forwarded += 1;
                    }
                    Err(e) => {
                        tracing::debug!("stderr drain stopped: {}", e);
                        break;
                    }
                }
            }

            tx.send_if_modified(|state| {
                let changed = *state == Readiness::Pending;
                if changed {
                    *state = Readiness::Closed;
                }
                changed
            });
            forwarded
        });

        Self {
            handle,
            ready: ReadySignal { rx },
        }
    }

    /// A handle for awaiting the readiness marker
    pub fn ready_signal(&self) -> ReadySignal {
        self.ready.clone()
    }

    /// Whether the drain task has ended (stream closed)
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the drain to end and return how many lines it forwarded
    pub async fn join(self) -> u64 {
        self.handle.await.unwrap_or(0)
    }

    /// Stop the drain without waiting for EOF
    pub fn abort(&self) {
        self.handle.abort();
    }
}
