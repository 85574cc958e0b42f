//! Fake tool providers for integration tests
//!
//! Each provider is a small bash script written into a temp directory. It
//! answers `initialize`, `tools/list` and `tools/call` on stdout and appends
//! every received line to `requests.log` next to the script.

#![allow(dead_code)]

use shopcopilot::config::ServerConfig;
use shopcopilot::mcp::SpawnStrategy;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Successful handshake reply
pub const INIT_OK: &str = r#"printf '{"jsonrpc":"2.0","id":"%s","result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"fake-dev-mcp","version":"0.0.1"}}}\n' "$id""#;

/// Handshake rejected
pub const INIT_REJECT: &str = r#"printf '{"jsonrpc":"2.0","id":"%s","error":{"message":"bad protocol version"}}\n' "$id""#;

/// Two documentation snippets
pub const CALL_DOCS: &str = r#"printf '{"jsonrpc":"2.0","id":"%s","result":{"content":[{"type":"text","text":"Use discountCodeBasicCreate"},{"type":"text","text":"See also discountCodeBxgyCreate"}]}}\n' "$id""#;

/// Echo the prompt back so callers can check attribution
pub const CALL_ECHO: &str = r#"printf '{"jsonrpc":"2.0","id":"%s","result":{"content":[{"type":"text","text":"echo: %s"}]}}\n' "$id" "$prompt""#;

/// Tool-level failure
pub const CALL_BOOM: &str = r#"printf '{"jsonrpc":"2.0","id":"%s","error":{"message":"boom"}}\n' "$id""#;

/// Never answer
pub const CALL_SILENT: &str = ":";

/// Answer after five seconds
pub const CALL_SLOW: &str = r#"sleep 5; printf '{"jsonrpc":"2.0","id":"%s","result":{"content":[]}}\n' "$id""#;

/// Die mid-call
pub const CALL_EXIT: &str = "exit 3";

/// Stray diagnostics on stdout before the real answer
pub const CALL_GARBAGE: &str = r#"echo "warming up cache..."; echo '{"jsonrpc":"2.0","method":"notifications/message","params":{}}'; printf '{"jsonrpc":"2.0","id":"%s","result":{"content":[{"type":"text","text":"after garbage"}]}}\n' "$id""#;

/// Flood stdout with non-JSON progress lines, never answer
pub const CALL_CHATTER: &str = "yes progress";

/// Send a server-to-client request before the real answer
pub const CALL_PING_FIRST: &str = r#"echo '{"jsonrpc":"2.0","id":"srv-1","method":"ping"}'; printf '{"jsonrpc":"2.0","id":"%s","result":{"content":[{"type":"text","text":"after ping"}]}}\n' "$id""#;

/// Answer with someone else's id
pub const CALL_WRONG_ID: &str = r#"printf '{"jsonrpc":"2.0","id":"not-%s","result":{}}\n' "$id""#;

/// Flood stderr well past the pipe buffer, then answer
pub const CALL_NOISY: &str = r#"for i in $(seq 1 20000); do echo "diagnostic line $i: Response text (truncated) padding padding padding" >&2; done; printf '{"jsonrpc":"2.0","id":"%s","result":{"content":[{"type":"text","text":"survived the flood"}]}}\n' "$id""#;

/// A fake provider living in its own temp directory
pub struct FakeProvider {
    pub dir: TempDir,
    pub script: PathBuf,
}

impl FakeProvider {
    /// Provider that handshakes normally and runs `call` for every tools/call
    pub fn new(call: &str) -> Self {
        Self::with_handlers(INIT_OK, call, "")
    }

    /// Provider with custom handshake and call handlers
    ///
    /// `on_initialized` runs when the `initialized` notification arrives.
    pub fn with_handlers(init: &str, call: &str, on_initialized: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("fake-dev-mcp.sh");
        let log = dir.path().join("requests.log");

        let body = format!(
            r#"#!/usr/bin/env bash
echo "Shopify Dev MCP server running on stdio" >&2
while IFS= read -r line; do
  printf '%s\n' "$line" >> "{log}"
  id=$(printf '%s' "$line" | sed -n 's/^{{"jsonrpc":"2.0","id":"\([^"]*\)".*/\1/p')
  prompt=$(printf '%s' "$line" | sed -n 's/.*"prompt":"\([^"]*\)".*/\1/p')
  case "$line" in
    *'"method":"initialize"'*)
      {init}
      ;;
    *'"method":"initialized"'*)
      :
      {on_initialized}
      ;;
    *'"method":"tools/list"'*)
      printf '{{"jsonrpc":"2.0","id":"%s","result":{{"tools":[{{"name":"search_dev_docs","description":"Search Shopify docs"}},{{"name":"introspect_admin_schema","description":"Search the Admin schema"}}]}}}}\n' "$id"
      ;;
    *'"method":"tools/call"'*)
      {call}
      ;;
  esac
done
"#,
            log = log.display(),
            init = init,
            call = call,
            on_initialized = on_initialized,
        );
        fs::write(&script, body).expect("write fake provider");

        Self { dir, script }
    }

    /// Strategy that runs this provider through bash
    pub fn strategy(&self, label: &str) -> SpawnStrategy {
        let script = self.script.to_string_lossy().to_string();
        SpawnStrategy::new(label, "bash", &[script.as_str()])
    }

    /// Server config launching only this provider
    pub fn server_config(&self, request_timeout_secs: u64) -> ServerConfig {
        ServerConfig {
            request_timeout_secs,
            handshake_timeout_secs: 10,
            strategies: vec![self.strategy("local")],
            ..ServerConfig::default()
        }
    }

    /// Every line the provider received so far
    pub fn received(&self) -> Vec<String> {
        fs::read_to_string(self.log_path())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Received lines that were tool calls
    pub fn tool_calls(&self) -> usize {
        self.received()
            .iter()
            .filter(|l| l.contains(r#""method":"tools/call""#))
            .count()
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.path().join("requests.log")
    }

    /// Write a config file for the CLI pointing at this provider
    pub fn write_config(&self, request_timeout_secs: u64) -> PathBuf {
        let path = self.dir.path().join("config.toml");
        let contents = format!(
            r#"[logging]
level = "warn"

[server]
request_timeout_secs = {timeout}

[[server.strategies]]
label = "local"
command = "bash"
args = ["{script}"]
"#,
            timeout = request_timeout_secs,
            script = self.script.display(),
        );
        fs::write(&path, contents).expect("write config");
        path
    }
}

/// A path that is guaranteed not to exist
pub fn missing_executable(dir: &Path) -> String {
    dir.join("definitely-not-installed").to_string_lossy().to_string()
}
