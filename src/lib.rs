//! shopcopilot Library
//!
//! A client for the Shopify dev-docs tool provider, which runs as a local
//! child process speaking line-delimited JSON-RPC over stdio. The library
//! supervises that process, drains its diagnostics into the log, and exposes
//! correlated tool calls with bounded timeouts.

pub mod config;
pub mod logging;
pub mod mcp;
pub mod shopify;

pub use shopify::DevDocsClient;
