//! Logging setup
//!
//! Installs a `tracing-subscriber` fmt subscriber with an `EnvFilter`.
//! `RUST_LOG` wins over the configured level. Logs go to stderr so stdout
//! stays free for command output.

use anyhow::Result;
use std::str::FromStr;
use tracing::{Dispatch, Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => anyhow::bail!("Unknown log format: {}", other),
        }
    }
}

/// Filter with `level` as default directive, overridable through `RUST_LOG`
pub fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Build a subscriber writing to `writer`
pub fn make_subscriber<W>(
    filter: EnvFilter,
    format: LogFormat,
    writer: W,
    ansi: bool,
) -> Box<dyn Subscriber + Send + Sync>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(true);

    match format {
        LogFormat::Compact => Box::new(builder.compact().with_ansi(ansi).finish()),
        LogFormat::Pretty => Box::new(builder.pretty().with_ansi(ansi).finish()),
        LogFormat::Json => Box::new(builder.json().finish()),
    }
}

/// Install the global subscriber
///
/// # Errors
///
/// Fails if a global subscriber was already set.
pub fn init_logging(level: Level, format: LogFormat) -> Result<()> {
    let subscriber = make_subscriber(env_filter(level), format, std::io::stderr, true);
    tracing::dispatcher::set_global_default(Dispatch::new(subscriber))
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))
}
