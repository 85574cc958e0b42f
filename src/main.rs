// shopcopilot - Main Entry Point
//
// Command-line front end for the Shopify dev-docs tool provider:
// - spawns and supervises the provider process
// - runs one tool call per invocation
// - prints the result on stdout, logs on stderr

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use shopcopilot::config::Config;
use shopcopilot::logging::{init_logging, LogFormat};
use shopcopilot::DevDocsClient;
use std::path::PathBuf;
use tracing::{info, Level};

/// shopcopilot: query Shopify developer docs from the terminal
#[derive(Parser, Debug)]
#[command(name = "shopcopilot")]
#[command(version)]
#[command(about = "Query the Shopify dev-docs tool provider", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a config file (default: ~/.config/shopcopilot/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Per-call timeout in seconds (overrides the config file)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search the Shopify developer documentation
    Docs {
        /// Natural-language question or keywords
        prompt: String,
    },
    /// Search the Admin GraphQL schema
    Schema {
        /// Search terms (e.g. "product createdAt field")
        prompt: String,
    },
    /// Call any tool with raw JSON arguments
    Call {
        /// Tool name
        tool: String,

        /// Arguments as a JSON object
        #[arg(long, default_value = "{}")]
        input: String,
    },
    /// List the tools the provider offers
    ListTools,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(secs) = args.timeout {
        config.server.request_timeout_secs = secs;
        config.validate().context("Invalid --timeout")?;
    }

    let level = if args.verbose {
        Level::DEBUG
    } else {
        config.log_level()?
    };
    let format: LogFormat = config.logging.format.parse()?;
    init_logging(level, format)?;

    info!("shopcopilot v{} starting...", env!("CARGO_PKG_VERSION"));

    let client = DevDocsClient::connect(&config.server)
        .await
        .context("Failed to start the dev-docs tool provider")?;

    let outcome = run(&client, args.command).await;
    client.shutdown().await;
    outcome
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file {:?} does not exist", path);
            }
            Config::load_from_path(path)
        }
        None => Config::load(),
    }
}

async fn run(client: &DevDocsClient, command: Commands) -> Result<()> {
    match command {
        Commands::Docs { prompt } => {
            let text = client
                .search_dev_docs(&prompt)
                .await
                .context("Documentation search failed")?;
            println!("{}", text);
        }
        Commands::Schema { prompt } => {
            let text = client
                .introspect_admin_schema(&prompt)
                .await
                .context("Schema introspection failed")?;
            println!("{}", text);
        }
        Commands::Call { tool, input } => {
            let arguments: Value =
                serde_json::from_str(&input).context("--input is not valid JSON")?;
            if !arguments.is_object() {
                anyhow::bail!("--input must be a JSON object");
            }
            let result = client
                .call_tool(&tool, arguments)
                .await
                .with_context(|| format!("Tool '{}' failed", tool))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::ListTools => {
            let tools = client.list_tools().await.context("Failed to list tools")?;
            for tool in &tools {
                if tool.description.is_empty() {
                    println!("{}", tool.name);
                } else {
                    println!("{}: {}", tool.name, tool.description);
                }
            }
        }
    }
    Ok(())
}
