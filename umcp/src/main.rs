//! `umcp` binary: load catalogs and serve them over stdio.

#![warn(missing_docs, clippy::pedantic)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;
use umcp::config::{generate_client_config, load_catalog};
use umcp::kernel::{Executor, Protocol, Server, ToolHandler};
use umcp::primitives::Catalog;
use umcp::telemetry::Tracer;
use umcp::tools::ToolRegistry;

#[derive(Debug, Parser)]
#[command(
    name = "umcp",
    version = concat!("version ", env!("CARGO_PKG_VERSION")),
    about = "Serve command-line tools to MCP clients"
)]
struct Cli {
    /// Catalog file to load; repeat to serve several catalogs.
    #[arg(long = "config", value_name = "PATH", required = true)]
    configs: Vec<PathBuf>,

    /// Working directory for catalogs that do not set one.
    #[arg(long, value_name = "DIR")]
    working_dir: Option<PathBuf>,

    /// Timeout in seconds for catalogs that do not set one.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Log level: debug, info, warn, or error.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Load and validate the catalogs, then exit.
    #[arg(long)]
    validate: bool,

    /// Print an MCP client configuration for the catalogs, then exit.
    #[arg(long)]
    generate_claude_config: bool,

    /// Initialize everything without serving, then exit.
    #[arg(long)]
    test: bool,

    /// Record protocol and process events in memory.
    #[arg(long)]
    debug: bool,

    /// Record protocol and process events to this file.
    #[arg(long, value_name = "FILE")]
    debug_trace: Option<PathBuf>,

    /// Replay a recorded trace file.
    #[arg(long, value_name = "FILE")]
    replay_trace: Option<PathBuf>,
}

impl Cli {
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level(&self.log_level)))
    }

    async fn tracer(&self) -> Result<Tracer> {
        if let Some(path) = &self.replay_trace {
            return Tracer::replay(path)
                .await
                .with_context(|| format!("failed to load trace {}", path.display()));
        }
        if self.debug || self.debug_trace.is_some() {
            return Tracer::recording(self.debug_trace.clone())
                .await
                .context("failed to open debug trace");
        }
        Ok(Tracer::disabled())
    }
}

fn level(name: &str) -> &'static str {
    match name.to_ascii_lowercase().as_str() {
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => "info",
    }
}

fn load_catalogs(cli: &Cli) -> Result<Vec<(PathBuf, Catalog)>> {
    cli.configs
        .iter()
        .map(|path| {
            let path = std::path::absolute(path)
                .with_context(|| format!("failed to resolve {}", path.display()))?;
            let mut catalog = load_catalog(&path)
                .with_context(|| format!("failed to load configuration {}", path.display()))?;
            let settings = catalog.settings_mut();
            if let Some(dir) = &cli.working_dir {
                settings.fill_working_dir(dir.clone());
            }
            if let Some(secs) = cli.timeout {
                settings.fill_timeout(Duration::from_secs(secs));
            }
            info!(config = %path.display(), catalog = %catalog.name(), "loaded configuration");
            Ok((path, catalog))
        })
        .collect()
}

fn build_registry(catalogs: Vec<(PathBuf, Catalog)>) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    for (path, catalog) in catalogs {
        registry
            .register_catalog(catalog)
            .with_context(|| format!("failed to register tools from {}", path.display()))?;
    }
    Ok(registry)
}

fn print_client_config(catalogs: &[(PathBuf, Catalog)]) -> Result<()> {
    let config = generate_client_config(
        catalogs
            .iter()
            .map(|(path, catalog)| (catalog, path.as_path())),
    );
    let text = serde_json::to_string_pretty(&config).context("failed to encode client config")?;
    println!("{text}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(cli.filter())
        .with_writer(std::io::stderr)
        .init();

    let catalogs = load_catalogs(&cli)?;

    if cli.validate {
        println!("All configurations are valid");
        return Ok(());
    }
    if cli.generate_claude_config {
        return print_client_config(&catalogs);
    }

    let registry = Arc::new(build_registry(catalogs)?);
    info!(tools = registry.len(), "registered tools");

    let tracer = Arc::new(cli.tracer().await?);
    let handler = ToolHandler::new(registry, Executor::new(Arc::clone(&tracer)));
    let mut server = Server::new(handler, tracer);

    if cli.test {
        info!("running in test mode");
        return Ok(());
    }

    let protocol = Protocol::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout());
    server.run(protocol).await.context("server failed")
}
