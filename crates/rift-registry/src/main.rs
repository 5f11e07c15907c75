//! Standalone registry server.
//!
//! Loads expectations from a config file, serves them until Ctrl-C, then
//! reports every response that was never used.
//!
//! Usage:
//!   rift-registry --config registry.yaml [--port 8080] [--host 0.0.0.0]

use anyhow::Context;
use clap::Parser;
use rift_registry::{MockServer, RegistryConfig, TracingSink};
use std::net::{IpAddr, SocketAddr};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "rift-registry")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Expectations file (YAML or JSON)
    #[arg(short, long, env = "RIFT_REGISTRY_CONFIG")]
    config: String,

    /// Port to listen on, overrides the config file
    #[arg(short, long, env = "RIFT_REGISTRY_PORT")]
    port: Option<u16>,

    /// Address to bind, overrides the config file
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(Args::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the run finished without any reported failure.
async fn run(args: Args) -> anyhow::Result<bool> {
    let config = RegistryConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;

    let host = args.host.unwrap_or_else(|| config.listen.host.clone());
    let port = args.port.unwrap_or(config.listen.port);
    let ip: IpAddr = host
        .parse()
        .with_context(|| format!("Invalid listen host '{}'", host))?;

    let sink = Arc::new(TracingSink::new());
    let registry = config.build_registry(sink.clone())?;
    info!(
        "Loaded {} expectations from {}",
        registry.len(),
        args.config
    );

    let server = MockServer::start_on(registry.clone(), SocketAddr::new(ip, port)).await?;
    info!("Serving on {}", server.uri());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    server.shutdown().await;

    let unused = registry.check_all_consumed();
    if unused > 0 {
        error!("{} expectations still hold unused responses", unused);
    }
    Ok(!sink.has_failed())
}
