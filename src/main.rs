//! pack-server
//!
//! Serves `POST /api/pack` and `GET /health` behind the request tracer.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────▶ tracer (request id, started record)
//!             ──▶ timeout ──▶ routes (/health, /api/pack ──▶ Packer)
//!     ◀────── tracer (terminal record, x-request-id)
//!
//!     StructuredLogger ──▶ ConsoleSink ──▶ tracing subscriber
//!                     └──▶ CloudSink (managed production only) ──▶ batch writer
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use pack_server::config::{load_config, ServerConfig};
use pack_server::http::HttpServer;
use pack_server::lifecycle::{announce, min_log_level, shutdown_signal, Shutdown};
use pack_server::observability::logging::init_tracing;
use pack_server::observability::{metrics, Environment, StructuredLogger};
use pack_server::packing::{CommandPacker, Packer};

const LOG_DRAIN_DEADLINE: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "pack-server")]
#[command(about = "Repository packing API with structured request logging", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port, overriding the configured bind address
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    let mut bind_address: SocketAddr = config.listener.bind_address.parse()?;
    if let Some(port) = cli.port {
        bind_address.set_port(port);
    }

    let env = Environment::detect(&config.logging.environment);
    let level = min_log_level(&config.observability, &env);
    init_tracing(level, env.is_production())?;

    tracing::info!("pack-server v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        max_request_bytes = config.limits.max_request_bytes,
        production = env.is_production(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let logger = StructuredLogger::from_environment(&env, &config.logging, level);
    tracing::info!(
        sinks = ?logger.sink_names(),
        min_level = %logger.min_level(),
        "Structured logger ready"
    );

    let listener = TcpListener::bind(bind_address).await?;
    announce(&logger, listener.local_addr()?);

    let packer: Arc<dyn Packer> = Arc::new(CommandPacker::new(config.packer.clone()));

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    let server = HttpServer::new(config, logger.clone(), packer);
    server.run(listener, shutdown_rx).await?;

    logger.close(LOG_DRAIN_DEADLINE).await;
    tracing::info!("Shutdown complete");
    Ok(())
}
