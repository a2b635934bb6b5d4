//! blog-service
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id ─▶ access log ─▶ crash guard ─▶ rate limit
//!                                                                   │
//!                                                                   ▼
//!     Client Response                                            deadline
//!     ◀──────────────  error envelope / handler response ◀── auth (/api/v1)
//!                                                                   │
//!                                                                   ▼
//!                                                                handler
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use blog_service::config::{load_config, AppConfig};
use blog_service::http::{HttpServer, Pipeline};
use blog_service::lifecycle::{shutdown_signal, Shutdown};
use blog_service::observability::{alert, logging, metrics};
use blog_service::security::credentials::StaticCredentialStore;

#[derive(Parser)]
#[command(name = "blog-service")]
#[command(about = "Admission front for the blog content service", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability);
    tracing::info!("blog-service v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_ms = config.timeouts.request_ms,
        rate_limit_rules = config.rate_limit.rules.len(),
        credentials = config.auth.credentials.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let credentials = Arc::new(StaticCredentialStore::from_config(&config.auth.credentials));
    let alerts = alert::transport_from_config(&config.alert)?;
    let pipeline = Pipeline::from_config(&config, credentials, alerts);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    let drain_timeout = config.timeouts.shutdown();
    let server = HttpServer::new(config, pipeline);
    let server_task = tokio::spawn(server.run(listener, shutdown.signalled()));

    shutdown_signal().await;
    shutdown.trigger();
    shutdown.drain(server_task, drain_timeout).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
