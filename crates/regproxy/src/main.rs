//! Regproxy - fan-out HTTP proxy with a runtime upstream registry

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::timeout::RequestBodyTimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::{Config, LoggingConfig, MEMORY_STORAGE};
use regproxy_api::{AppState, create_router};
use regproxy_core::{Dispatcher, Registry};
use regproxy_proxy::HttpTransport;
use regproxy_storage::{FileStore, MemoryStore, RegistryStore};

/// Regproxy - forwards every request to all registered upstreams
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/regproxy.toml", env = "REGPROXY_CONFIG")]
    config: String,

    /// Bind address
    #[arg(long, env = "REGPROXY_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "REGPROXY_PORT")]
    port: Option<u16>,

    /// Registry file location, or "memory" for an in-memory registry
    #[arg(long, env = "REGPROXY_STORAGE_LOCATION")]
    storage_location: Option<String>,

    /// Prometheus exporter listen address
    #[arg(long, env = "REGPROXY_METRICS_ADDRESS")]
    metrics_address: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    if let Some(location) = args.storage_location {
        config.storage.location = location;
    }
    if let Some(address) = args.metrics_address {
        config.metrics.listen_address = Some(address);
    }

    init_logging(&config.logging);

    info!("Starting regproxy v{}", env!("CARGO_PKG_VERSION"));

    if let Some(address) = &config.metrics.listen_address {
        let addr: SocketAddr = address
            .parse()
            .with_context(|| format!("Invalid metrics address: {}", address))?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Serving metrics on {}", addr);
    }

    let store = open_store(&config.storage.location).await?;
    let registry = Arc::new(Registry::new(store));
    info!("Registry storage: {}", registry.describe());

    let transport = Arc::new(HttpTransport::new(config.transport())?);
    let dispatcher = Arc::new(Dispatcher::new(registry, transport));

    let state = AppState::new(dispatcher, config.server.write_timeout())
        .with_max_body_size(config.server.max_body_size);

    let app = create_router(state)
        .layer(RequestBodyTimeoutLayer::new(config.server.read_timeout()))
        .layer(TraceLayer::new_for_http());

    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port).parse()?;

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Open the registry store named by `location`
async fn open_store(location: &str) -> Result<Arc<dyn RegistryStore>> {
    if location == MEMORY_STORAGE {
        return Ok(Arc::new(MemoryStore::new()));
    }

    let store = FileStore::open(location)
        .await
        .with_context(|| format!("Failed to load registry from {}", location))?;
    Ok(Arc::new(store))
}

/// Initialize logging
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let subscriber = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber.with(fmt::layer()).init();
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!("Failed to install CTRL+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
