//! offgate server entry point.
//!
//! Boots the offline cache gateway and exposes its install and fetch
//! operations as MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

use offgate_client::{FetchConfig, Gateway, GatewaySettings, HttpTransport};
use offgate_core::{AppConfig, CacheDb};

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    let settings = GatewaySettings::from_config(&config)?;

    tracing::info!(
        db_path = %config.db_path.display(),
        origin = %settings.origin,
        generation = %settings.generation,
        "Starting offgate server on stdio transport"
    );

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache store at {}", config.db_path.display()))?;
    let transport = HttpTransport::new(FetchConfig::from(&config))?;
    let gateway = Gateway::open(db, transport, settings).await?;

    let handler = handler::OffgateServer::new(gateway);
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;

    Ok(())
}
