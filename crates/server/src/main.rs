//! pagewalk-store entry point.
//!
//! Hosts the gallery store on a JSON-lines stdio transport: one request per
//! stdin line, one response per stdout line. Logging goes to stderr to keep
//! stdout for protocol frames.

use anyhow::Result;
use pagewalk_core::{AppConfig, GalleryStore, SharedConfig, StoreService};
use tracing_subscriber::EnvFilter;

mod error;
mod schema;
mod transport;

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::args().skip(1).any(|arg| arg == "--schema") {
        println!("{}", serde_json::to_string_pretty(&schema::protocol_schema())?);
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(db_path = %config.db_path.display(), "starting pagewalk-store on stdio transport");

    let store = GalleryStore::open(SharedConfig::new(config)).await?;
    let (client, service) = StoreService::spawn(store);

    let served = transport::serve(tokio::io::stdin(), tokio::io::stdout(), &client).await;
    match &served {
        Ok(stats) => tracing::info!(handled = stats.handled, failed = stats.failed, "stdin closed"),
        Err(e) => tracing::error!(error = %e, "stdio transport failed"),
    }

    drop(client);
    service.await?;

    served?;
    Ok(())
}
