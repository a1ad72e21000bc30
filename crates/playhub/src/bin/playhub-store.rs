//! The data store service.

use std::sync::Arc;

use playhub::{PlayhubConfig, PlayhubError, telemetry};
use playhub_store::{MemoryStore, StoreServer};
use playhub_transport::TcpTransport;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "store service failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), PlayhubError> {
    let config = PlayhubConfig::load()?;
    let store = match &config.store.data_file {
        Some(path) => MemoryStore::open(path).await?,
        None => {
            tracing::warn!("no data_file configured, data will not survive a restart");
            MemoryStore::new()
        }
    };
    let transport = TcpTransport::bind(&config.store.bind).await?;

    tokio::select! {
        result = StoreServer::new(Arc::new(store)).run(transport) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutdown requested"),
    }
    Ok(())
}
