//! The developer service.

use std::sync::Arc;

use playhub::{DeveloperService, PlayhubConfig, PlayhubError, connection, telemetry};
use playhub_catalog::FsArtifactStore;
use playhub_store::RemoteStore;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "developer service failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), PlayhubError> {
    let config = PlayhubConfig::load()?;
    let store = RemoteStore::connect(
        &config.developer.store_addr,
        config.store_client.request_timeout(),
    )
    .await?;
    let artifacts = FsArtifactStore::new(config.developer.artifact_dir.clone());
    let developer = Arc::new(DeveloperService::new(
        Arc::new(store),
        Arc::new(artifacts),
        config.session.to_session_config(),
    ));

    tokio::select! {
        result = connection::listen(developer, config.developer.transport, &config.developer.bind) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutdown requested"),
    }
    Ok(())
}
