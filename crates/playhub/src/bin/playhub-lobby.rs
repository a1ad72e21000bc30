//! The lobby service.

use std::sync::Arc;

use playhub::{LobbyService, PlayhubConfig, PlayhubError, connection, telemetry};
use playhub_catalog::FsArtifactStore;
use playhub_store::RemoteStore;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "lobby service failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), PlayhubError> {
    let config = PlayhubConfig::load()?;
    let store = RemoteStore::connect(
        &config.lobby.store_addr,
        config.store_client.request_timeout(),
    )
    .await?;
    let artifacts = FsArtifactStore::new(config.lobby.artifact_dir.clone());
    let lobby = Arc::new(LobbyService::new(
        Arc::new(store),
        Arc::new(artifacts),
        config.session.to_session_config(),
    ));
    lobby.reset_rooms().await?;

    tokio::select! {
        result = connection::listen(lobby, config.lobby.transport, &config.lobby.bind) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutdown requested"),
    }
    Ok(())
}
