//! The developer service: developer accounts and catalog management.

use std::sync::Arc;

use playhub_catalog::{ArtifactStore, CatalogError, CatalogManager};
use playhub_protocol::{AccountKind, ClientRequest, ErrorCode, GameConfig, Outcome};
use playhub_session::{Session, SessionConfig, SessionRegistry};
use playhub_store::DataStore;
use serde_json::json;

use crate::PlayhubError;
use crate::connection::Service;

pub struct DeveloperService<S: DataStore, A: ArtifactStore> {
    registry: SessionRegistry<S>,
    catalog: CatalogManager<S, A>,
}

impl<S: DataStore, A: ArtifactStore> DeveloperService<S, A> {
    pub fn new(store: Arc<S>, artifacts: Arc<A>, session: SessionConfig) -> Self {
        Self {
            registry: SessionRegistry::new(Arc::clone(&store), session),
            catalog: CatalogManager::new(store, artifacts),
        }
    }

    pub fn catalog(&self) -> &CatalogManager<S, A> {
        &self.catalog
    }

    /// First publish, or a new version when the config echoes a `game_id`.
    async fn upload(
        &self,
        session: &Session,
        config: GameConfig,
        artifact: Vec<u8>,
    ) -> Result<Outcome, PlayhubError> {
        let me = &session.account_id;
        let (game_id, version) = match &config.game_id {
            Some(game_id) => {
                let version = config
                    .version
                    .clone()
                    .ok_or_else(|| CatalogError::InvalidConfig("version is required".into()))?;
                self.catalog
                    .update(me, game_id, &version, "", &artifact)
                    .await?;
                (game_id.clone(), version)
            }
            None => {
                let game_id = self.catalog.publish(me, &config, &artifact).await?;
                (game_id, config.version.clone().unwrap_or_default())
            }
        };
        Ok(Outcome::with_data(json!({
            "game_id": game_id,
            "version": version,
        })))
    }
}

impl<S: DataStore, A: ArtifactStore> Service for DeveloperService<S, A> {
    type Store = S;

    fn kind(&self) -> AccountKind {
        AccountKind::Developer
    }

    fn registry(&self) -> &SessionRegistry<S> {
        &self.registry
    }

    async fn handle(
        &self,
        session: &Session,
        request: ClientRequest,
    ) -> Result<Outcome, PlayhubError> {
        let me = &session.account_id;
        match request {
            ClientRequest::UploadGame {
                game_config,
                artifact,
            } => self.upload(session, game_config, artifact).await,
            ClientRequest::UpdateGame {
                game_id,
                version,
                release_note,
                artifact,
            } => {
                self.catalog
                    .update(me, &game_id, &version, &release_note, &artifact)
                    .await?;
                Ok(Outcome::with_data(json!({
                    "game_id": game_id,
                    "version": version,
                })))
            }
            ClientRequest::RemoveGame { game_id } => {
                self.catalog.remove(me, &game_id).await?;
                Ok(Outcome::with_data(json!({ "game_id": game_id })))
            }
            ClientRequest::ListMyGames => {
                let games = self.catalog.list_by_developer(me).await?;
                Ok(Outcome::with_data(json!({ "games": games })))
            }
            ClientRequest::GetGameDetails { game_id } => {
                let game = self.catalog.details(&game_id).await?;
                Ok(Outcome::with_data(json!({
                    "game": game,
                    "average_rating": game.average_rating(),
                })))
            }
            ClientRequest::ListRooms
            | ClientRequest::ListUsers
            | ClientRequest::ListGames
            | ClientRequest::DownloadGame { .. }
            | ClientRequest::CreateRoom { .. }
            | ClientRequest::JoinRoom { .. }
            | ClientRequest::LeaveRoom
            | ClientRequest::CloseRoom
            | ClientRequest::StartGame
            | ClientRequest::RoomChat { .. }
            | ClientRequest::SubmitReview { .. } => Ok(Outcome::error(
                ErrorCode::PermissionDenied,
                "player actions are served by the lobby",
            )),
            ClientRequest::Register { .. }
            | ClientRequest::Login { .. }
            | ClientRequest::Logout
            | ClientRequest::Unknown => Ok(Outcome::error(
                ErrorCode::BadRequest,
                "account actions are handled by the connection",
            )),
        }
    }

    async fn logged_in(&self, session: &Session) {
        tracing::info!(account_id = %session.account_id, name = %session.name, "developer online");
    }

    async fn logged_out(&self, session: &Session) {
        tracing::info!(account_id = %session.account_id, "developer offline");
    }
}
