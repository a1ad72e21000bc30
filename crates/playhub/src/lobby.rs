//! The lobby service: player accounts, the game list, rooms and chat.

use std::collections::HashMap;
use std::sync::Arc;

use playhub_catalog::{ArtifactStore, CatalogManager};
use playhub_protocol::{
    AccountKind, ClientRequest, ErrorCode, Outcome, RoomId, RoomStatus, RoomView, ServerMessage,
    UserStatus, UserView, unix_millis,
};
use playhub_room::{JoinOutcome, LeaveOutcome, RoomCoordinator, RoomError};
use playhub_session::{Session, SessionConfig, SessionRegistry};
use playhub_store::DataStore;
use serde_json::json;
use tokio::sync::Mutex;

use crate::connection::Service;
use crate::{LobbyBroadcaster, PlayhubError};

/// Longest accepted chat line, in characters.
pub const MAX_CHAT_LEN: usize = 500;

pub struct LobbyService<S: DataStore, A: ArtifactStore> {
    registry: SessionRegistry<S>,
    catalog: Arc<CatalogManager<S, A>>,
    rooms: RoomCoordinator<S, A>,
    broadcaster: LobbyBroadcaster,
    /// Serializes snapshot-and-publish so a slow refresh never publishes
    /// over a newer one.
    refresh_lock: Mutex<()>,
}

impl<S: DataStore, A: ArtifactStore> LobbyService<S, A> {
    pub fn new(store: Arc<S>, artifacts: Arc<A>, session: SessionConfig) -> Self {
        let catalog = Arc::new(CatalogManager::new(Arc::clone(&store), artifacts));
        Self {
            registry: SessionRegistry::new(Arc::clone(&store), session),
            rooms: RoomCoordinator::new(store, Arc::clone(&catalog)),
            catalog,
            broadcaster: LobbyBroadcaster::new(),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Drops rooms left over from a previous run. Call once before
    /// accepting connections.
    pub async fn reset_rooms(&self) -> Result<usize, PlayhubError> {
        Ok(self.rooms.reset().await?)
    }

    pub fn rooms(&self) -> &RoomCoordinator<S, A> {
        &self.rooms
    }

    pub fn catalog(&self) -> &CatalogManager<S, A> {
        &self.catalog
    }

    pub fn broadcaster(&self) -> &LobbyBroadcaster {
        &self.broadcaster
    }

    /// Online players with what they are doing.
    fn user_views(&self, rooms: &[RoomView]) -> Vec<UserView> {
        let status_of: HashMap<&RoomId, RoomStatus> =
            rooms.iter().map(|r| (&r.id, r.status)).collect();
        self.registry
            .online()
            .into_iter()
            .filter(|s| s.kind == AccountKind::Player)
            .map(|s| {
                let room = self
                    .rooms
                    .room_of(&s.account_id)
                    .and_then(|id| status_of.get(&id).map(|status| (id, *status)));
                let (status, room_id) = match room {
                    Some((id, RoomStatus::InProgress)) => (UserStatus::Playing, Some(id)),
                    Some((id, _)) => (UserStatus::InRoom, Some(id)),
                    None => (UserStatus::Idle, None),
                };
                UserView {
                    id: s.account_id,
                    name: s.name,
                    status,
                    room_id,
                }
            })
            .collect()
    }

    /// Publishes the current lobby state as a delta.
    pub async fn refresh(&self) {
        let _serial = self.refresh_lock.lock().await;
        let rooms = match self.rooms.list().await {
            Ok(rooms) => rooms,
            Err(e) => {
                tracing::warn!(error = %e, "lobby refresh skipped");
                return;
            }
        };
        let users = self.user_views(&rooms);
        self.broadcaster.publish(&self.registry, rooms, users).await;
    }

    fn current_room(&self, session: &Session) -> Result<RoomId, PlayhubError> {
        self.rooms
            .room_of(&session.account_id)
            .ok_or_else(|| RoomError::NotInRoom.into())
    }

    fn announce_leave(&self, session: &Session, outcome: &LeaveOutcome) {
        let Some(room) = &outcome.room else {
            return;
        };
        self.broadcaster.notify_members(
            &self.registry,
            &room.members,
            &ServerMessage::UserLeft {
                room_id: outcome.room_id.clone(),
                account_id: session.account_id.clone(),
                user_name: session.name.clone(),
            },
        );
        if let Some(host_id) = &outcome.new_host {
            self.broadcaster.notify_members(
                &self.registry,
                &room.members,
                &ServerMessage::HostChanged {
                    room_id: outcome.room_id.clone(),
                    host_id: host_id.clone(),
                },
            );
        }
    }

    async fn join(
        &self,
        session: &Session,
        room_id: RoomId,
        client_version: Option<String>,
    ) -> Result<Outcome, PlayhubError> {
        let joined = self
            .rooms
            .join(&session.account_id, &room_id, client_version.as_deref())
            .await?;
        match joined {
            JoinOutcome::Joined(room) => {
                let others: Vec<_> = room
                    .members
                    .iter()
                    .filter(|m| **m != session.account_id)
                    .cloned()
                    .collect();
                self.broadcaster.notify_members(
                    &self.registry,
                    &others,
                    &ServerMessage::UserJoined {
                        room_id: room.id.clone(),
                        account_id: session.account_id.clone(),
                        user_name: session.name.clone(),
                    },
                );
                self.refresh().await;
                Ok(Outcome::with_data(json!({ "room": room })))
            }
            JoinOutcome::VersionMismatch {
                game_id,
                required_version,
            } => Ok(Outcome::VersionMismatch {
                game_id,
                required_version,
            }),
        }
    }

    async fn chat(&self, session: &Session, message: String) -> Result<Outcome, PlayhubError> {
        let message = message.trim();
        if message.is_empty() || message.chars().count() > MAX_CHAT_LEN {
            return Ok(Outcome::error(
                ErrorCode::BadRequest,
                format!("chat messages must be 1 to {MAX_CHAT_LEN} characters"),
            ));
        }
        let room = self.rooms.get(&self.current_room(session)?).await?;
        self.broadcaster.notify_members(
            &self.registry,
            &room.members,
            &ServerMessage::RoomChat {
                room_id: room.id.clone(),
                sender: session.name.clone(),
                message: message.to_string(),
                timestamp: unix_millis(),
            },
        );
        Ok(Outcome::ok())
    }
}

impl<S: DataStore, A: ArtifactStore> Service for LobbyService<S, A> {
    type Store = S;

    fn kind(&self) -> AccountKind {
        AccountKind::Player
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
            ClientRequest::ListRooms => {
                let rooms = self.rooms.list().await?;
                Ok(Outcome::with_data(json!({ "rooms": rooms })))
            }
            ClientRequest::ListUsers => {
                let rooms = self.rooms.list().await?;
                let users = self.user_views(&rooms);
                Ok(Outcome::with_data(json!({ "users": users })))
            }
            ClientRequest::ListGames => {
                let games = self.catalog.list_active().await?;
                Ok(Outcome::with_data(json!({ "games": games })))
            }
            ClientRequest::GetGameDetails { game_id } => {
                let game = self.catalog.details(&game_id).await?;
                Ok(Outcome::with_data(json!({
                    "game": game,
                    "average_rating": game.average_rating(),
                })))
            }
            ClientRequest::DownloadGame { game_id, version } => {
                let download = self.catalog.download(&game_id, version.as_deref()).await?;
                tracing::info!(account_id = %me, %game_id, version = %download.version, "game downloaded");
                Ok(Outcome::with_data(json!({
                    "game_id": download.game_id,
                    "version": download.version,
                    "artifact": download.bytes,
                })))
            }
            ClientRequest::CreateRoom { game_id, version } => {
                let room = self.rooms.create(me, &game_id, version.as_deref()).await?;
                self.refresh().await;
                Ok(Outcome::with_data(json!({ "room": room })))
            }
            ClientRequest::JoinRoom {
                room_id,
                client_game_version,
            } => self.join(session, room_id, client_game_version).await,
            ClientRequest::LeaveRoom => {
                let outcome = self
                    .rooms
                    .leave_current(me)
                    .await?
                    .ok_or(RoomError::NotInRoom)?;
                self.announce_leave(session, &outcome);
                self.refresh().await;
                Ok(Outcome::with_data(json!({ "room_id": outcome.room_id })))
            }
            ClientRequest::CloseRoom => {
                let room_id = self.current_room(session)?;
                let room = self.rooms.close(me, &room_id).await?;
                let others: Vec<_> = room.members.iter().filter(|m| *m != me).cloned().collect();
                self.broadcaster.notify_members(
                    &self.registry,
                    &others,
                    &ServerMessage::RoomClosed {
                        room_id: room_id.clone(),
                    },
                );
                self.refresh().await;
                Ok(Outcome::with_data(json!({ "room_id": room_id })))
            }
            ClientRequest::StartGame => {
                let room_id = self.current_room(session)?;
                let room = self.rooms.start(me, &room_id).await?;
                self.broadcaster.notify_members(
                    &self.registry,
                    &room.members,
                    &ServerMessage::GameStarted {
                        room_id: room.id.clone(),
                        game_id: room.game_id.clone(),
                        game_version: room.game_version.clone(),
                    },
                );
                self.refresh().await;
                Ok(Outcome::with_data(json!({ "room": room })))
            }
            ClientRequest::RoomChat { message } => self.chat(session, message).await,
            ClientRequest::SubmitReview {
                game_id,
                score,
                comment,
            } => {
                self.catalog.submit_review(me, &game_id, score, &comment).await?;
                Ok(Outcome::ok())
            }
            ClientRequest::UploadGame { .. }
            | ClientRequest::UpdateGame { .. }
            | ClientRequest::RemoveGame { .. }
            | ClientRequest::ListMyGames => Ok(Outcome::error(
                ErrorCode::PermissionDenied,
                "developer actions are served by the developer service",
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
        tracing::info!(account_id = %session.account_id, name = %session.name, "player online");
        self.broadcaster.welcome(&self.registry, &session.account_id).await;
        self.refresh().await;
    }

    async fn logged_out(&self, session: &Session) {
        match self.rooms.leave_current(&session.account_id).await {
            Ok(Some(outcome)) => self.announce_leave(session, &outcome),
            Ok(None) => {}
            Err(e) => {
                tracing::error!(account_id = %session.account_id, error = %e, "room cleanup failed");
            }
        }
        tracing::info!(account_id = %session.account_id, "player offline");
        self.refresh().await;
    }
}
