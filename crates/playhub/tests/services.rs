//! Service-level tests: requests go through `dispatch` exactly as the
//! connection loop routes them, with channel-backed session handles in
//! place of sockets.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use playhub::prelude::*;
use playhub_protocol::RoomView;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;

// =========================================================================
// Harness
// =========================================================================

type Lobby = LobbyService<MemoryStore, FsArtifactStore>;
type Developer = DeveloperService<MemoryStore, FsArtifactStore>;

struct Platform {
    lobby: Lobby,
    developer: Developer,
    artifact_dir: PathBuf,
}

impl Drop for Platform {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.artifact_dir);
    }
}

fn platform() -> Platform {
    let store = Arc::new(MemoryStore::new());
    let artifact_dir =
        std::env::temp_dir().join(format!("playhub-services-{}", uuid::Uuid::new_v4()));
    let artifacts = Arc::new(FsArtifactStore::new(artifact_dir.clone()));
    Platform {
        lobby: LobbyService::new(
            Arc::clone(&store),
            Arc::clone(&artifacts),
            SessionConfig::default(),
        ),
        developer: DeveloperService::new(store, artifacts, SessionConfig::default()),
        artifact_dir,
    }
}

static NEXT_CONN: AtomicU64 = AtomicU64::new(1_000_000);

/// One simulated connection.
struct Peer {
    client: Client,
    rx: UnboundedReceiver<Outbound>,
}

impl Peer {
    fn new() -> Self {
        let id = ConnectionId::new(NEXT_CONN.fetch_add(1, Ordering::Relaxed));
        let (handle, rx) = SessionHandle::new(id);
        Self {
            client: Client::new(handle),
            rx,
        }
    }

    async fn dispatch<S: Service>(&mut self, service: &S, request: ClientRequest) -> Dispatch {
        dispatch(service, &mut self.client, request).await
    }

    async fn request<S: Service>(&mut self, service: &S, request: ClientRequest) -> Outcome {
        match self.dispatch(service, request).await {
            Dispatch::Reply(outcome) | Dispatch::ReplyAndClose(outcome) => outcome,
            Dispatch::Ignore => panic!("request was ignored"),
        }
    }

    /// Everything queued for this connection so far.
    fn outbound(&mut self) -> Vec<Outbound> {
        let mut out = Vec::new();
        while let Ok(item) = self.rx.try_recv() {
            out.push(item);
        }
        out
    }

    /// Queued pushes, lobby deltas excluded.
    fn events(&mut self) -> Vec<ServerMessage> {
        self.outbound()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Push(ServerMessage::LobbyDelta(_)) => None,
                Outbound::Push(m) => Some(m),
                Outbound::Close => None,
            })
            .collect()
    }
}

fn data(outcome: Outcome) -> Value {
    match outcome {
        Outcome::Ok { data } => data,
        other => panic!("expected ok, got {other:?}"),
    }
}

fn code(outcome: Outcome) -> ErrorCode {
    outcome
        .code()
        .unwrap_or_else(|| panic!("expected an error, got {outcome:?}"))
}

async fn account<S: Service>(service: &S, name: &str) -> Peer {
    let mut peer = Peer::new();
    let registered = peer
        .request(
            service,
            ClientRequest::Register {
                name: name.into(),
                password: "hunter22".into(),
            },
        )
        .await;
    assert!(registered.is_ok(), "{registered:?}");
    let login = peer
        .request(
            service,
            ClientRequest::Login {
                name: name.into(),
                password: "hunter22".into(),
            },
        )
        .await;
    assert!(login.is_ok(), "{login:?}");
    peer
}

fn snake(version: &str) -> GameConfig {
    GameConfig {
        game_id: None,
        name: Some("Snake".into()),
        version: Some(version.into()),
        launch_spec: Some(vec!["python3".into(), "snake.py".into()]),
        min_players: Some(2),
        max_players: Some(3),
        game_type: Some("CLI".into()),
        description: Some("eat, grow, avoid walls".into()),
    }
}

async fn publish_snake(platform: &Platform, dev: &mut Peer) -> GameId {
    let reply = dev
        .request(
            &platform.developer,
            ClientRequest::UploadGame {
                game_config: snake("1.0.0"),
                artifact: b"snake 1.0.0".to_vec(),
            },
        )
        .await;
    let id = data(reply)["game_id"].as_str().unwrap().to_string();
    GameId(id)
}

async fn release(platform: &Platform, dev: &mut Peer, game_id: &GameId, version: &str) -> Outcome {
    dev.request(
        &platform.developer,
        ClientRequest::UpdateGame {
            game_id: game_id.clone(),
            version: version.into(),
            release_note: format!("release {version}"),
            artifact: format!("snake {version}").into_bytes(),
        },
    )
    .await
}

async fn create_room(platform: &Platform, host: &mut Peer, game_id: &GameId) -> RoomId {
    let reply = host
        .request(
            &platform.lobby,
            ClientRequest::CreateRoom {
                game_id: game_id.clone(),
                version: None,
            },
        )
        .await;
    RoomId(data(reply)["room"]["id"].as_str().unwrap().to_string())
}

async fn join(platform: &Platform, peer: &mut Peer, room_id: &RoomId, version: &str) -> Outcome {
    peer.request(
        &platform.lobby,
        ClientRequest::JoinRoom {
            room_id: room_id.clone(),
            client_game_version: Some(version.into()),
        },
    )
    .await
}

// =========================================================================
// Accounts and sessions
// =========================================================================

#[tokio::test]
async fn test_request_before_login_returns_not_authenticated() {
    let platform = platform();
    let mut peer = Peer::new();

    let reply = peer.request(&platform.lobby, ClientRequest::ListRooms).await;

    assert_eq!(code(reply), ErrorCode::NotAuthenticated);
}

#[tokio::test]
async fn test_unknown_action_is_dropped_without_reply() {
    let platform = platform();
    let mut peer = account(&platform.lobby, "alice").await;

    let result = peer.dispatch(&platform.lobby, ClientRequest::Unknown).await;

    assert_eq!(result, Dispatch::Ignore);
}

#[tokio::test]
async fn test_login_wrong_password_and_unknown_name_look_alike() {
    let platform = platform();
    let _alice = account(&platform.lobby, "alice").await;
    let mut peer = Peer::new();

    let wrong = peer
        .request(
            &platform.lobby,
            ClientRequest::Login {
                name: "alice".into(),
                password: "nope-nope".into(),
            },
        )
        .await;
    let unknown = peer
        .request(
            &platform.lobby,
            ClientRequest::Login {
                name: "mallory".into(),
                password: "hunter22".into(),
            },
        )
        .await;

    assert_eq!(wrong, unknown);
    assert_eq!(code(wrong), ErrorCode::InvalidCredentials);
}

#[tokio::test]
async fn test_register_duplicate_and_weak_password_rejected() {
    let platform = platform();
    let _alice = account(&platform.lobby, "alice").await;
    let mut peer = Peer::new();

    let duplicate = peer
        .request(
            &platform.lobby,
            ClientRequest::Register {
                name: "alice".into(),
                password: "hunter22".into(),
            },
        )
        .await;
    let weak = peer
        .request(
            &platform.lobby,
            ClientRequest::Register {
                name: "bob".into(),
                password: "123".into(),
            },
        )
        .await;

    assert_eq!(code(duplicate), ErrorCode::UserExists);
    assert_eq!(code(weak), ErrorCode::WeakPassword);
}

#[tokio::test]
async fn test_same_name_allowed_across_account_kinds() {
    let platform = platform();
    let _player = account(&platform.lobby, "sam").await;
    let _developer = account(&platform.developer, "sam").await;
}

#[tokio::test]
async fn test_relogin_kicks_previous_connection() {
    let platform = platform();
    let mut first = account(&platform.lobby, "alice").await;
    let _ = first.outbound();

    let mut second = Peer::new();
    let login = second
        .request(
            &platform.lobby,
            ClientRequest::Login {
                name: "alice".into(),
                password: "hunter22".into(),
            },
        )
        .await;
    assert_eq!(data(login)["kicked_previous"], true);

    let queued = first.outbound();
    assert!(matches!(
        queued.first(),
        Some(Outbound::Push(ServerMessage::ForceLogout { .. }))
    ));
    assert!(queued.contains(&Outbound::Close));

    let stale = first.dispatch(&platform.lobby, ClientRequest::ListRooms).await;
    assert!(matches!(
        stale,
        Dispatch::ReplyAndClose(Outcome::Error {
            code: ErrorCode::NotAuthenticated,
            ..
        })
    ));

    let fresh = second.request(&platform.lobby, ClientRequest::ListRooms).await;
    assert!(fresh.is_ok());
    assert_eq!(platform.lobby.registry().len(), 1);
}

#[tokio::test]
async fn test_kicked_disconnect_keeps_new_session_and_room() {
    let platform = platform();
    let mut dev = account(&platform.developer, "studio").await;
    let game_id = publish_snake(&platform, &mut dev).await;

    let mut first = account(&platform.lobby, "alice").await;
    let room_id = create_room(&platform, &mut first, &game_id).await;

    let mut second = Peer::new();
    second
        .request(
            &platform.lobby,
            ClientRequest::Login {
                name: "alice".into(),
                password: "hunter22".into(),
            },
        )
        .await;
    let alice = second.client.session().unwrap().account_id.clone();

    disconnect(&platform.lobby, &mut first.client).await;

    assert!(platform.lobby.registry().lookup(&alice).is_some());
    assert_eq!(platform.lobby.rooms().room_of(&alice), Some(room_id));
}

#[tokio::test]
async fn test_logout_then_request_rejected() {
    let platform = platform();
    let mut alice = account(&platform.lobby, "alice").await;

    assert!(alice.request(&platform.lobby, ClientRequest::Logout).await.is_ok());
    let reply = alice.request(&platform.lobby, ClientRequest::ListGames).await;

    assert_eq!(code(reply), ErrorCode::NotAuthenticated);
    assert!(platform.lobby.registry().is_empty());
}

#[tokio::test]
async fn test_role_mismatch_is_permission_denied() {
    let platform = platform();
    let mut player = account(&platform.lobby, "alice").await;
    let mut dev = account(&platform.developer, "studio").await;

    let upload = player
        .request(&platform.lobby, ClientRequest::ListMyGames)
        .await;
    let room = dev.request(&platform.developer, ClientRequest::ListRooms).await;

    assert_eq!(code(upload), ErrorCode::PermissionDenied);
    assert_eq!(code(room), ErrorCode::PermissionDenied);
}

// =========================================================================
// Catalog through the developer service
// =========================================================================

#[tokio::test]
async fn test_upload_invalid_config_rejected() {
    let platform = platform();
    let mut dev = account(&platform.developer, "studio").await;
    let mut config = snake("1.0.0");
    config.launch_spec = None;

    let reply = dev
        .request(
            &platform.developer,
            ClientRequest::UploadGame {
                game_config: config,
                artifact: vec![1],
            },
        )
        .await;

    assert_eq!(code(reply), ErrorCode::InvalidConfig);
}

#[tokio::test]
async fn test_upload_with_game_id_appends_version() {
    let platform = platform();
    let mut dev = account(&platform.developer, "studio").await;
    let game_id = publish_snake(&platform, &mut dev).await;
    let mut config = snake("1.2.0");
    config.game_id = Some(game_id.clone());

    let reply = dev
        .request(
            &platform.developer,
            ClientRequest::UploadGame {
                game_config: config,
                artifact: b"snake 1.2.0".to_vec(),
            },
        )
        .await;
    assert_eq!(data(reply)["version"], "1.2.0");

    let newer = release(&platform, &mut dev, &game_id, "1.10.0").await;
    assert!(newer.is_ok(), "1.10.0 sorts after 1.2.0");
    let again = release(&platform, &mut dev, &game_id, "1.10.0").await;
    assert_eq!(code(again), ErrorCode::VersionTooOld);

    let mine = data(dev.request(&platform.developer, ClientRequest::ListMyGames).await);
    assert_eq!(mine["games"][0]["latest_version"], "1.10.0");
}

#[tokio::test]
async fn test_update_someone_elses_game_denied() {
    let platform = platform();
    let mut owner = account(&platform.developer, "studio").await;
    let mut rival = account(&platform.developer, "rival").await;
    let game_id = publish_snake(&platform, &mut owner).await;

    let update = release(&platform, &mut rival, &game_id, "2.0.0").await;
    let remove = rival
        .request(
            &platform.developer,
            ClientRequest::RemoveGame {
                game_id: game_id.clone(),
            },
        )
        .await;

    assert_eq!(code(update), ErrorCode::PermissionDenied);
    assert_eq!(code(remove), ErrorCode::PermissionDenied);
}

// =========================================================================
// Rooms
// =========================================================================

#[tokio::test]
async fn test_snake_version_pinning_scenario() {
    let platform = platform();
    let mut dev = account(&platform.developer, "studio").await;
    let game_id = publish_snake(&platform, &mut dev).await;

    let mut a = account(&platform.lobby, "a").await;
    let room_id = create_room(&platform, &mut a, &game_id).await;

    assert!(release(&platform, &mut dev, &game_id, "1.1.0").await.is_ok());

    let mut b = account(&platform.lobby, "b").await;
    let joined = join(&platform, &mut b, &room_id, "1.0.0").await;
    assert_eq!(data(joined)["room"]["game_version"], "1.0.0");

    let mut c = account(&platform.lobby, "c").await;
    let refused = join(&platform, &mut c, &room_id, "1.1.0").await;
    assert_eq!(
        refused,
        Outcome::VersionMismatch {
            game_id: game_id.clone(),
            required_version: "1.0.0".into(),
        }
    );

    let room = platform.lobby.rooms().get(&room_id).await.unwrap();
    assert_eq!(room.members.len(), 2);
    assert!(a.events().iter().any(|m| matches!(
        m,
        ServerMessage::UserJoined { user_name, .. } if user_name == "b"
    )));

    // C fetches the pinned build and retries.
    let download = c
        .request(
            &platform.lobby,
            ClientRequest::DownloadGame {
                game_id: game_id.clone(),
                version: Some("1.0.0".into()),
            },
        )
        .await;
    let artifact: Vec<u8> = serde_json::from_value(data(download)["artifact"].clone()).unwrap();
    assert_eq!(artifact, b"snake 1.0.0");
    assert!(join(&platform, &mut c, &room_id, "1.0.0").await.is_ok());
}

#[tokio::test]
async fn test_archived_game_scenario() {
    let platform = platform();
    let mut dev = account(&platform.developer, "studio").await;
    let game_id = publish_snake(&platform, &mut dev).await;
    let mut a = account(&platform.lobby, "a").await;
    let room_id = create_room(&platform, &mut a, &game_id).await;

    let removed = dev
        .request(
            &platform.developer,
            ClientRequest::RemoveGame {
                game_id: game_id.clone(),
            },
        )
        .await;
    assert!(removed.is_ok());

    let mut b = account(&platform.lobby, "b").await;
    let listing = data(b.request(&platform.lobby, ClientRequest::ListGames).await);
    assert!(listing["games"].as_array().unwrap().is_empty());

    assert!(join(&platform, &mut b, &room_id, "1.0.0").await.is_ok());

    let mut c = account(&platform.lobby, "c").await;
    let create = c
        .request(
            &platform.lobby,
            ClientRequest::CreateRoom {
                game_id: game_id.clone(),
                version: None,
            },
        )
        .await;
    assert_eq!(code(create), ErrorCode::GameUnavailable);
}

#[tokio::test]
async fn test_start_then_review_overwrites() {
    let platform = platform();
    let mut dev = account(&platform.developer, "studio").await;
    let game_id = publish_snake(&platform, &mut dev).await;
    let mut a = account(&platform.lobby, "a").await;
    let mut b = account(&platform.lobby, "b").await;
    let room_id = create_room(&platform, &mut a, &game_id).await;

    let early = b
        .request(
            &platform.lobby,
            ClientRequest::SubmitReview {
                game_id: game_id.clone(),
                score: 5,
                comment: String::new(),
            },
        )
        .await;
    assert_eq!(code(early), ErrorCode::NotPlayed);

    let too_few = a.request(&platform.lobby, ClientRequest::StartGame).await;
    assert_eq!(code(too_few), ErrorCode::NotEnoughPlayers);

    join(&platform, &mut b, &room_id, "1.0.0").await;
    let not_host = b.request(&platform.lobby, ClientRequest::StartGame).await;
    assert_eq!(code(not_host), ErrorCode::NotHost);
    assert!(a.request(&platform.lobby, ClientRequest::StartGame).await.is_ok());
    assert!(b.events().iter().any(|m| matches!(
        m,
        ServerMessage::GameStarted { game_version, .. } if game_version == "1.0.0"
    )));

    for score in [4, 5] {
        let reply = b
            .request(
                &platform.lobby,
                ClientRequest::SubmitReview {
                    game_id: game_id.clone(),
                    score,
                    comment: "fun".into(),
                },
            )
            .await;
        assert!(reply.is_ok());
    }
    let bad = b
        .request(
            &platform.lobby,
            ClientRequest::SubmitReview {
                game_id: game_id.clone(),
                score: 6,
                comment: String::new(),
            },
        )
        .await;
    assert_eq!(code(bad), ErrorCode::InvalidScore);

    let details = data(
        b.request(&platform.lobby, ClientRequest::GetGameDetails { game_id })
            .await,
    );
    assert_eq!(details["game"]["rating_count"], 1);
    assert_eq!(details["game"]["rating_sum"], 5);
    assert_eq!(details["average_rating"], 5.0);
}

#[tokio::test]
async fn test_host_leave_transfers_host_and_notifies() {
    let platform = platform();
    let mut dev = account(&platform.developer, "studio").await;
    let game_id = publish_snake(&platform, &mut dev).await;
    let mut a = account(&platform.lobby, "a").await;
    let mut b = account(&platform.lobby, "b").await;
    let room_id = create_room(&platform, &mut a, &game_id).await;
    join(&platform, &mut b, &room_id, "1.0.0").await;
    let b_id = b.client.session().unwrap().account_id.clone();
    let _ = b.events();

    let left = a.request(&platform.lobby, ClientRequest::LeaveRoom).await;
    assert_eq!(data(left)["room_id"], room_id.as_str());

    let events = b.events();
    assert!(events.iter().any(|m| matches!(m, ServerMessage::UserLeft { user_name, .. } if user_name == "a")));
    assert!(events.contains(&ServerMessage::HostChanged {
        room_id: room_id.clone(),
        host_id: b_id.clone(),
    }));
    assert_eq!(platform.lobby.rooms().get(&room_id).await.unwrap().host_id, b_id);

    let again = a.request(&platform.lobby, ClientRequest::LeaveRoom).await;
    assert_eq!(code(again), ErrorCode::NotInRoom);
}

#[tokio::test]
async fn test_disconnect_leaves_room_and_last_out_deletes_it() {
    let platform = platform();
    let mut dev = account(&platform.developer, "studio").await;
    let game_id = publish_snake(&platform, &mut dev).await;
    let mut a = account(&platform.lobby, "a").await;
    let room_id = create_room(&platform, &mut a, &game_id).await;

    disconnect(&platform.lobby, &mut a.client).await;

    let missing = platform.lobby.rooms().get(&room_id).await;
    assert!(missing.is_err());
    assert!(platform.lobby.registry().is_empty());
}

#[tokio::test]
async fn test_close_room_notifies_members() {
    let platform = platform();
    let mut dev = account(&platform.developer, "studio").await;
    let game_id = publish_snake(&platform, &mut dev).await;
    let mut a = account(&platform.lobby, "a").await;
    let mut b = account(&platform.lobby, "b").await;
    let room_id = create_room(&platform, &mut a, &game_id).await;
    join(&platform, &mut b, &room_id, "1.0.0").await;

    let not_host = b.request(&platform.lobby, ClientRequest::CloseRoom).await;
    assert_eq!(code(not_host), ErrorCode::NotHost);
    assert!(a.request(&platform.lobby, ClientRequest::CloseRoom).await.is_ok());

    assert!(b.events().contains(&ServerMessage::RoomClosed {
        room_id: room_id.clone(),
    }));
    let b_id = b.client.session().unwrap().account_id.clone();
    assert_eq!(platform.lobby.rooms().room_of(&b_id), None);
}

#[tokio::test]
async fn test_room_chat_reaches_members_only() {
    let platform = platform();
    let mut dev = account(&platform.developer, "studio").await;
    let game_id = publish_snake(&platform, &mut dev).await;
    let mut a = account(&platform.lobby, "a").await;
    let mut b = account(&platform.lobby, "b").await;
    let mut outsider = account(&platform.lobby, "z").await;
    let room_id = create_room(&platform, &mut a, &game_id).await;
    join(&platform, &mut b, &room_id, "1.0.0").await;
    let _ = outsider.events();

    let sent = a
        .request(
            &platform.lobby,
            ClientRequest::RoomChat {
                message: "gl hf".into(),
            },
        )
        .await;
    assert!(sent.is_ok());

    assert!(b.events().iter().any(|m| matches!(
        m,
        ServerMessage::RoomChat { sender, message, .. } if sender == "a" && message == "gl hf"
    )));
    assert!(outsider.events().is_empty());

    let empty = a
        .request(
            &platform.lobby,
            ClientRequest::RoomChat {
                message: "   ".into(),
            },
        )
        .await;
    assert_eq!(code(empty), ErrorCode::BadRequest);
}

// =========================================================================
// Lobby deltas
// =========================================================================

#[tokio::test]
async fn test_lobby_mirror_follows_deltas() {
    let platform = platform();
    let mut dev = account(&platform.developer, "studio").await;
    let game_id = publish_snake(&platform, &mut dev).await;

    let mut a = account(&platform.lobby, "a").await;
    let mut b = account(&platform.lobby, "b").await;
    let room_id = create_room(&platform, &mut a, &game_id).await;
    join(&platform, &mut b, &room_id, "1.0.0").await;
    a.request(&platform.lobby, ClientRequest::StartGame).await;

    let mut mirror = LobbyView::default();
    for item in a.outbound() {
        if let Outbound::Push(ServerMessage::LobbyDelta(delta)) = item {
            mirror.apply(&delta);
        }
    }

    assert_eq!(mirror, platform.lobby.broadcaster().snapshot().await);
    let a_id = a.client.session().unwrap().account_id.clone();
    assert_eq!(mirror.users[&a_id].status, UserStatus::Playing);
    assert_eq!(mirror.users[&a_id].room_id.as_ref(), Some(&room_id));
    let room: &RoomView = &mirror.rooms[&room_id];
    assert_eq!(room.status, RoomStatus::InProgress);
    assert_eq!(room.current_players, 2);

    let listed = data(a.request(&platform.lobby, ClientRequest::ListUsers).await);
    assert_eq!(listed["users"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_late_login_mirror_starts_from_baseline() {
    let platform = platform();
    let mut dev = account(&platform.developer, "studio").await;
    let game_id = publish_snake(&platform, &mut dev).await;

    let mut a = account(&platform.lobby, "a").await;
    let room_id = create_room(&platform, &mut a, &game_id).await;
    let mut c = account(&platform.lobby, "c").await;
    let mut b = account(&platform.lobby, "b").await;
    join(&platform, &mut b, &room_id, "1.0.0").await;

    let mut mirror = LobbyView::default();
    for item in c.outbound() {
        if let Outbound::Push(ServerMessage::LobbyDelta(delta)) = item {
            mirror.apply(&delta);
        }
    }

    assert_eq!(mirror, platform.lobby.broadcaster().snapshot().await);
    assert_eq!(mirror.users.len(), 3);
    assert_eq!(mirror.rooms[&room_id].current_players, 2);
}

#[tokio::test]
async fn test_logout_removes_user_from_lobby() {
    let platform = platform();
    let mut a = account(&platform.lobby, "a").await;
    let mut b = account(&platform.lobby, "b").await;
    let b_id = b.client.session().unwrap().account_id.clone();
    let _ = a.outbound();

    b.request(&platform.lobby, ClientRequest::Logout).await;

    let removed: Vec<_> = a
        .outbound()
        .into_iter()
        .filter_map(|o| match o {
            Outbound::Push(ServerMessage::LobbyDelta(d)) => Some(d.users.removed),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(removed, vec![b_id]);
}
