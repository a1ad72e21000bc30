//! Client requests and server messages.
//!
//! Both enums are internally tagged and carry an explicit `Unknown`
//! variant: a peer running an extension we do not know about (a chat
//! plugin, a newer client) may send or receive message types this build
//! has never seen, and those must decode to `Unknown` rather than fail.

use serde::{Deserialize, Serialize};

use crate::{AccountId, ErrorCode, GameConfig, GameId, LobbyDelta, RoomId};

// ---------------------------------------------------------------------------
// ClientRequest
// ---------------------------------------------------------------------------

/// Requests a lobby or developer client can send.
///
/// JSON shape: `{ "action": "join_room", "room_id": "…", … }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientRequest {
    // -- Accounts (both services) --
    Register {
        name: String,
        password: String,
    },
    Login {
        name: String,
        password: String,
    },
    Logout,

    // -- Lobby --
    ListRooms,
    ListUsers,
    ListGames,
    GetGameDetails {
        game_id: GameId,
    },
    DownloadGame {
        game_id: GameId,
        #[serde(default)]
        version: Option<String>,
    },
    CreateRoom {
        game_id: GameId,
        #[serde(default)]
        version: Option<String>,
    },
    JoinRoom {
        room_id: RoomId,
        /// The build the joiner has installed, `None` if not installed.
        #[serde(default)]
        client_game_version: Option<String>,
    },
    LeaveRoom,
    /// Host only: ends the room for everyone.
    CloseRoom,
    StartGame,
    RoomChat {
        message: String,
    },
    SubmitReview {
        game_id: GameId,
        score: i64,
        #[serde(default)]
        comment: String,
    },

    // -- Developer --
    UploadGame {
        game_config: GameConfig,
        #[serde(default)]
        artifact: Vec<u8>,
    },
    UpdateGame {
        game_id: GameId,
        version: String,
        #[serde(default)]
        release_note: String,
        #[serde(default)]
        artifact: Vec<u8>,
    },
    RemoveGame {
        game_id: GameId,
    },
    ListMyGames,

    /// Any action this build does not recognise.
    #[serde(other)]
    Unknown,
}

impl ClientRequest {
    /// Returns `true` for requests allowed before login.
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Register { .. } | Self::Login { .. })
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// The result of a request, tagged by `"status"`.
///
/// `VersionMismatch` is not an error: the caller is expected to download
/// the required build and retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Ok {
        #[serde(default)]
        data: serde_json::Value,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
    VersionMismatch {
        game_id: GameId,
        required_version: String,
    },
}

impl Outcome {
    /// A successful outcome with no payload.
    pub fn ok() -> Self {
        Self::Ok {
            data: serde_json::Value::Null,
        }
    }

    /// A successful outcome carrying `data`.
    pub fn with_data(data: serde_json::Value) -> Self {
        Self::Ok { data }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    /// The error code, if this is an error.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Error { code, .. } => Some(*code),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ServerMessage
// ---------------------------------------------------------------------------

/// Everything a service sends to a client, tagged by `"type"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Answer to the request whose envelope `seq` was `reply_to`.
    Reply { reply_to: u64, outcome: Outcome },

    /// The account logged in elsewhere; this connection is being closed.
    ForceLogout { reason: String },

    /// Incremental room-list and user-list update.
    LobbyDelta(LobbyDelta),

    // -- Room-scoped notifications, sent to members only --
    UserJoined {
        room_id: RoomId,
        account_id: AccountId,
        user_name: String,
    },
    UserLeft {
        room_id: RoomId,
        account_id: AccountId,
        user_name: String,
    },
    HostChanged {
        room_id: RoomId,
        host_id: AccountId,
    },
    /// The host ended the room; every member is out of it.
    RoomClosed {
        room_id: RoomId,
    },
    GameStarted {
        room_id: RoomId,
        game_id: GameId,
        game_version: String,
    },
    RoomChat {
        room_id: RoomId,
        sender: String,
        message: String,
        timestamp: u64,
    },

    /// Any message type this build does not recognise.
    #[serde(other)]
    Unknown,
}
