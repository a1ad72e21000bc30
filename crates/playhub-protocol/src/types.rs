//! Identity types, the message envelope and boundary error codes.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::Collection;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifier of a player or developer account.
///
/// Ids are UUID v4 strings assigned by the service that creates the record.
/// `#[serde(transparent)]` keeps them plain strings on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    /// Generates a fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of a catalog entry. Assigned once at first publish.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub String);

impl GameId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GameId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of a lobby room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// AccountKind
// ---------------------------------------------------------------------------

/// The two kinds of account. Each lives in its own collection, so a name
/// may be taken once per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Player,
    Developer,
}

impl AccountKind {
    /// The data-store collection holding accounts of this kind.
    pub fn collection(self) -> Collection {
        match self {
            Self::Player => Collection::User,
            Self::Developer => Collection::Developer,
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player => write!(f, "player"),
            Self::Developer => write!(f, "developer"),
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The top-level wrapper around every message on a client connection.
///
/// Each side keeps its own `seq` counter; replies point back at the
/// request's `seq` through [`ServerMessage::Reply`](crate::ServerMessage).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<P> {
    /// Per-sender sequence number.
    pub seq: u64,

    /// Unix time in milliseconds when the message was built.
    #[serde(default)]
    pub timestamp: u64,

    /// The message itself.
    pub payload: P,
}

impl<P> Envelope<P> {
    /// Wraps `payload` with the current time.
    pub fn new(seq: u64, payload: P) -> Self {
        Self {
            seq,
            timestamp: unix_millis(),
            payload,
        }
    }
}

/// Seconds since the Unix epoch.
pub fn unix_now() -> u64 {
    unix_millis() / 1000
}

/// Milliseconds since the Unix epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Error codes surfaced to clients.
///
/// Each domain error in the service crates maps to exactly one code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "ERR_USER_EXISTS")]
    UserExists,
    #[serde(rename = "ERR_INVALID_CREDENTIALS")]
    InvalidCredentials,
    #[serde(rename = "ERR_WEAK_PASSWORD")]
    WeakPassword,
    #[serde(rename = "ERR_NOT_AUTHENTICATED")]
    NotAuthenticated,
    #[serde(rename = "ERR_INVALID_CONFIG")]
    InvalidConfig,
    #[serde(rename = "ERR_PERMISSION_DENIED")]
    PermissionDenied,
    #[serde(rename = "ERR_VERSION_TOO_OLD")]
    VersionTooOld,
    #[serde(rename = "ERR_GAME_UNAVAILABLE")]
    GameUnavailable,
    #[serde(rename = "ERR_GAME_NOT_FOUND")]
    GameNotFound,
    #[serde(rename = "ERR_ROOM_NOT_FOUND")]
    RoomNotFound,
    #[serde(rename = "ERR_ROOM_FULL")]
    RoomFull,
    #[serde(rename = "ERR_ROOM_NOT_OPEN")]
    RoomNotOpen,
    #[serde(rename = "ERR_NOT_HOST")]
    NotHost,
    #[serde(rename = "ERR_NOT_ENOUGH_PLAYERS")]
    NotEnoughPlayers,
    #[serde(rename = "ERR_ALREADY_IN_ROOM")]
    AlreadyInRoom,
    #[serde(rename = "ERR_NOT_IN_ROOM")]
    NotInRoom,
    #[serde(rename = "ERR_NOT_PLAYED")]
    NotPlayed,
    #[serde(rename = "ERR_INVALID_SCORE")]
    InvalidScore,
    #[serde(rename = "ERR_BAD_REQUEST")]
    BadRequest,
    #[serde(rename = "ERR_INTERNAL")]
    Internal,
}

impl ErrorCode {
    /// The wire string, e.g. `"ERR_ROOM_FULL"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserExists => "ERR_USER_EXISTS",
            Self::InvalidCredentials => "ERR_INVALID_CREDENTIALS",
            Self::WeakPassword => "ERR_WEAK_PASSWORD",
            Self::NotAuthenticated => "ERR_NOT_AUTHENTICATED",
            Self::InvalidConfig => "ERR_INVALID_CONFIG",
            Self::PermissionDenied => "ERR_PERMISSION_DENIED",
            Self::VersionTooOld => "ERR_VERSION_TOO_OLD",
            Self::GameUnavailable => "ERR_GAME_UNAVAILABLE",
            Self::GameNotFound => "ERR_GAME_NOT_FOUND",
            Self::RoomNotFound => "ERR_ROOM_NOT_FOUND",
            Self::RoomFull => "ERR_ROOM_FULL",
            Self::RoomNotOpen => "ERR_ROOM_NOT_OPEN",
            Self::NotHost => "ERR_NOT_HOST",
            Self::NotEnoughPlayers => "ERR_NOT_ENOUGH_PLAYERS",
            Self::AlreadyInRoom => "ERR_ALREADY_IN_ROOM",
            Self::NotInRoom => "ERR_NOT_IN_ROOM",
            Self::NotPlayed => "ERR_NOT_PLAYED",
            Self::InvalidScore => "ERR_INVALID_SCORE",
            Self::BadRequest => "ERR_BAD_REQUEST",
            Self::Internal => "ERR_INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
