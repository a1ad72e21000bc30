//! Error types for the room layer.

use playhub_catalog::CatalogError;
use playhub_protocol::{ErrorCode, GameId, RoomId};
use playhub_store::StoreError;

/// Errors that can occur during room operations.
///
/// A version mismatch on join is not here: it is a normal
/// [`JoinOutcome`](crate::JoinOutcome).
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The room already started (or is closing).
    #[error("room {0} is not open")]
    RoomNotOpen(RoomId),

    #[error("only the host can do this in room {0}")]
    NotHost(RoomId),

    #[error("room needs {need} players, has {have}")]
    NotEnoughPlayers { have: usize, need: usize },

    /// The player is already a member of a room.
    #[error("already in room {0}")]
    AlreadyInRoom(RoomId),

    #[error("not in a room")]
    NotInRoom,

    /// New rooms cannot be created for an archived game.
    #[error("game {0} is unavailable")]
    GameUnavailable(GameId),

    /// A room was requested for a version the game never published.
    #[error("game has no version {0:?}")]
    InvalidVersion(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl RoomError {
    /// The boundary code reported to clients.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::RoomNotFound(_) => ErrorCode::RoomNotFound,
            Self::RoomFull(_) => ErrorCode::RoomFull,
            Self::RoomNotOpen(_) => ErrorCode::RoomNotOpen,
            Self::NotHost(_) => ErrorCode::NotHost,
            Self::NotEnoughPlayers { .. } => ErrorCode::NotEnoughPlayers,
            Self::AlreadyInRoom(_) => ErrorCode::AlreadyInRoom,
            Self::NotInRoom => ErrorCode::NotInRoom,
            Self::GameUnavailable(_) => ErrorCode::GameUnavailable,
            Self::InvalidVersion(_) => ErrorCode::InvalidConfig,
            Self::Catalog(e) => e.code(),
            Self::Store(_) => ErrorCode::Internal,
        }
    }
}
