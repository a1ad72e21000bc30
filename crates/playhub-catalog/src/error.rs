//! Error types for the catalog.

use playhub_protocol::{ErrorCode, GameId};
use playhub_store::StoreError;

/// Errors from catalog operations.
///
/// Input and authorization errors are raised before anything is written.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// A required config field is missing or out of range.
    #[error("invalid game config: {0}")]
    InvalidConfig(String),

    /// The version string is malformed, or names a build that was never
    /// published.
    #[error("invalid version {0:?}")]
    InvalidVersion(String),

    #[error("game {0} is not owned by this developer")]
    PermissionDenied(GameId),

    /// Uploads must be strictly newer than the latest version.
    #[error("version {requested} is not newer than {latest}")]
    VersionTooOld { latest: String, requested: String },

    #[error("game {0} not found")]
    GameNotFound(GameId),

    /// The game is archived and cannot be used for new activity.
    #[error("game {0} is unavailable")]
    GameUnavailable(GameId),

    #[error("game {0} has not been played by this user")]
    NotPlayed(GameId),

    #[error("score {0} is outside 1..=5")]
    InvalidScore(i64),

    /// Reading or writing a build artifact failed.
    #[error("artifact storage failed: {0}")]
    Artifact(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl CatalogError {
    /// The boundary code reported to clients.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidConfig(_) | Self::InvalidVersion(_) => ErrorCode::InvalidConfig,
            Self::PermissionDenied(_) => ErrorCode::PermissionDenied,
            Self::VersionTooOld { .. } => ErrorCode::VersionTooOld,
            Self::GameNotFound(_) => ErrorCode::GameNotFound,
            Self::GameUnavailable(_) => ErrorCode::GameUnavailable,
            Self::NotPlayed(_) => ErrorCode::NotPlayed,
            Self::InvalidScore(_) => ErrorCode::InvalidScore,
            Self::Artifact(_) | Self::Store(_) => ErrorCode::Internal,
        }
    }
}
