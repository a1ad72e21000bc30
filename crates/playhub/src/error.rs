//! Unified error type for the Playhub services.

use playhub_catalog::CatalogError;
use playhub_protocol::{ErrorCode, ProtocolError};
use playhub_room::RoomError;
use playhub_session::SessionError;
use playhub_store::StoreError;
use playhub_transport::TransportError;

use crate::config::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attributes let `?` lift any layer's error into this one.
#[derive(Debug, thiserror::Error)]
pub enum PlayhubError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PlayhubError {
    /// The boundary code reported to clients. Infrastructure failures
    /// are all `ERR_INTERNAL`.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Session(e) => e.code(),
            Self::Catalog(e) => e.code(),
            Self::Room(e) => e.code(),
            Self::Protocol(_) => ErrorCode::BadRequest,
            Self::Transport(_) | Self::Store(_) | Self::Config(_) => ErrorCode::Internal,
        }
    }
}
