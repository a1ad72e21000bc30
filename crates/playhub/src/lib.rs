//! # Playhub
//!
//! A game-store platform made of three services:
//!
//! - the **data store** (`playhub-store` binary): four revisioned
//!   collections, the single source of truth;
//! - the **developer service** (`playhub-developer`): developer accounts
//!   and catalog management;
//! - the **lobby** (`playhub-lobby`): player accounts, rooms pinned to an
//!   exact game build, and live lobby deltas.
//!
//! Both client-facing services share the connection loop in
//! [`connection`], which enforces one live session per account.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use playhub::prelude::*;
//!
//! # async fn run() -> Result<(), PlayhubError> {
//! let store = Arc::new(MemoryStore::new());
//! let artifacts = Arc::new(FsArtifactStore::new("data/artifacts"));
//! let lobby = Arc::new(LobbyService::new(store, artifacts, SessionConfig::default()));
//! lobby.reset_rooms().await?;
//!
//! let transport = TcpTransport::bind("127.0.0.1:7100").await?;
//! playhub::connection::run(lobby, transport).await
//! # }
//! ```

mod broadcast;
mod config;
pub mod connection;
mod developer;
mod error;
mod lobby;
pub mod telemetry;

pub use broadcast::LobbyBroadcaster;
pub use config::{
    CONFIG_ENV, ConfigError, DeveloperSection, LobbySection, PlayhubConfig, SessionSection,
    StoreClientSection, StoreSection, TransportKind,
};
pub use developer::DeveloperService;
pub use error::PlayhubError;
pub use lobby::{LobbyService, MAX_CHAT_LEN};

/// Re-exports for service binaries and integration tests.
pub mod prelude {
    pub use crate::connection::{Client, Dispatch, Service, disconnect, dispatch, listen, run, serve};
    pub use crate::{DeveloperService, LobbyBroadcaster, LobbyService, PlayhubConfig, PlayhubError};

    pub use playhub_catalog::{ArtifactStore, CatalogManager, FsArtifactStore, GameVersion};
    pub use playhub_protocol::{
        AccountId, AccountKind, ClientRequest, Codec, Envelope, ErrorCode, GameConfig, GameId,
        JsonCodec, LobbyDelta, LobbyView, Outcome, RoomId, RoomStatus, ServerMessage, UserStatus,
    };
    pub use playhub_room::{JoinOutcome, RoomCoordinator};
    pub use playhub_session::{Outbound, Session, SessionConfig, SessionHandle, SessionRegistry};
    pub use playhub_store::{DataStore, MemoryStore, RemoteStore, StoreServer};
    pub use playhub_transport::{
        Connection, ConnectionId, TcpConnection, TcpTransport, Transport, WebSocketTransport,
    };
}
