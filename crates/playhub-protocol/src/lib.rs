//! Wire protocol for Playhub.
//!
//! This crate defines everything that crosses a process boundary:
//!
//! - **Identity and envelope** ([`AccountId`], [`GameId`], [`RoomId`],
//!   [`Envelope`], [`ErrorCode`]).
//! - **Records** ([`Account`], [`Game`], [`Room`], ...) as persisted by the
//!   data store, plus the views clients see.
//! - **Client traffic** ([`ClientRequest`], [`ServerMessage`], [`Outcome`]).
//! - **Lobby deltas** ([`LobbyDelta`], [`LobbyView`]).
//! - **Store traffic** ([`StoreRequest`], [`StoreResponse`]).
//! - **Codec** ([`Codec`], [`JsonCodec`]).
//! - **Versions** ([`GameVersion`]), compared as dotted numbers.
//!
//! It knows nothing about sockets, sessions or rooms as live objects; it
//! only describes the shapes.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Services (sessions, rooms, catalog)
//! ```

mod codec;
mod delta;
mod error;
mod messages;
mod records;
mod store;
mod types;
mod version;

pub use codec::{Codec, JsonCodec};
pub use delta::{Delta, LobbyDelta, LobbyView};
pub use error::ProtocolError;
pub use messages::{ClientRequest, Outcome, ServerMessage};
pub use records::{
    Account, Game, GameConfig, GameStatus, GameSummary, Review, Room,
    RoomStatus, RoomView, UserStatus, UserView, VersionEntry,
};
pub use store::{Collection, StoreData, StoreRequest, StoreResponse, Versioned};
pub use types::{
    AccountId, AccountKind, Envelope, ErrorCode, GameId, RoomId, unix_millis,
    unix_now,
};
pub use version::{GameVersion, ParseVersionError};
