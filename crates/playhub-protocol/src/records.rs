//! Persisted records and the views derived from them.
//!
//! These are the documents the data store keeps in its four collections
//! (`User`, `Developer`, `Room`, `Game`) and the display-ready projections
//! that travel to clients.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{AccountId, GameId, GameVersion, RoomId};

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// A player or developer account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    /// `salt_hex$sha256_hex`, see the session crate.
    pub password_hash: String,
    /// Games this account has played in a started room. Only meaningful for
    /// players; gates review submission.
    #[serde(default)]
    pub played_games: BTreeSet<GameId>,
    #[serde(default)]
    pub created_at: u64,
}

// ---------------------------------------------------------------------------
// Games
// ---------------------------------------------------------------------------

/// Catalog lifecycle state. Archived games are hidden from listings and
/// new rooms but stay readable for rooms already pinned to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    #[default]
    Active,
    Archived,
}

/// One published build of a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub version: String,
    #[serde(default)]
    pub release_note: String,
    pub timestamp: u64,
}

/// A player's review. At most one per `(game, user)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub user_id: AccountId,
    pub score: u8,
    #[serde(default)]
    pub comment: String,
    pub timestamp: u64,
}

/// A catalog entry.
///
/// `versions` is append-only and strictly increasing; `latest_version`
/// always equals the last entry's version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub developer_id: AccountId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub game_type: String,
    /// Command line used to launch the game client.
    pub launch_spec: Vec<String>,
    pub min_players: usize,
    pub max_players: usize,
    pub latest_version: String,
    pub versions: Vec<VersionEntry>,
    #[serde(default)]
    pub rating_sum: u64,
    #[serde(default)]
    pub rating_count: u64,
    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub status: GameStatus,
}

impl Game {
    pub fn is_active(&self) -> bool {
        self.status == GameStatus::Active
    }

    /// Returns `true` if `version` was ever published for this game.
    /// `1.0` and `1.0.0` name the same build.
    pub fn has_version(&self, version: &str) -> bool {
        self.find_version(version).is_some()
    }

    /// The published spelling of `version`, if it names a build of this
    /// game.
    pub fn find_version(&self, version: &str) -> Option<&str> {
        self.versions
            .iter()
            .map(|v| v.version.as_str())
            .find(|&published| GameVersion::same(published, version))
    }

    /// Average score from the cached counters, `None` when unrated.
    pub fn average_rating(&self) -> Option<f64> {
        (self.rating_count > 0)
            .then(|| self.rating_sum as f64 / self.rating_count as f64)
    }

    /// Listing projection. Uses the cached rating counters only.
    pub fn summary(&self) -> GameSummary {
        GameSummary {
            id: self.id.clone(),
            developer_id: self.developer_id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            game_type: self.game_type.clone(),
            latest_version: self.latest_version.clone(),
            min_players: self.min_players,
            max_players: self.max_players,
            rating_sum: self.rating_sum,
            rating_count: self.rating_count,
            average_rating: self.average_rating(),
            status: self.status,
        }
    }
}

/// A display-ready catalog row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub id: GameId,
    pub developer_id: AccountId,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub game_type: String,
    pub latest_version: String,
    pub min_players: usize,
    pub max_players: usize,
    pub rating_sum: u64,
    pub rating_count: u64,
    pub average_rating: Option<f64>,
    pub status: GameStatus,
}

/// The catalog config a developer submits with an upload.
///
/// Everything is optional at the type level so a missing field surfaces
/// as `ERR_INVALID_CONFIG` instead of a decode failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Absent on first publish; echoed back afterwards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<GameId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub launch_spec: Option<Vec<String>>,
    #[serde(default)]
    pub min_players: Option<i64>,
    #[serde(default)]
    pub max_players: Option<i64>,
    #[serde(rename = "type", default)]
    pub game_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Rooms
// ---------------------------------------------------------------------------

/// Room lifecycle.
///
/// ```text
/// Open ──(start)──→ InProgress ──(last leave)──→ Closed
///   └─────────────(last leave)─────────────────→ Closed
/// ```
///
/// `Closed` rooms are deleted from the collection, so the state is only
/// ever observed transiently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Open,
    InProgress,
    Closed,
}

impl RoomStatus {
    /// Returns `true` if the room is accepting new members.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns `true` if transitioning to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Open, Self::InProgress)
                | (Self::Open, Self::Closed)
                | (Self::InProgress, Self::Closed)
        )
    }
}

/// A lobby room bound to one exact game build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub host_id: AccountId,
    pub game_id: GameId,
    pub game_name: String,
    /// Pinned at creation and never changed afterwards.
    pub game_version: String,
    pub status: RoomStatus,
    /// Members in join order; the first entry after the host leaves
    /// becomes the new host.
    pub members: Vec<AccountId>,
    pub min_players: usize,
    pub max_players: usize,
    #[serde(default)]
    pub created_at: u64,
}

impl Room {
    pub fn is_member(&self, account_id: &AccountId) -> bool {
        self.members.contains(account_id)
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.max_players
    }

    /// Lobby listing projection.
    pub fn view(&self) -> RoomView {
        RoomView {
            id: self.id.clone(),
            host_id: self.host_id.clone(),
            game_id: self.game_id.clone(),
            game_name: self.game_name.clone(),
            game_version: self.game_version.clone(),
            status: self.status,
            current_players: self.members.len(),
            max_players: self.max_players,
        }
    }
}

/// A room as shown in the lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomView {
    pub id: RoomId,
    pub host_id: AccountId,
    pub game_id: GameId,
    pub game_name: String,
    pub game_version: String,
    pub status: RoomStatus,
    pub current_players: usize,
    pub max_players: usize,
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// What an online player is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Idle,
    InRoom,
    Playing,
}

/// An online player as shown in the lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    pub id: AccountId,
    pub name: String,
    pub status: UserStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
}
