//! Lobby rooms for Playhub.
//!
//! A room binds its members to one exact game build, pinned at creation:
//!
//! ```text
//! Open ──(start, host, ≥ min players)──→ InProgress
//!   │                                        │
//!   └────────────(last member leaves / host closes)──→ deleted
//! ```
//!
//! Joining checks the joiner's installed build against the pin and answers
//! with [`JoinOutcome::VersionMismatch`] rather than an error when they
//! differ. Rooms already pinned to a game keep working after the game is
//! archived; only creating new rooms for it is refused.

mod coordinator;
mod error;

pub use coordinator::{JoinOutcome, LeaveOutcome, RoomCoordinator};
pub use error::RoomError;
