//! The Playhub game catalog.
//!
//! [`CatalogManager`] owns the lifecycle of `Game` records:
//!
//! ```text
//! publish ──→ active ──(update: strictly newer version)──→ active
//!               │
//!               └──(remove)──→ archived   (never deleted)
//! ```
//!
//! Versions compare as dotted numbers ([`GameVersion`]). Builds live in an
//! [`ArtifactStore`] next to the data store.

mod artifact;
mod error;
mod manager;

pub use artifact::{ArtifactStore, FsArtifactStore};
pub use error::CatalogError;
pub use manager::{CatalogManager, Download};
pub use playhub_protocol::{GameVersion, ParseVersionError};
