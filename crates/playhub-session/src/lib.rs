//! Accounts and live sessions for Playhub.
//!
//! - **Accounts**: registration and password checks against the data
//!   store ([`SessionRegistry::register_account`],
//!   [`SessionRegistry::authenticate`]).
//! - **Live sessions**: at most one per account, system-wide. A newer
//!   login supersedes the older one ([`SessionRegistry::register`]).
//!
//! ```text
//! Room / broadcast layer (above)  ← looks up sessions to push messages
//!     ↕
//! Session layer (this crate)
//!     ↕
//! Data store (below)  ← User / Developer collections
//! ```

mod auth;
mod error;
mod registry;
mod session;

pub use auth::{MIN_PASSWORD_LEN, hash_password, verify_password};
pub use error::SessionError;
pub use registry::{KICK_REASON, Registration, SHARD_COUNT, SessionRegistry};
pub use session::{Outbound, Session, SessionConfig, SessionHandle};
