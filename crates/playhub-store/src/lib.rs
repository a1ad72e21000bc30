//! The Playhub data store.
//!
//! Four collections of revisioned JSON documents, one authoritative
//! process. Everything else in the system talks to it through the
//! [`DataStore`] trait:
//!
//! ```text
//! Lobby service ─┐                        ┌─ MemoryStore ── data.json
//!                ├─ RemoteStore ── TCP ── StoreServer
//! Developer svc ─┘
//! ```
//!
//! Read-modify-write is always a compare-and-set against the revision that
//! was read ([`update_record`]), so the lobby and the developer service can
//! both touch the same `Game` record without losing each other's writes.
//! [`KeyedLocks`] adds in-process serialization on top where a service
//! needs a whole operation (not just one write) to be exclusive.

mod error;
mod locks;
mod memory;
mod remote;
mod server;
mod store;

pub use error::StoreError;
pub use locks::{KeyedGuard, KeyedLocks};
pub use memory::MemoryStore;
pub use remote::RemoteStore;
pub use server::{StoreServer, handle_request};
pub use store::{
    DataStore, MAX_CAS_RETRIES, Mutation, Record, create_record, get_record,
    list_records, update_record,
};
