//! The data-store wire protocol.
//!
//! The store is a narrow service: revisioned JSON documents addressed by
//! `(collection, id)`. Callers never share memory with it; every
//! read-modify-write goes through [`StoreRequest::CompareAndSet`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The four top-level collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Collection {
    User,
    Developer,
    Room,
    Game,
}

impl Collection {
    pub const ALL: [Collection; 4] = [Self::User, Self::Developer, Self::Room, Self::Game];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Developer => "Developer",
            Self::Room => "Room",
            Self::Game => "Game",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored document and the revision it was written at.
///
/// Revisions come from one store-wide counter, so a record that is
/// deleted and recreated never reuses an old revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned {
    pub revision: u64,
    pub value: serde_json::Value,
}

/// A request to the data store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StoreRequest {
    Get {
        collection: Collection,
        id: String,
    },
    List {
        collection: Collection,
    },
    /// Unconditional write.
    Put {
        collection: Collection,
        id: String,
        value: serde_json::Value,
    },
    /// Writes `value` only if the record is currently at `expected`.
    ///
    /// `expected: None` means the record must not exist; `value: None`
    /// deletes it.
    CompareAndSet {
        collection: Collection,
        id: String,
        expected: Option<u64>,
        value: Option<serde_json::Value>,
    },
    Delete {
        collection: Collection,
        id: String,
    },
}

/// Successful result bodies, one per request kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreData {
    Record { record: Option<Versioned> },
    Records { records: BTreeMap<String, Versioned> },
    /// New revision after a write; `None` after a delete.
    Revision { revision: Option<u64> },
    Deleted { existed: bool },
}

/// The store's answer to one [`StoreRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StoreResponse {
    Ok { data: StoreData },
    /// A compare-and-set lost the race; `current` is the record's
    /// revision now (`None` if it does not exist).
    Conflict { current: Option<u64> },
    Error { message: String },
}
