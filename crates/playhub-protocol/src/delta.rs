//! Lobby deltas: the minimal description of what changed between two
//! snapshots of the room list and the online-user list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{AccountId, RoomId, RoomView, UserView};

/// Changes to a keyed collection of views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta<T, K> {
    pub added: Vec<T>,
    pub removed: Vec<K>,
    pub modified: Vec<T>,
}

impl<T, K> Default for Delta<T, K> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            modified: Vec::new(),
        }
    }
}

impl<T: Clone + PartialEq, K: Clone + Ord> Delta<T, K> {
    /// Computes the delta that turns `old` into `new`.
    pub fn between(old: &BTreeMap<K, T>, new: &BTreeMap<K, T>) -> Self {
        let mut delta = Self::default();
        for (key, view) in new {
            match old.get(key) {
                None => delta.added.push(view.clone()),
                Some(prev) if prev != view => delta.modified.push(view.clone()),
                Some(_) => {}
            }
        }
        delta.removed = old
            .keys()
            .filter(|key| !new.contains_key(*key))
            .cloned()
            .collect();
        delta
    }

    /// Applies this delta to `target`, using `key` to index views.
    pub fn apply_to(&self, target: &mut BTreeMap<K, T>, key: impl Fn(&T) -> K) {
        for id in &self.removed {
            target.remove(id);
        }
        for view in self.added.iter().chain(&self.modified) {
            target.insert(key(view), view.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

/// The payload of a `lobby_delta` push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyDelta {
    pub rooms: Delta<RoomView, RoomId>,
    pub users: Delta<UserView, AccountId>,
}

impl LobbyDelta {
    /// The delta that turns snapshot `old` into `new`.
    pub fn between(old: &LobbyView, new: &LobbyView) -> Self {
        Self {
            rooms: Delta::between(&old.rooms, &new.rooms),
            users: Delta::between(&old.users, &new.users),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty() && self.users.is_empty()
    }
}

/// A client-side mirror of the lobby, kept current by applying deltas.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LobbyView {
    pub rooms: BTreeMap<RoomId, RoomView>,
    pub users: BTreeMap<AccountId, UserView>,
}

impl LobbyView {
    /// Indexes full room and user listings.
    pub fn from_views(
        rooms: impl IntoIterator<Item = RoomView>,
        users: impl IntoIterator<Item = UserView>,
    ) -> Self {
        Self {
            rooms: rooms.into_iter().map(|r| (r.id.clone(), r)).collect(),
            users: users.into_iter().map(|u| (u.id.clone(), u)).collect(),
        }
    }

    pub fn apply(&mut self, delta: &LobbyDelta) {
        delta.rooms.apply_to(&mut self.rooms, |r| r.id.clone());
        delta.users.apply_to(&mut self.users, |u| u.id.clone());
    }
}
