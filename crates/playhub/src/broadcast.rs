//! The Lobby Broadcast Layer.
//!
//! Keeps the last lobby snapshot it published and, on each change, pushes
//! only the difference to every live session. A session that comes online
//! first gets the whole snapshot as one delta of additions, so its mirror
//! has a baseline for the diffs that follow. Room-scoped events go to
//! that room's members only.

use playhub_protocol::{AccountId, LobbyDelta, LobbyView, RoomView, ServerMessage, UserView};
use playhub_session::SessionRegistry;
use playhub_store::DataStore;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
pub struct LobbyBroadcaster {
    published: Mutex<LobbyView>,
}

impl LobbyBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diffs `rooms` and `users` against the last published snapshot and
    /// pushes a `lobby_delta` to every session if anything changed.
    ///
    /// The snapshot lock is held while pushing, so every session sees
    /// deltas in the same order. Pushes are channel sends and never wait
    /// on a peer.
    pub async fn publish<S: DataStore>(
        &self,
        registry: &SessionRegistry<S>,
        rooms: Vec<RoomView>,
        users: Vec<UserView>,
    ) -> Option<LobbyDelta> {
        let next = LobbyView::from_views(rooms, users);
        let mut published = self.published.lock().await;
        let delta = LobbyDelta::between(&published, &next);
        if delta.is_empty() {
            return None;
        }
        *published = next;

        let reached = registry.broadcast(&ServerMessage::LobbyDelta(delta.clone()));
        tracing::debug!(
            rooms_added = delta.rooms.added.len(),
            rooms_removed = delta.rooms.removed.len(),
            rooms_modified = delta.rooms.modified.len(),
            users_added = delta.users.added.len(),
            users_removed = delta.users.removed.len(),
            users_modified = delta.users.modified.len(),
            reached,
            "lobby delta published"
        );
        Some(delta)
    }

    /// Pushes the last published snapshot to `account_id` as a delta that
    /// adds everything. Returns whether anything was sent.
    ///
    /// Sent under the snapshot lock, so it is ordered with respect to
    /// every `publish`. Deltas that reached the session before the
    /// baseline are a subset of it, and deltas apply idempotently, so the
    /// mirror converges either way.
    pub async fn welcome<S: DataStore>(
        &self,
        registry: &SessionRegistry<S>,
        account_id: &AccountId,
    ) -> bool {
        let published = self.published.lock().await;
        let baseline = LobbyDelta::between(&LobbyView::default(), &published);
        if baseline.is_empty() {
            return false;
        }
        let sent = registry.send_to(account_id, ServerMessage::LobbyDelta(baseline));
        tracing::debug!(
            %account_id,
            rooms = published.rooms.len(),
            users = published.users.len(),
            sent,
            "lobby baseline sent"
        );
        sent
    }

    /// The last published snapshot.
    pub async fn snapshot(&self) -> LobbyView {
        self.published.lock().await.clone()
    }

    /// Pushes `message` to each of `members` that is online. Returns how
    /// many were reached.
    pub fn notify_members<S: DataStore>(
        &self,
        registry: &SessionRegistry<S>,
        members: &[AccountId],
        message: &ServerMessage,
    ) -> usize {
        let mut reached = 0;
        for member in members {
            if registry.send_to(member, message.clone()) {
                reached += 1;
            } else {
                tracing::debug!(account_id = %member, "room member not reachable");
            }
        }
        reached
    }
}
