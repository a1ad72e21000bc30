//! The live-session table.
//!
//! One entry per account id, at most. The table is split into
//! [`SHARD_COUNT`] shards by account-id hash; each shard is a plain
//! `std` mutex that is never held across an `.await`, so a login for one
//! account never waits on a login for an unrelated one and never waits on
//! a slow peer.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};

use playhub_protocol::{AccountId, AccountKind, ServerMessage};
use playhub_store::{DataStore, KeyedLocks};
use playhub_transport::ConnectionId;

use crate::{Session, SessionConfig};

/// Number of independently locked shards in the live table.
pub const SHARD_COUNT: usize = 16;

/// Reason sent to a connection that loses its session to a newer login.
pub const KICK_REASON: &str = "logged in from another connection";

type Shard = Mutex<HashMap<AccountId, Session>>;

/// Result of [`SessionRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    /// `true` if a session on another connection was superseded.
    pub kicked_previous: bool,
}

/// Accounts plus the process-wide table of live sessions.
///
/// ```text
/// authenticate() ──→ register() ──→ … requests … ──→ unregister()
///                        │
///                        └─ existing entry? swap it, force_logout + close
///                           the old connection (channel sends only)
/// ```
pub struct SessionRegistry<S: DataStore> {
    pub(crate) store: Arc<S>,
    pub(crate) name_locks: KeyedLocks<(AccountKind, String)>,
    shards: Vec<Shard>,
    config: SessionConfig,
}

impl<S: DataStore> SessionRegistry<S> {
    pub fn new(store: Arc<S>, config: SessionConfig) -> Self {
        Self {
            store,
            name_locks: KeyedLocks::new(),
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn shard(&self, account_id: &AccountId) -> MutexGuard<'_, HashMap<AccountId, Session>> {
        let mut hasher = DefaultHasher::new();
        account_id.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        self.shards[index].lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Makes `session` the one live session for its account.
    ///
    /// If another connection holds the account, that connection is sent
    /// `force_logout` and a close signal and its entry is replaced, all
    /// inside the shard's critical section. Both sends are non-blocking
    /// channel writes; whether they are delivered does not affect the
    /// swap.
    pub fn register(&self, session: Session) -> Registration {
        let account_id = session.account_id.clone();
        let connection_id = session.connection_id();

        let mut shard = self.shard(&account_id);
        let kicked = match shard.get(&account_id) {
            Some(old) if old.connection_id() != connection_id => {
                if !old.handle.force_logout(KICK_REASON) {
                    tracing::warn!(
                        %account_id,
                        old = %old.connection_id(),
                        "superseded connection already gone"
                    );
                }
                Some(old.connection_id())
            }
            _ => None,
        };
        shard.insert(account_id.clone(), session);
        drop(shard);

        match kicked {
            Some(old) => tracing::info!(
                %account_id,
                %old,
                new = %connection_id,
                "session replaced, previous connection kicked"
            ),
            None => tracing::info!(%account_id, %connection_id, "session registered"),
        }
        Registration {
            kicked_previous: kicked.is_some(),
        }
    }

    /// Removes the account's session if it still belongs to
    /// `connection_id`. A stale unregister from a kicked connection is a
    /// no-op. Returns whether an entry was removed.
    pub fn unregister(&self, account_id: &AccountId, connection_id: ConnectionId) -> bool {
        let mut shard = self.shard(account_id);
        let owned = shard
            .get(account_id)
            .is_some_and(|s| s.connection_id() == connection_id);
        if owned {
            shard.remove(account_id);
            drop(shard);
            tracing::info!(%account_id, %connection_id, "session unregistered");
        } else {
            tracing::debug!(%account_id, %connection_id, "stale unregister ignored");
        }
        owned
    }

    /// The live session for an account, if any.
    pub fn lookup(&self, account_id: &AccountId) -> Option<Session> {
        self.shard(account_id).get(account_id).cloned()
    }

    /// Whether `connection_id` still owns the account's session.
    pub fn is_current(&self, account_id: &AccountId, connection_id: ConnectionId) -> bool {
        self.shard(account_id)
            .get(account_id)
            .is_some_and(|s| s.connection_id() == connection_id)
    }

    /// Every live session.
    pub fn online(&self) -> Vec<Session> {
        self.shards
            .iter()
            .flat_map(|shard| {
                shard
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .values()
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Pushes a message to one account. Returns `false` if it is offline
    /// or its connection task is gone.
    pub fn send_to(&self, account_id: &AccountId, message: ServerMessage) -> bool {
        self.lookup(account_id)
            .is_some_and(|s| s.handle.push(message))
    }

    /// Pushes a message to every live session. Returns how many accepted it.
    pub fn broadcast(&self, message: &ServerMessage) -> usize {
        let delivered = self
            .online()
            .iter()
            .filter(|s| s.handle.push(message.clone()))
            .count();
        tracing::debug!(delivered, "broadcast");
        delivered
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().unwrap_or_else(|e| e.into_inner()).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use playhub_store::MemoryStore;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::{Outbound, SessionHandle};

    fn registry() -> SessionRegistry<MemoryStore> {
        SessionRegistry::new(Arc::new(MemoryStore::new()), SessionConfig::default())
    }

    fn session(account: &str, conn: u64) -> (Session, UnboundedReceiver<Outbound>) {
        let (handle, rx) = SessionHandle::new(ConnectionId::new(conn));
        let session = Session {
            account_id: AccountId::from(account),
            name: account.to_string(),
            kind: AccountKind::Player,
            handle,
        };
        (session, rx)
    }

    #[test]
    fn test_register_first_session_kicks_nobody() {
        let reg = registry();
        let (s, _rx) = session("a", 1);

        assert!(!reg.register(s).kicked_previous);
        assert!(reg.is_current(&AccountId::from("a"), ConnectionId::new(1)));
    }

    #[test]
    fn test_register_second_connection_kicks_first() {
        let reg = registry();
        let (s1, mut rx1) = session("a", 1);
        let (s2, _rx2) = session("a", 2);
        reg.register(s1);

        let outcome = reg.register(s2);

        assert!(outcome.kicked_previous);
        assert!(matches!(
            rx1.try_recv().unwrap(),
            Outbound::Push(ServerMessage::ForceLogout { .. })
        ));
        assert_eq!(rx1.try_recv().unwrap(), Outbound::Close);
        assert!(!reg.is_current(&AccountId::from("a"), ConnectionId::new(1)));
        assert!(reg.is_current(&AccountId::from("a"), ConnectionId::new(2)));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_register_kick_proceeds_when_old_peer_gone() {
        let reg = registry();
        let (s1, rx1) = session("a", 1);
        drop(rx1);
        reg.register(s1);

        let (s2, _rx2) = session("a", 2);
        assert!(reg.register(s2).kicked_previous);
        assert!(reg.is_current(&AccountId::from("a"), ConnectionId::new(2)));
    }

    #[test]
    fn test_register_same_connection_again_is_not_a_kick() {
        let reg = registry();
        let (s1, mut rx) = session("a", 1);
        reg.register(s1.clone());

        assert!(!reg.register(s1).kicked_previous);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unregister_stale_connection_keeps_newer_session() {
        let reg = registry();
        let (s1, _rx1) = session("a", 1);
        let (s2, _rx2) = session("a", 2);
        reg.register(s1);
        reg.register(s2);

        assert!(!reg.unregister(&AccountId::from("a"), ConnectionId::new(1)));
        assert!(reg.lookup(&AccountId::from("a")).is_some());

        assert!(reg.unregister(&AccountId::from("a"), ConnectionId::new(2)));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_broadcast_reaches_every_session() {
        let reg = registry();
        let (s1, mut rx1) = session("a", 1);
        let (s2, mut rx2) = session("b", 2);
        reg.register(s1);
        reg.register(s2);

        let msg = ServerMessage::ForceLogout { reason: "x".into() };
        assert_eq!(reg.broadcast(&msg), 2);
        assert_eq!(rx1.try_recv().unwrap(), Outbound::Push(msg.clone()));
        assert_eq!(rx2.try_recv().unwrap(), Outbound::Push(msg));
    }

    #[test]
    fn test_send_to_offline_account_returns_false() {
        let reg = registry();
        assert!(!reg.send_to(&AccountId::from("ghost"), ServerMessage::Unknown));
    }
}
