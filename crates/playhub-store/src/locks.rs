//! Per-key async mutexes.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A set of async mutexes, one per key, created on demand.
///
/// Used to serialize work per account name, per room and per game while
/// letting work on different keys proceed in parallel. The outer map is a
/// plain `std` mutex held only long enough to find or update an entry.
/// Each entry counts the holders and waiters of its key and is removed
/// when the last of them goes away, including waiters that are cancelled
/// before they acquire the lock.
pub struct KeyedLocks<K> {
    inner: Mutex<HashMap<K, Slot>>,
}

struct Slot {
    mutex: Arc<AsyncMutex<()>>,
    users: usize,
}

/// Holds the lock for one key until dropped.
pub struct KeyedGuard<'a, K: Eq + Hash> {
    // Field order matters: the lock is released before the claim is given up.
    _guard: OwnedMutexGuard<()>,
    _claim: Claim<'a, K>,
}

/// One registered user of a key, held from before the wait until the
/// guard (or the abandoned wait) is dropped.
struct Claim<'a, K: Eq + Hash> {
    locks: &'a KeyedLocks<K>,
    key: K,
}

impl<K: Eq + Hash> KeyedLocks<K> {
    fn map(&self) -> MutexGuard<'_, HashMap<K, Slot>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Waits for exclusive access to `key`.
    pub async fn lock(&self, key: K) -> KeyedGuard<'_, K> {
        let mutex = {
            let mut map = self.map();
            let slot = map.entry(key.clone()).or_insert_with(|| Slot {
                mutex: Arc::default(),
                users: 0,
            });
            slot.users += 1;
            Arc::clone(&slot.mutex)
        };
        let claim = Claim { locks: self, key };
        let guard = mutex.lock_owned().await;
        KeyedGuard {
            _guard: guard,
            _claim: claim,
        }
    }

    /// Number of keys currently tracked (locked or being waited on).
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash> Drop for Claim<'_, K> {
    fn drop(&mut self) {
        let mut map = self.locks.map();
        let Some(slot) = map.get_mut(&self.key) else { return };
        slot.users -= 1;
        if slot.users == 0 {
            map.remove(&self.key);
        }
    }
}
