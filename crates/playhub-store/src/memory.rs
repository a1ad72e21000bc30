//! In-process store with optional JSON snapshot persistence.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use playhub_protocol::{Collection, Versioned};
use tokio::sync::Mutex;

use crate::{DataStore, StoreError};

type Table = BTreeMap<String, Versioned>;
type Snapshot = BTreeMap<Collection, Table>;

/// The authoritative store used by the store service (and directly by
/// tests).
///
/// Each collection sits behind its own `RwLock`, so reads of one
/// collection never wait on writes to another. Mutations are serialized
/// by `write_gate` so that the snapshot written after a mutation reflects
/// exactly that mutation and can be rolled back if the write fails.
pub struct MemoryStore {
    tables: [RwLock<Table>; 4],
    revision: AtomicU64,
    data_file: Option<PathBuf>,
    write_gate: Mutex<()>,
}

impl MemoryStore {
    /// A store that lives only in memory.
    pub fn new() -> Self {
        Self::with_snapshot(Snapshot::new(), None)
    }

    /// Opens a store persisted at `path`, loading it if the file exists.
    ///
    /// # Errors
    /// [`StoreError::Persistence`] if the file exists but cannot be read,
    /// [`StoreError::Encoding`] if it is not a valid snapshot.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(StoreError::Persistence)?;
        }
        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Snapshot>(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::new(),
            Err(e) => return Err(StoreError::Persistence(e)),
        };
        let records: usize = snapshot.values().map(BTreeMap::len).sum();
        tracing::info!(path = %path.display(), records, "data store loaded");
        Ok(Self::with_snapshot(snapshot, Some(path)))
    }

    fn with_snapshot(mut snapshot: Snapshot, data_file: Option<PathBuf>) -> Self {
        let high = snapshot
            .values()
            .flat_map(BTreeMap::values)
            .map(|v| v.revision)
            .max()
            .unwrap_or(0);
        let tables = Collection::ALL.map(|c| RwLock::new(snapshot.remove(&c).unwrap_or_default()));
        Self {
            tables,
            revision: AtomicU64::new(high),
            data_file,
            write_gate: Mutex::new(()),
        }
    }

    fn read(&self, collection: Collection) -> RwLockReadGuard<'_, Table> {
        self.tables[index(collection)]
            .read()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self, collection: Collection) -> RwLockWriteGuard<'_, Table> {
        self.tables[index(collection)]
            .write()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Replaces one entry, returning what was there before.
    fn swap(
        &self,
        collection: Collection,
        id: &str,
        entry: Option<Versioned>,
    ) -> Option<Versioned> {
        let mut table = self.write(collection);
        match entry {
            Some(v) => table.insert(id.to_string(), v),
            None => table.remove(id),
        }
    }

    /// Writes the snapshot; on failure puts `previous` back.
    async fn commit(
        &self,
        collection: Collection,
        id: &str,
        previous: Option<Versioned>,
    ) -> Result<(), StoreError> {
        let Some(path) = &self.data_file else {
            return Ok(());
        };
        if let Err(e) = self.persist(path).await {
            tracing::error!(%collection, id, error = %e, "snapshot write failed, rolling back");
            self.swap(collection, id, previous);
            return Err(e);
        }
        Ok(())
    }

    async fn persist(&self, path: &Path) -> Result<(), StoreError> {
        let snapshot: Snapshot = Collection::ALL
            .iter()
            .map(|&c| (c, self.read(c).clone()))
            .collect();
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(StoreError::Persistence)?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(StoreError::Persistence)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn index(collection: Collection) -> usize {
    match collection {
        Collection::User => 0,
        Collection::Developer => 1,
        Collection::Room => 2,
        Collection::Game => 3,
    }
}

impl DataStore for MemoryStore {
    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Versioned>, StoreError> {
        Ok(self.read(collection).get(id).cloned())
    }

    async fn list(
        &self,
        collection: Collection,
    ) -> Result<BTreeMap<String, Versioned>, StoreError> {
        Ok(self.read(collection).clone())
    }

    async fn put(
        &self,
        collection: Collection,
        id: &str,
        value: serde_json::Value,
    ) -> Result<u64, StoreError> {
        let _gate = self.write_gate.lock().await;
        let revision = self.next_revision();
        let previous = self.swap(collection, id, Some(Versioned { revision, value }));
        self.commit(collection, id, previous).await?;
        tracing::debug!(%collection, id, revision, "put");
        Ok(revision)
    }

    async fn compare_and_set(
        &self,
        collection: Collection,
        id: &str,
        expected: Option<u64>,
        value: Option<serde_json::Value>,
    ) -> Result<Option<u64>, StoreError> {
        let _gate = self.write_gate.lock().await;
        let current = self.read(collection).get(id).map(|v| v.revision);
        if current != expected {
            return Err(StoreError::Conflict { current });
        }

        let revision = value.as_ref().map(|_| self.next_revision());
        let entry = value.map(|value| Versioned {
            revision: revision.unwrap_or_default(),
            value,
        });
        let previous = self.swap(collection, id, entry);
        self.commit(collection, id, previous).await?;
        tracing::debug!(%collection, id, ?expected, ?revision, "compare-and-set");
        Ok(revision)
    }

    async fn delete(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<bool, StoreError> {
        let _gate = self.write_gate.lock().await;
        let previous = self.swap(collection, id, None);
        let existed = previous.is_some();
        if existed {
            self.commit(collection, id, previous).await?;
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("playhub-store-{}", uuid::Uuid::new_v4()))
            .join("data.json")
    }

    #[tokio::test]
    async fn test_put_then_get_returns_value_and_revision() {
        let store = MemoryStore::new();
        let rev = store.put(Collection::User, "u1", json!({"name": "ann"})).await.unwrap();

        let got = store.get(Collection::User, "u1").await.unwrap().unwrap();
        assert_eq!(got.revision, rev);
        assert_eq!(got.value["name"], "ann");
    }

    #[tokio::test]
    async fn test_collections_are_independent() {
        let store = MemoryStore::new();
        store.put(Collection::User, "same", json!(1)).await.unwrap();

        assert!(store.get(Collection::Developer, "same").await.unwrap().is_none());
        assert_eq!(store.list(Collection::User).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_compare_and_set_create_fails_if_exists() {
        let store = MemoryStore::new();
        let rev = store
            .compare_and_set(Collection::Game, "g", None, Some(json!(1)))
            .await
            .unwrap();

        let err = store
            .compare_and_set(Collection::Game, "g", None, Some(json!(2)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { current } if current == rev));
    }

    #[tokio::test]
    async fn test_compare_and_set_stale_revision_conflicts() {
        let store = MemoryStore::new();
        let first = store.put(Collection::Room, "r", json!(1)).await.unwrap();
        store.put(Collection::Room, "r", json!(2)).await.unwrap();

        let result = store
            .compare_and_set(Collection::Room, "r", Some(first), Some(json!(3)))
            .await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
        let got = store.get(Collection::Room, "r").await.unwrap().unwrap();
        assert_eq!(got.value, json!(2));
    }

    #[tokio::test]
    async fn test_compare_and_set_none_value_deletes() {
        let store = MemoryStore::new();
        let rev = store.put(Collection::Room, "r", json!(1)).await.unwrap();

        let result = store
            .compare_and_set(Collection::Room, "r", Some(rev), None)
            .await
            .unwrap();
        assert_eq!(result, None);
        assert!(store.get(Collection::Room, "r").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revisions_never_reused_after_delete() {
        let store = MemoryStore::new();
        let first = store.put(Collection::Room, "r", json!(1)).await.unwrap();
        store.delete(Collection::Room, "r").await.unwrap();
        let second = store.put(Collection::Room, "r", json!(1)).await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_open_reloads_persisted_snapshot() {
        let path = temp_path();
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();

        let rev = {
            let store = MemoryStore::open(&path).await.unwrap();
            store.put(Collection::Game, "g1", json!({"name": "Snake"})).await.unwrap()
        };

        let reopened = MemoryStore::open(&path).await.unwrap();
        let got = reopened.get(Collection::Game, "g1").await.unwrap().unwrap();
        assert_eq!(got.revision, rev);
        assert_eq!(got.value["name"], "Snake");

        let next = reopened.put(Collection::Game, "g2", json!(0)).await.unwrap();
        assert!(next > rev);
    }

    #[tokio::test]
    async fn test_failed_persist_rolls_back_mutation() {
        let path = temp_path();
        let store = MemoryStore::open(&path).await.unwrap();
        // Pull the directory out from under the store so the snapshot write fails.
        tokio::fs::remove_dir_all(path.parent().unwrap()).await.unwrap();

        let result = store.put(Collection::User, "u1", json!(1)).await;
        assert!(matches!(result, Err(StoreError::Persistence(_))));
        assert!(store.get(Collection::User, "u1").await.unwrap().is_none());
    }
}
