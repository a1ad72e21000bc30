//! The [`DataStore`] trait and typed record helpers built on it.

use std::collections::BTreeMap;
use std::future::Future;

use playhub_protocol::{Collection, Versioned};
use serde::{Serialize, de::DeserializeOwned};

use crate::StoreError;

/// How many times [`update_record`] retries after losing a
/// compare-and-set race before giving up with
/// [`StoreError::Contention`].
pub const MAX_CAS_RETRIES: usize = 16;

/// A revisioned document store.
///
/// Implemented in-process by [`MemoryStore`](crate::MemoryStore) and over
/// the network by [`RemoteStore`](crate::RemoteStore). Services are
/// generic over this trait so tests run against memory and binaries
/// against the store service.
///
/// The returned futures are `Send` so callers can hold a store inside
/// state that is moved into `tokio::spawn`.
pub trait DataStore: Send + Sync + 'static {
    /// Fetches one record.
    fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> impl Future<Output = Result<Option<Versioned>, StoreError>> + Send;

    /// Fetches every record in a collection, keyed by id.
    fn list(
        &self,
        collection: Collection,
    ) -> impl Future<Output = Result<BTreeMap<String, Versioned>, StoreError>> + Send;

    /// Writes unconditionally and returns the new revision.
    fn put(
        &self,
        collection: Collection,
        id: &str,
        value: serde_json::Value,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Writes (or deletes, when `value` is `None`) only if the record is at
    /// revision `expected` (`None` = must not exist).
    ///
    /// Returns the new revision, or `None` after a delete.
    ///
    /// # Errors
    /// [`StoreError::Conflict`] if the record moved on.
    fn compare_and_set(
        &self,
        collection: Collection,
        id: &str,
        expected: Option<u64>,
        value: Option<serde_json::Value>,
    ) -> impl Future<Output = Result<Option<u64>, StoreError>> + Send;

    /// Deletes unconditionally. Returns whether the record existed.
    fn delete(
        &self,
        collection: Collection,
        id: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

/// A decoded record and its revision.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<T> {
    pub revision: u64,
    pub value: T,
}

/// What an [`update_record`] closure wants done with the record.
#[derive(Debug)]
pub enum Mutation<T> {
    /// Write this value back.
    Write(T),
    /// Delete the record.
    Delete,
    /// Leave the record untouched.
    Keep,
}

/// Reads and decodes one record.
pub async fn get_record<T, S>(
    store: &S,
    collection: Collection,
    id: &str,
) -> Result<Option<Record<T>>, StoreError>
where
    T: DeserializeOwned,
    S: DataStore + ?Sized,
{
    match store.get(collection, id).await? {
        Some(versioned) => Ok(Some(Record {
            revision: versioned.revision,
            value: serde_json::from_value(versioned.value)?,
        })),
        None => Ok(None),
    }
}

/// Reads and decodes a whole collection.
pub async fn list_records<T, S>(
    store: &S,
    collection: Collection,
) -> Result<Vec<T>, StoreError>
where
    T: DeserializeOwned,
    S: DataStore + ?Sized,
{
    store
        .list(collection)
        .await?
        .into_values()
        .map(|v| serde_json::from_value(v.value).map_err(StoreError::from))
        .collect()
}

/// Creates a record that must not exist yet.
///
/// # Errors
/// [`StoreError::Conflict`] if the id is already taken.
pub async fn create_record<T, S>(
    store: &S,
    collection: Collection,
    id: &str,
    value: &T,
) -> Result<u64, StoreError>
where
    T: Serialize,
    S: DataStore + ?Sized,
{
    let value = serde_json::to_value(value)?;
    store
        .compare_and_set(collection, id, None, Some(value))
        .await?
        .ok_or(StoreError::UnexpectedResponse)
}

/// Read-modify-write on one record.
///
/// `f` sees the current value (`None` if absent) and returns the mutation
/// to apply plus a result for the caller. The write is a compare-and-set
/// against the revision that was read; on conflict the record is re-read
/// and `f` runs again, so `f` must be free of side effects.
///
/// Domain errors returned by `f` abort the loop without writing.
pub async fn update_record<T, R, E, S, F>(
    store: &S,
    collection: Collection,
    id: &str,
    mut f: F,
) -> Result<R, E>
where
    T: Serialize + DeserializeOwned,
    E: From<StoreError>,
    S: DataStore + ?Sized,
    F: FnMut(Option<T>) -> Result<(Mutation<T>, R), E>,
{
    for attempt in 0..MAX_CAS_RETRIES {
        let current = get_record::<T, S>(store, collection, id).await?;
        let expected = current.as_ref().map(|r| r.revision);
        let (mutation, result) = f(current.map(|r| r.value))?;

        let value = match mutation {
            Mutation::Keep => return Ok(result),
            Mutation::Delete if expected.is_none() => return Ok(result),
            Mutation::Delete => None,
            Mutation::Write(v) => Some(serde_json::to_value(v).map_err(StoreError::from)?),
        };

        match store.compare_and_set(collection, id, expected, value).await {
            Ok(_) => return Ok(result),
            Err(StoreError::Conflict { current }) => {
                tracing::debug!(
                    %collection,
                    id,
                    attempt,
                    ?current,
                    "compare-and-set conflict, retrying"
                );
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(StoreError::Contention {
        collection,
        id: id.to_string(),
    }
    .into())
}
