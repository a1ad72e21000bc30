//! Client for the store service.

use std::collections::BTreeMap;
use std::time::Duration;

use playhub_protocol::{
    Codec, Collection, JsonCodec, StoreData, StoreRequest, StoreResponse, Versioned,
};
use playhub_transport::{Connection, TcpConnection, TransportError};
use tokio::sync::Mutex;

use crate::{DataStore, StoreError};

/// A [`DataStore`] backed by a store service over framed TCP.
///
/// One request is in flight at a time. If the connection breaks or a
/// request times out the connection is dropped and the next request
/// dials again.
pub struct RemoteStore {
    addr: String,
    timeout: Duration,
    conn: Mutex<Option<TcpConnection>>,
    codec: JsonCodec,
}

impl RemoteStore {
    /// Connects to the store service at `addr`.
    pub async fn connect(addr: &str, timeout: Duration) -> Result<Self, StoreError> {
        let conn = TcpConnection::connect(addr).await?;
        tracing::info!(addr, "connected to data store");
        Ok(Self {
            addr: addr.to_string(),
            timeout,
            conn: Mutex::new(Some(conn)),
            codec: JsonCodec,
        })
    }

    async fn request(&self, request: StoreRequest) -> Result<StoreData, StoreError> {
        let body = self.codec.encode(&request)?;
        let mut slot = self.conn.lock().await;
        if slot.is_none() {
            *slot = Some(TcpConnection::connect(&self.addr).await?);
            tracing::info!(addr = %self.addr, "reconnected to data store");
        }
        let Some(conn) = slot.as_ref() else {
            return Err(StoreError::UnexpectedResponse);
        };

        let exchange = async {
            conn.send(&body).await?;
            conn.recv().await
        };
        let outcome = tokio::time::timeout(self.timeout, exchange).await;
        let reply = match outcome {
            Ok(Ok(Some(reply))) => reply,
            Ok(Ok(None)) => {
                *slot = None;
                return Err(StoreError::Transport(TransportError::ConnectionClosed(
                    "store closed the connection".into(),
                )));
            }
            Ok(Err(e)) => {
                *slot = None;
                return Err(e.into());
            }
            Err(_) => {
                *slot = None;
                return Err(StoreError::Timeout);
            }
        };
        drop(slot);

        match self.codec.decode::<StoreResponse>(&reply)? {
            StoreResponse::Ok { data } => Ok(data),
            StoreResponse::Conflict { current } => Err(StoreError::Conflict { current }),
            StoreResponse::Error { message } => Err(StoreError::Remote(message)),
        }
    }
}

impl DataStore for RemoteStore {
    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Versioned>, StoreError> {
        let request = StoreRequest::Get {
            collection,
            id: id.to_string(),
        };
        match self.request(request).await? {
            StoreData::Record { record } => Ok(record),
            _ => Err(StoreError::UnexpectedResponse),
        }
    }

    async fn list(
        &self,
        collection: Collection,
    ) -> Result<BTreeMap<String, Versioned>, StoreError> {
        match self.request(StoreRequest::List { collection }).await? {
            StoreData::Records { records } => Ok(records),
            _ => Err(StoreError::UnexpectedResponse),
        }
    }

    async fn put(
        &self,
        collection: Collection,
        id: &str,
        value: serde_json::Value,
    ) -> Result<u64, StoreError> {
        let request = StoreRequest::Put {
            collection,
            id: id.to_string(),
            value,
        };
        match self.request(request).await? {
            StoreData::Revision {
                revision: Some(revision),
            } => Ok(revision),
            _ => Err(StoreError::UnexpectedResponse),
        }
    }

    async fn compare_and_set(
        &self,
        collection: Collection,
        id: &str,
        expected: Option<u64>,
        value: Option<serde_json::Value>,
    ) -> Result<Option<u64>, StoreError> {
        let request = StoreRequest::CompareAndSet {
            collection,
            id: id.to_string(),
            expected,
            value,
        };
        match self.request(request).await? {
            StoreData::Revision { revision } => Ok(revision),
            _ => Err(StoreError::UnexpectedResponse),
        }
    }

    async fn delete(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<bool, StoreError> {
        let request = StoreRequest::Delete {
            collection,
            id: id.to_string(),
        };
        match self.request(request).await? {
            StoreData::Deleted { existed } => Ok(existed),
            _ => Err(StoreError::UnexpectedResponse),
        }
    }
}
