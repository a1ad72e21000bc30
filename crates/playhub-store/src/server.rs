//! The store service loop.

use std::sync::Arc;

use playhub_protocol::{Codec, JsonCodec, StoreData, StoreRequest, StoreResponse};
use playhub_transport::{Connection, Transport};

use crate::{DataStore, StoreError};

/// Serves [`StoreRequest`]s from any transport against a [`DataStore`].
pub struct StoreServer<S: DataStore> {
    store: Arc<S>,
    codec: JsonCodec,
}

impl<S: DataStore> StoreServer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            codec: JsonCodec,
        }
    }

    /// Accepts connections forever, one task per connection.
    pub async fn run<T: Transport>(self, mut transport: T) -> Result<(), StoreError> {
        let server = Arc::new(self);
        tracing::info!(addr = ?transport.local_addr().ok(), "store service running");

        loop {
            match transport.accept().await {
                Ok(conn) => {
                    let server = Arc::clone(&server);
                    tokio::spawn(async move {
                        if let Err(e) = server.serve(conn).await {
                            tracing::debug!(error = %e, "store connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }

    async fn serve<C: Connection>(&self, conn: C) -> Result<(), StoreError> {
        let conn_id = conn.id();
        tracing::debug!(%conn_id, "store client connected");

        while let Some(data) = conn.recv().await? {
            let response = match self.codec.decode::<StoreRequest>(&data) {
                Ok(request) => handle_request(self.store.as_ref(), request).await,
                Err(e) => StoreResponse::Error {
                    message: e.to_string(),
                },
            };
            conn.send(&self.codec.encode(&response)?).await?;
        }

        tracing::debug!(%conn_id, "store client disconnected");
        Ok(())
    }
}

/// Executes one request and turns the result into a wire response.
pub async fn handle_request<S: DataStore + ?Sized>(
    store: &S,
    request: StoreRequest,
) -> StoreResponse {
    let result = match request {
        StoreRequest::Get { collection, id } => store
            .get(collection, &id)
            .await
            .map(|record| StoreData::Record { record }),
        StoreRequest::List { collection } => store
            .list(collection)
            .await
            .map(|records| StoreData::Records { records }),
        StoreRequest::Put {
            collection,
            id,
            value,
        } => store
            .put(collection, &id, value)
            .await
            .map(|revision| StoreData::Revision {
                revision: Some(revision),
            }),
        StoreRequest::CompareAndSet {
            collection,
            id,
            expected,
            value,
        } => store
            .compare_and_set(collection, &id, expected, value)
            .await
            .map(|revision| StoreData::Revision { revision }),
        StoreRequest::Delete { collection, id } => store
            .delete(collection, &id)
            .await
            .map(|existed| StoreData::Deleted { existed }),
    };

    match result {
        Ok(data) => StoreResponse::Ok { data },
        Err(StoreError::Conflict { current }) => StoreResponse::Conflict { current },
        Err(e) => {
            tracing::warn!(error = %e, "store request failed");
            StoreResponse::Error {
                message: e.to_string(),
            }
        }
    }
}
