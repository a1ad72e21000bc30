//! Error types for the data store.

use playhub_protocol::{Collection, ProtocolError};
use playhub_transport::TransportError;

/// Errors returned by [`DataStore`](crate::DataStore) implementations and
/// the typed record helpers.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A compare-and-set saw a different revision than expected.
    /// `current` is the revision the record is at now.
    #[error("revision conflict (current: {current:?})")]
    Conflict { current: Option<u64> },

    /// A read-modify-write lost the race too many times in a row.
    #[error("too much contention on {collection}/{id}")]
    Contention { collection: Collection, id: String },

    /// The snapshot file could not be read or written. The in-memory
    /// mutation that triggered the write has been rolled back.
    #[error("persistence failed: {0}")]
    Persistence(#[source] std::io::Error),

    /// A record did not match the shape the caller asked for.
    #[error("record encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The store service reported an error.
    #[error("store service error: {0}")]
    Remote(String),

    /// The store service answered with a body that does not fit the request.
    #[error("unexpected store response")]
    UnexpectedResponse,

    /// No answer within the configured request timeout.
    #[error("store request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl StoreError {
    /// Whether a failed write may still have been applied by the store.
    ///
    /// True when the request may have reached the store service but its
    /// answer was lost. Callers that compensate a failed write must
    /// re-read the record before undoing anything.
    pub fn is_indeterminate(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Transport(_) | Self::Protocol(_) | Self::UnexpectedResponse
        )
    }
}
