//! Transport abstraction layer for Playhub.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! the two socket flavours the services speak:
//!
//! - [`TcpTransport`]: 4-byte big-endian length prefix + JSON body. Used
//!   between the services and the data store, and by terminal clients.
//! - [`WebSocketTransport`]: one message per WebSocket frame.
//!
//! Each connection locks its read and write halves separately, so a task
//! parked in [`Connection::recv`] never delays a push sent from another task.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

mod error;
mod tcp;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use tcp::{TcpConnection, TcpTransport, MAX_FRAME_LEN};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique connection IDs across all transports.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_connection_id() -> ConnectionId {
    ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
}

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// Waits for and accepts the next incoming connection.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;

    /// Returns the address the transport is listening on.
    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}

/// A single connection that can send and receive whole messages.
///
/// The futures are `Send` so connection handlers generic over the transport
/// can be handed to `tokio::spawn`.
pub trait Connection: Send + Sync + 'static {
    /// Sends one message to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Closes the write side of the connection.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
