//! Live session types.
//!
//! A session is runtime-only: who is logged in on which connection, and
//! how to reach that connection. Nothing here is persisted.

use playhub_protocol::{AccountId, AccountKind, ServerMessage};
use playhub_transport::ConnectionId;
use tokio::sync::mpsc;

/// Session behaviour knobs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Seconds a connection may stay silent before the service drops it.
    /// `0` disables the timeout.
    pub idle_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 300,
        }
    }
}

/// What a connection task is asked to do by the rest of the service.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Write this message to the peer.
    Push(ServerMessage),
    /// Close the connection after flushing earlier pushes.
    Close,
}

/// The address of one live connection.
///
/// Sends go into an unbounded channel drained by the connection's own
/// task, so delivering to a handle never blocks and never performs
/// network I/O on the caller's stack.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    connection_id: ConnectionId,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl SessionHandle {
    /// Creates a handle and the receiver its connection task drains.
    pub fn new(connection_id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { connection_id, tx }, rx)
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Best-effort push. Returns `false` if the connection task is gone.
    pub fn push(&self, message: ServerMessage) -> bool {
        self.tx.send(Outbound::Push(message)).is_ok()
    }

    /// Asks the connection task to close. Best effort.
    pub fn close(&self) -> bool {
        self.tx.send(Outbound::Close).is_ok()
    }

    /// Notifies the peer it has been superseded, then closes it.
    pub fn force_logout(&self, reason: &str) -> bool {
        let delivered = self.push(ServerMessage::ForceLogout {
            reason: reason.to_string(),
        });
        self.close() && delivered
    }
}

/// A logged-in account bound to one connection.
#[derive(Debug, Clone)]
pub struct Session {
    pub account_id: AccountId,
    pub name: String,
    pub kind: AccountKind,
    pub handle: SessionHandle,
}

impl Session {
    pub fn connection_id(&self) -> ConnectionId {
        self.handle.connection_id()
    }
}
