//! Length-prefixed TCP transport.
//!
//! Every message is a frame: a 4-byte big-endian body length followed by
//! the body. Bodies are JSON documents, but this layer only sees bytes.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::{next_connection_id, Connection, ConnectionId, Transport, TransportError};

/// Largest accepted frame body (50 MiB). Game artifacts travel inside
/// single frames, so the limit is generous.
pub const MAX_FRAME_LEN: usize = 50 * 1024 * 1024;

/// A framed TCP [`Transport`] that listens for incoming connections.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self { listener })
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;

    async fn accept(&mut self) -> Result<TcpConnection, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        let conn = TcpConnection::from_stream(stream, addr);
        tracing::debug!(id = %conn.id, %addr, "accepted TCP connection");
        Ok(conn)
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// A single framed TCP connection, usable from either end.
pub struct TcpConnection {
    id: ConnectionId,
    peer: SocketAddr,
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
}

impl TcpConnection {
    /// Opens a client connection to `addr`.
    pub async fn connect(addr: &str) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        let peer = stream.peer_addr().map_err(TransportError::AcceptFailed)?;
        let conn = Self::from_stream(stream, peer);
        tracing::debug!(id = %conn.id, %peer, "connected");
        Ok(conn)
    }

    fn from_stream(stream: TcpStream, peer: SocketAddr) -> Self {
        let _ = stream.set_nodelay(true);
        let (reader, writer) = stream.into_split();
        Self {
            id: next_connection_id(),
            peer,
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
        }
    }

    /// Returns the remote address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Connection for TcpConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if data.len() > MAX_FRAME_LEN {
            return Err(TransportError::FrameTooLarge(data.len()));
        }
        let mut frame = Vec::with_capacity(4 + data.len());
        frame.extend_from_slice(&(data.len() as u32).to_be_bytes());
        frame.extend_from_slice(data);

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&frame)
            .await
            .map_err(TransportError::SendFailed)?;
        writer.flush().await.map_err(TransportError::SendFailed)
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut reader = self.reader.lock().await;
        let len = match reader.read_u32().await {
            Ok(len) => len as usize,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None);
            }
            Err(e) => return Err(TransportError::ReceiveFailed(e)),
        };
        if len == 0 {
            return Err(TransportError::InvalidFrame("empty frame".into()));
        }
        if len > MAX_FRAME_LEN {
            return Err(TransportError::FrameTooLarge(len));
        }

        let mut body = vec![0u8; len];
        reader
            .read_exact(&mut body)
            .await
            .map_err(TransportError::ReceiveFailed)?;
        Ok(Some(body))
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
