//! WebSocket transport for browser and script clients.
//!
//! One WebSocket message carries one envelope, so no extra framing is
//! needed. Outgoing bodies are sent as text frames when they are valid
//! UTF-8 (always the case for JSON) and as binary frames otherwise.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::{Connection, ConnectionId, MAX_FRAME_LEN, Transport, TransportError, next_connection_id};

/// How long a freshly accepted socket may take to finish the upgrade.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

/// A WebSocket [`Transport`] listening for client upgrades.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds a WebSocket listener to `addr`.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;

    async fn accept(&mut self) -> Result<WebSocketConnection, TransportError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let ws = match tokio::time::timeout(HANDSHAKE_TIMEOUT, tokio_tungstenite::accept_async(stream)).await {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => {
                tracing::debug!(%peer, error = %e, "WebSocket upgrade rejected");
                return Err(TransportError::AcceptFailed(ws_io(io::ErrorKind::ConnectionRefused, e)));
            }
            Err(_) => {
                tracing::debug!(%peer, "WebSocket upgrade timed out");
                return Err(TransportError::AcceptFailed(io::ErrorKind::TimedOut.into()));
            }
        };

        let (sink, source) = ws.split();
        let conn = WebSocketConnection {
            id: next_connection_id(),
            peer,
            sink: Mutex::new(sink),
            source: Mutex::new(source),
        };
        tracing::debug!(id = %conn.id, %peer, "accepted WebSocket connection");
        Ok(conn)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// One upgraded WebSocket client.
///
/// Sink and source sit behind separate locks so a task parked in
/// [`recv`](Connection::recv) never blocks pushes.
pub struct WebSocketConnection {
    id: ConnectionId,
    peer: SocketAddr,
    sink: Mutex<WsSink>,
    source: Mutex<WsSource>,
}

impl WebSocketConnection {
    /// The remote address of this client.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Connection for WebSocketConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if data.len() > MAX_FRAME_LEN {
            return Err(TransportError::FrameTooLarge(data.len()));
        }
        let message = match String::from_utf8(data.to_vec()) {
            Ok(text) => Message::Text(text.into()),
            Err(e) => Message::Binary(e.into_bytes().into()),
        };
        self.sink
            .lock()
            .await
            .send(message)
            .await
            .map_err(|e| TransportError::SendFailed(ws_io(io::ErrorKind::BrokenPipe, e)))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut source = self.source.lock().await;
        while let Some(message) = source.next().await {
            let body: Vec<u8> = match message {
                Ok(Message::Binary(data)) => data.into(),
                Ok(Message::Text(text)) => text.as_bytes().to_vec(),
                Ok(Message::Close(_)) => return Ok(None),
                // Ping and pong are answered by tungstenite itself.
                Ok(_) => continue,
                Err(tungstenite::Error::ConnectionClosed) => return Ok(None),
                Err(e) => {
                    return Err(TransportError::ReceiveFailed(ws_io(io::ErrorKind::ConnectionReset, e)));
                }
            };
            if body.len() > MAX_FRAME_LEN {
                return Err(TransportError::FrameTooLarge(body.len()));
            }
            return Ok(Some(body));
        }
        Ok(None)
    }

    async fn close(&self) -> Result<(), TransportError> {
        match self.sink.lock().await.close().await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(TransportError::SendFailed(ws_io(io::ErrorKind::BrokenPipe, e))),
        }
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

fn ws_io(kind: io::ErrorKind, e: tungstenite::Error) -> io::Error {
    io::Error::new(kind, e)
}
