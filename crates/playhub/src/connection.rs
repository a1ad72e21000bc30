//! Per-connection handling shared by the lobby and developer services.
//!
//! Each accepted connection gets its own Tokio task running [`serve`]:
//!
//! ```text
//!   reader task ──frames──┐
//!                         ├──→ select! ──→ dispatch() ──→ reply
//!   SessionHandle ──push──┘          └──→ write push / close
//! ```
//!
//! The reader lives in its own task because `recv` is not cancel-safe;
//! the select loop only ever waits on channels. Account actions
//! (`register`, `login`, `logout`) are handled here; everything else goes
//! to the service's [`Service::handle`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use playhub_protocol::{
    AccountKind, ClientRequest, Codec, Envelope, ErrorCode, JsonCodec, Outcome, ServerMessage,
};
use playhub_session::{Outbound, Session, SessionHandle, SessionRegistry};
use playhub_store::DataStore;
use playhub_transport::{
    Connection, ConnectionId, TcpTransport, Transport, TransportError, WebSocketTransport,
};
use serde_json::json;
use tokio::sync::mpsc;

use crate::{PlayhubError, TransportKind};

/// Frames buffered between the reader task and the connection loop.
const FRAME_BUFFER: usize = 32;

/// A client-facing service: the lobby or the developer service.
pub trait Service: Send + Sync + 'static {
    type Store: DataStore;

    /// The account kind this service logs in.
    fn kind(&self) -> AccountKind;

    fn registry(&self) -> &SessionRegistry<Self::Store>;

    /// Handles a request from a logged-in, current session.
    fn handle(
        &self,
        session: &Session,
        request: ClientRequest,
    ) -> impl Future<Output = Result<Outcome, PlayhubError>> + Send;

    /// Runs after `session` became the account's live session.
    fn logged_in(&self, session: &Session) -> impl Future<Output = ()> + Send;

    /// Runs after `session` was removed from the live table, on logout or
    /// disconnect. Not called for a connection that was kicked.
    fn logged_out(&self, session: &Session) -> impl Future<Output = ()> + Send;
}

/// Per-connection state.
#[derive(Debug)]
pub struct Client {
    handle: SessionHandle,
    session: Option<Session>,
}

impl Client {
    pub fn new(handle: SessionHandle) -> Self {
        Self {
            handle,
            session: None,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.handle.connection_id()
    }

    /// The session this connection logged in with, if any. It may have
    /// been superseded since.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }
}

/// What the connection loop does after a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Reply(Outcome),
    /// Reply, then close the connection.
    ReplyAndClose(Outcome),
    /// Send nothing.
    Ignore,
}

/// Routes one request.
pub async fn dispatch<S: Service>(
    service: &S,
    client: &mut Client,
    request: ClientRequest,
) -> Dispatch {
    let conn_id = client.connection_id();
    match request {
        ClientRequest::Unknown => {
            tracing::debug!(%conn_id, "unknown action dropped");
            Dispatch::Ignore
        }
        ClientRequest::Register { name, password } => {
            let result = service
                .registry()
                .register_account(service.kind(), &name, &password)
                .await;
            Dispatch::Reply(match result {
                Ok(account) => Outcome::with_data(json!({
                    "account_id": account.id,
                    "name": account.name,
                })),
                Err(e) => failure(&PlayhubError::from(e)),
            })
        }
        ClientRequest::Login { name, password } => {
            Dispatch::Reply(login(service, client, &name, &password).await)
        }
        ClientRequest::Logout => match client.session.take() {
            Some(session) => {
                end_session(service, &session).await;
                Dispatch::Reply(Outcome::ok())
            }
            None => Dispatch::Reply(not_authenticated()),
        },
        request => {
            let Some(session) = client.session.as_ref() else {
                return Dispatch::Reply(not_authenticated());
            };
            if !service
                .registry()
                .is_current(&session.account_id, session.connection_id())
            {
                tracing::info!(
                    %conn_id,
                    account_id = %session.account_id,
                    "request on superseded session"
                );
                client.session = None;
                return Dispatch::ReplyAndClose(not_authenticated());
            }
            match service.handle(session, request).await {
                Ok(outcome) => Dispatch::Reply(outcome),
                Err(e) => Dispatch::Reply(failure(&e)),
            }
        }
    }
}

async fn login<S: Service>(
    service: &S,
    client: &mut Client,
    name: &str,
    password: &str,
) -> Outcome {
    let account = match service
        .registry()
        .authenticate(service.kind(), name, password)
        .await
    {
        Ok(account) => account,
        Err(e) => return failure(&PlayhubError::from(e)),
    };

    // Switching accounts on one connection ends the previous login first.
    if let Some(previous) = client.session.take() {
        end_session(service, &previous).await;
    }

    let session = Session {
        account_id: account.id.clone(),
        name: account.name.clone(),
        kind: service.kind(),
        handle: client.handle.clone(),
    };
    let registration = service.registry().register(session.clone());
    client.session = Some(session.clone());
    service.logged_in(&session).await;

    Outcome::with_data(json!({
        "account_id": account.id,
        "name": account.name,
        "kicked_previous": registration.kicked_previous,
    }))
}

async fn end_session<S: Service>(service: &S, session: &Session) {
    if service
        .registry()
        .unregister(&session.account_id, session.connection_id())
    {
        service.logged_out(session).await;
    }
}

/// Cleanup when the connection goes away.
pub async fn disconnect<S: Service>(service: &S, client: &mut Client) {
    if let Some(session) = client.session.take() {
        end_session(service, &session).await;
    }
}

fn not_authenticated() -> Outcome {
    Outcome::error(ErrorCode::NotAuthenticated, "login required")
}

fn failure(error: &PlayhubError) -> Outcome {
    let code = error.code();
    if code == ErrorCode::Internal {
        tracing::error!(error = %error, "request failed");
    } else {
        tracing::debug!(%code, error = %error, "request rejected");
    }
    Outcome::error(code, error.to_string())
}

/// Drives one connection until it closes, is kicked or goes idle.
pub async fn serve<S, C>(service: Arc<S>, conn: C) -> Result<(), PlayhubError>
where
    S: Service,
    C: Connection,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    let (handle, mut outbound) = SessionHandle::new(conn_id);
    let mut client = Client::new(handle);
    let (frames_tx, mut frames) = mpsc::channel(FRAME_BUFFER);
    let reader = tokio::spawn(read_frames(Arc::clone(&conn), frames_tx));
    let idle = match service.registry().config().idle_timeout_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };
    let mut seq: u64 = 0;

    tracing::debug!(%conn_id, "connection opened");

    let result = loop {
        let idle_timer = async {
            match idle {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            frame = frames.recv() => match frame {
                Some(Ok(Some(data))) => {
                    match handle_frame(service.as_ref(), &mut client, conn.as_ref(), &mut seq, &data).await {
                        Ok(true) => break Ok(()),
                        Ok(false) => {}
                        Err(e) => break Err(e),
                    }
                }
                Some(Ok(None)) | None => {
                    tracing::info!(%conn_id, "connection closed by peer");
                    break Ok(());
                }
                Some(Err(e)) => break Err(PlayhubError::from(e)),
            },
            message = outbound.recv() => match message {
                Some(Outbound::Push(message)) => {
                    if let Err(e) = send_message(conn.as_ref(), &mut seq, message).await {
                        break Err(e);
                    }
                }
                Some(Outbound::Close) | None => {
                    tracing::info!(%conn_id, "connection closed by server");
                    break Ok(());
                }
            },
            _ = idle_timer => {
                tracing::info!(%conn_id, "connection idle, closing");
                break Ok(());
            }
        }
    };

    reader.abort();
    disconnect(service.as_ref(), &mut client).await;
    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }
    result
}

async fn read_frames<C: Connection>(
    conn: Arc<C>,
    frames: mpsc::Sender<Result<Option<Vec<u8>>, TransportError>>,
) {
    loop {
        let frame = conn.recv().await;
        let last = !matches!(frame, Ok(Some(_)));
        if frames.send(frame).await.is_err() || last {
            break;
        }
    }
}

/// Decodes and answers one frame. Returns `true` if the connection should
/// close.
async fn handle_frame<S: Service, C: Connection>(
    service: &S,
    client: &mut Client,
    conn: &C,
    seq: &mut u64,
    data: &[u8],
) -> Result<bool, PlayhubError> {
    let envelope: Envelope<ClientRequest> = match JsonCodec.decode(data) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!(conn_id = %client.connection_id(), error = %e, "undecodable request");
            let reply = ServerMessage::Reply {
                reply_to: 0,
                outcome: Outcome::error(ErrorCode::BadRequest, e.to_string()),
            };
            send_message(conn, seq, reply).await?;
            return Ok(false);
        }
    };

    let reply_to = envelope.seq;
    let (outcome, close) = match dispatch(service, client, envelope.payload).await {
        Dispatch::Reply(outcome) => (outcome, false),
        Dispatch::ReplyAndClose(outcome) => (outcome, true),
        Dispatch::Ignore => return Ok(false),
    };
    send_message(conn, seq, ServerMessage::Reply { reply_to, outcome }).await?;
    Ok(close)
}

async fn send_message<C: Connection>(
    conn: &C,
    seq: &mut u64,
    message: ServerMessage,
) -> Result<(), PlayhubError> {
    *seq += 1;
    let bytes = JsonCodec.encode(&Envelope::new(*seq, message))?;
    conn.send(&bytes).await?;
    Ok(())
}

/// Accepts connections forever, one task each.
pub async fn run<S, T>(service: Arc<S>, mut transport: T) -> Result<(), PlayhubError>
where
    S: Service,
    T: Transport,
{
    tracing::info!(addr = ?transport.local_addr().ok(), kind = %service.kind(), "service accepting connections");
    loop {
        match transport.accept().await {
            Ok(conn) => {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    if let Err(e) = serve(service, conn).await {
                        tracing::debug!(error = %e, "connection ended with error");
                    }
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "accept failed");
            }
        }
    }
}

/// Binds `addr` with the configured transport and serves `service` on it.
pub async fn listen<S: Service>(
    service: Arc<S>,
    transport: TransportKind,
    addr: &str,
) -> Result<(), PlayhubError> {
    match transport {
        TransportKind::Tcp => run(service, TcpTransport::bind(addr).await?).await,
        TransportKind::WebSocket => run(service, WebSocketTransport::bind(addr).await?).await,
    }
}
