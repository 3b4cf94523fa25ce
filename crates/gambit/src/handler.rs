//! Per-connection handler: hello, auth, binding, and event routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `hello` → authenticate token → PlayerIdentity
//!   2. Bind identity in the registry, spawn the writer task
//!   3. Send `welcome` → player is connected
//!   4. Loop: decode frames → route to the registry or session layer
//!
//! A second task (the writer) drains the connection's event channel and
//! serializes frames onto the socket, so session actors never block on
//! network I/O.

use std::sync::Arc;
use std::time::Duration;

use gambit_protocol::{ClientEvent, Codec, PlayerIdentity, ServerEvent};
use gambit_registry::Authenticator;
use gambit_session::{SessionError, SessionHandle};
use gambit_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;

use crate::server::ServerState;
use crate::GambitError;

/// How long a fresh connection may sit silent before its `hello` is due.
const HELLO_TIMEOUT: Duration = Duration::from_secs(5);

/// Channel sender for outbound events, shared with the registry and
/// session actors.
type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Drop guard that unbinds the connection and suspends the player's
/// session when the handler exits.
///
/// Cleanup must happen even if the handler errors or panics. Since
/// `Drop` is synchronous, it spawns a fire-and-forget task for the
/// async locks. The unbind is conditional on the connection id: if a
/// newer connection already rebound the identity, this guard must not
/// tear it down.
struct ConnectionGuard<A: Authenticator, C: Codec> {
    identity: PlayerIdentity,
    conn_id: ConnectionId,
    state: Arc<ServerState<A, C>>,
}

impl<A: Authenticator, C: Codec> Drop for ConnectionGuard<A, C> {
    fn drop(&mut self) {
        let identity = self.identity.clone();
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let unbound =
                state.registry.lock().await.unbind(&identity, conn_id);
            if unbound {
                let mut sessions = state.sessions.lock().await;
                let _ = sessions.disconnect(&identity).await;
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, C>>,
) -> Result<(), GambitError>
where
    A: Authenticator,
    C: Codec,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    // --- Step 1: hello + auth ---
    let identity = perform_hello(&conn, &state).await?;
    tracing::info!(%conn_id, %identity, "player authenticated");

    // --- Step 2: writer task + registry binding ---
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (kick_tx, mut kick_rx) = mpsc::unbounded_channel();

    spawn_writer(Arc::clone(&conn), Arc::clone(&state), event_rx);

    {
        let mut registry = state.registry.lock().await;
        registry.bind(identity.clone(), conn_id, event_tx.clone(), kick_tx);
    }
    let _guard = ConnectionGuard {
        identity: identity.clone(),
        conn_id,
        state: Arc::clone(&state),
    };

    // All outbound traffic goes through the writer so the welcome can
    // never overtake later session events.
    let _ = event_tx.send(ServerEvent::Welcome {
        identity: identity.clone(),
    });

    // --- Step 3: read loop ---
    let deadline = state.registry_config.liveness_deadline();

    loop {
        let data = tokio::select! {
            _ = kick_rx.recv() => {
                tracing::info!(%identity, "connection kicked");
                break;
            }
            result = tokio::time::timeout(deadline, conn.recv()) => {
                match result {
                    Ok(Ok(Some(data))) => data,
                    Ok(Ok(None)) => {
                        tracing::info!(%identity, "connection closed cleanly");
                        break;
                    }
                    Ok(Err(e)) => {
                        tracing::debug!(%identity, error = %e, "recv error");
                        break;
                    }
                    Err(_) => {
                        tracing::info!(%identity, "liveness lost, closing");
                        break;
                    }
                }
            }
        };

        let event = match state.codec.decode_client(&data) {
            Ok(event) => event,
            Err(e) => {
                // Protocol errors never terminate the connection or
                // touch session state.
                tracing::debug!(%identity, error = %e, "unusable frame");
                continue;
            }
        };

        // Any well-formed frame counts as liveness.
        state.registry.lock().await.touch(&identity);

        route_event(&state, &identity, &event_tx, event).await;
    }

    let _ = conn.close().await;
    // _guard drops here → unbind + session disconnect fire.
    Ok(())
}

/// Receives and authenticates the `hello` frame.
async fn perform_hello<A, C>(
    conn: &Arc<WebSocketConnection>,
    state: &Arc<ServerState<A, C>>,
) -> Result<PlayerIdentity, GambitError>
where
    A: Authenticator,
    C: Codec,
{
    let data = match tokio::time::timeout(HELLO_TIMEOUT, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(GambitError::Protocol(
                gambit_protocol::ProtocolError::InvalidMessage(
                    "connection closed before hello".into(),
                ),
            ));
        }
        Ok(Err(e)) => return Err(GambitError::Transport(e)),
        Err(_) => {
            return Err(GambitError::Protocol(
                gambit_protocol::ProtocolError::InvalidMessage(
                    "hello timed out".into(),
                ),
            ));
        }
    };

    let token = match state.codec.decode_client(&data) {
        Ok(ClientEvent::Hello { token }) => token,
        Ok(_) => {
            send_direct(conn, state, 400, "expected hello").await?;
            return Err(GambitError::Protocol(
                gambit_protocol::ProtocolError::InvalidMessage(
                    "first frame must be hello".into(),
                ),
            ));
        }
        Err(e) => {
            send_direct(conn, state, 400, "malformed hello").await?;
            return Err(GambitError::Protocol(e));
        }
    };

    match state.auth.authenticate(token.as_deref()).await {
        Ok(identity) => Ok(identity),
        Err(e) => {
            send_direct(conn, state, 401, "unauthorized").await?;
            Err(GambitError::Registry(e))
        }
    }
}

/// Spawns the writer task: drains the event channel onto the socket.
///
/// Exits when the channel closes (handler gone, all session senders
/// dropped) or the socket dies.
fn spawn_writer<A, C>(
    conn: Arc<WebSocketConnection>,
    state: Arc<ServerState<A, C>>,
    mut event_rx: mpsc::UnboundedReceiver<ServerEvent>,
) where
    A: Authenticator,
    C: Codec,
{
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let bytes = match state.codec.encode(&event) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!(error = %e, "failed to encode event");
                    continue;
                }
            };
            if conn.send(&bytes).await.is_err() {
                break;
            }
        }
    });
}

/// Routes one decoded client event to the registry or session layer.
async fn route_event<A, C>(
    state: &Arc<ServerState<A, C>>,
    identity: &PlayerIdentity,
    event_tx: &EventSender,
    event: ClientEvent,
) where
    A: Authenticator,
    C: Codec,
{
    match event {
        ClientEvent::Hello { .. } => {
            send_error(event_tx, 400, "already authenticated");
        }

        ClientEvent::Heartbeat => {
            let _ = event_tx.send(ServerEvent::HeartbeatAck);
        }

        ClientEvent::JoinOrCreate { session_id } => {
            let result = {
                let mut sessions = state.sessions.lock().await;
                sessions
                    .join_or_create(
                        identity.clone(),
                        session_id,
                        event_tx.clone(),
                    )
                    .await
            };
            match result {
                Ok(placement) if placement.created => {
                    let _ = event_tx.send(ServerEvent::SessionCreated {
                        session_id: placement.session_id,
                        seat: placement.outcome.seat,
                    });
                }
                Ok(placement) => {
                    let _ = event_tx.send(ServerEvent::SessionJoined {
                        session_id: placement.session_id,
                        seat: placement.outcome.seat,
                        opponent: placement.outcome.opponent,
                    });
                }
                Err(e) => session_error(event_tx, identity, &e),
            }
        }

        ClientEvent::Move {
            session_id,
            from,
            to,
            promotion,
        } => {
            let result = match session_handle(state, &session_id).await {
                Ok(handle) => {
                    handle
                        .apply_move(identity.clone(), from, to, promotion)
                        .await
                }
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                session_error(event_tx, identity, &e);
            }
        }

        ClientEvent::Resign { session_id } => {
            let result = match session_handle(state, &session_id).await {
                Ok(handle) => handle.resign(identity.clone()).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                session_error(event_tx, identity, &e);
            }
        }

        ClientEvent::OfferDraw { session_id } => {
            let result = match session_handle(state, &session_id).await {
                Ok(handle) => handle.offer_draw(identity.clone()).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                session_error(event_tx, identity, &e);
            }
        }

        ClientEvent::AcceptDraw { session_id } => {
            let result = match session_handle(state, &session_id).await {
                Ok(handle) => handle.accept_draw(identity.clone()).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                session_error(event_tx, identity, &e);
            }
        }

        ClientEvent::DeclineDraw { session_id } => {
            let result = match session_handle(state, &session_id).await {
                Ok(handle) => handle.decline_draw(identity.clone()).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                session_error(event_tx, identity, &e);
            }
        }
    }
}

/// Fetches the session handle under the manager lock, releasing it
/// before the caller awaits the actor.
async fn session_handle<A, C>(
    state: &Arc<ServerState<A, C>>,
    session_id: &gambit_protocol::SessionId,
) -> Result<SessionHandle, SessionError>
where
    A: Authenticator,
    C: Codec,
{
    state
        .sessions
        .lock()
        .await
        .handle_of(session_id)
        .ok_or_else(|| SessionError::NotFound(session_id.clone()))
}

/// Maps a session error to its wire error code.
fn error_code(err: &SessionError) -> u16 {
    match err {
        SessionError::NotAPlayer(_)
        | SessionError::NotYourTurn(_)
        | SessionError::NoPendingOffer
        | SessionError::OwnOffer
        | SessionError::OfferPending => 403,
        SessionError::NotFound(_) => 404,
        SessionError::AlreadyInSession(_)
        | SessionError::OwnSessionJoin(_)
        | SessionError::SessionFull(_)
        | SessionError::NotActive(_) => 409,
        SessionError::Finished(_) => 410,
        SessionError::IllegalMove(_) => 422,
        SessionError::Unavailable(_) => 503,
    }
}

fn session_error(
    event_tx: &EventSender,
    identity: &PlayerIdentity,
    err: &SessionError,
) {
    tracing::debug!(%identity, error = %err, "session operation rejected");
    send_error(event_tx, error_code(err), &err.to_string());
}

fn send_error(event_tx: &EventSender, code: u16, message: &str) {
    let _ = event_tx.send(ServerEvent::Error {
        code,
        message: message.to_string(),
    });
}

/// Sends an `error` frame straight on the socket, for the pre-binding
/// phase before the writer task exists.
async fn send_direct<A, C>(
    conn: &Arc<WebSocketConnection>,
    state: &Arc<ServerState<A, C>>,
    code: u16,
    message: &str,
) -> Result<(), GambitError>
where
    A: Authenticator,
    C: Codec,
{
    let event = ServerEvent::Error {
        code,
        message: message.to_string(),
    };
    let bytes = state.codec.encode(&event)?;
    conn.send(&bytes).await.map_err(GambitError::Transport)?;
    Ok(())
}
