//! Session actor: an isolated Tokio task that owns one [`Session`].
//!
//! Each session runs in its own task, communicating with the outside
//! world through an mpsc channel. Grace timers are spawned as sleeps
//! that report back through the same channel, so the state machine
//! never sees concurrent mutation.

use std::sync::Arc;
use std::time::Duration;

use gambit_protocol::{PlayerIdentity, Promotion, SessionId};
use gambit_registry::EventSender;
use tokio::sync::{mpsc, oneshot};

use crate::session::{
    Collaborators, DisconnectAction, JoinOutcome, Session, SessionStage,
};
use crate::SessionError;

/// Commands sent to a session actor through its channel.
///
/// The `oneshot::Sender` in most variants is a reply channel: the
/// caller sends a command and waits for the response on it.
pub(crate) enum SessionCommand {
    Join {
        identity: PlayerIdentity,
        sender: EventSender,
        reply: oneshot::Sender<Result<JoinOutcome, SessionError>>,
    },
    Move {
        identity: PlayerIdentity,
        from: String,
        to: String,
        promotion: Option<Promotion>,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Resign {
        identity: PlayerIdentity,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    OfferDraw {
        identity: PlayerIdentity,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    AcceptDraw {
        identity: PlayerIdentity,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    DeclineDraw {
        identity: PlayerIdentity,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Disconnect {
        identity: PlayerIdentity,
        reply: oneshot::Sender<DisconnectAction>,
    },
    Info {
        reply: oneshot::Sender<SessionInfo>,
    },
    /// Internal: a grace timer for the given epoch elapsed.
    GraceExpired { epoch: u64 },
    /// Close the session if it is still waiting for an opponent.
    Expire,
    Shutdown,
}

/// A snapshot of session metadata for the manager's scans.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: SessionId,
    pub stage: SessionStage,
    pub ply: u32,
    pub age: Duration,
}

/// Handle to a running session actor. Cheap to clone.
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| SessionError::Unavailable(self.id.clone()))?;
        reply_rx
            .await
            .map_err(|_| SessionError::Unavailable(self.id.clone()))
    }

    pub async fn join(
        &self,
        identity: PlayerIdentity,
        sender: EventSender,
    ) -> Result<JoinOutcome, SessionError> {
        self.request(|reply| SessionCommand::Join {
            identity,
            sender,
            reply,
        })
        .await?
    }

    pub async fn apply_move(
        &self,
        identity: PlayerIdentity,
        from: String,
        to: String,
        promotion: Option<Promotion>,
    ) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Move {
            identity,
            from,
            to,
            promotion,
            reply,
        })
        .await?
    }

    pub async fn resign(
        &self,
        identity: PlayerIdentity,
    ) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Resign { identity, reply })
            .await?
    }

    pub async fn offer_draw(
        &self,
        identity: PlayerIdentity,
    ) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::OfferDraw { identity, reply })
            .await?
    }

    pub async fn accept_draw(
        &self,
        identity: PlayerIdentity,
    ) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::AcceptDraw { identity, reply })
            .await?
    }

    pub async fn decline_draw(
        &self,
        identity: PlayerIdentity,
    ) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::DeclineDraw { identity, reply })
            .await?
    }

    pub async fn disconnect(
        &self,
        identity: PlayerIdentity,
    ) -> Result<DisconnectAction, SessionError> {
        self.request(|reply| SessionCommand::Disconnect { identity, reply })
            .await
    }

    pub async fn info(&self) -> Result<SessionInfo, SessionError> {
        self.request(|reply| SessionCommand::Info { reply }).await
    }

    /// Closes the session if no opponent ever arrived.
    pub async fn expire(&self) -> Result<(), SessionError> {
        self.sender
            .send(SessionCommand::Expire)
            .await
            .map_err(|_| SessionError::Unavailable(self.id.clone()))
    }

    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.sender
            .send(SessionCommand::Shutdown)
            .await
            .map_err(|_| SessionError::Unavailable(self.id.clone()))
    }
}

struct SessionActor {
    session: Session,
    grace_period: Duration,
    receiver: mpsc::Receiver<SessionCommand>,
    /// Weak handle to our own command channel, handed to grace timer
    /// tasks. Weak so a pending timer never keeps the channel open:
    /// once every `SessionHandle` is dropped the run loop drains and
    /// exits.
    self_tx: mpsc::WeakSender<SessionCommand>,
}

impl SessionActor {
    async fn run(mut self) {
        tracing::info!(session_id = %self.session.id().0, "session actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                SessionCommand::Join {
                    identity,
                    sender,
                    reply,
                } => {
                    let result = self.session.join(identity, sender);
                    let _ = reply.send(result);
                }
                SessionCommand::Move {
                    identity,
                    from,
                    to,
                    promotion,
                    reply,
                } => {
                    let result = self
                        .session
                        .apply_move(&identity, &from, &to, promotion);
                    let _ = reply.send(result);
                }
                SessionCommand::Resign { identity, reply } => {
                    let _ = reply.send(self.session.resign(&identity));
                }
                SessionCommand::OfferDraw { identity, reply } => {
                    let _ = reply.send(self.session.offer_draw(&identity));
                }
                SessionCommand::AcceptDraw { identity, reply } => {
                    let _ = reply.send(self.session.accept_draw(&identity));
                }
                SessionCommand::DeclineDraw { identity, reply } => {
                    let _ = reply.send(self.session.decline_draw(&identity));
                }
                SessionCommand::Disconnect { identity, reply } => {
                    let action = self.session.disconnect(&identity);
                    if let DisconnectAction::Suspended { epoch } = action {
                        self.arm_grace_timer(epoch);
                    }
                    let _ = reply.send(action);
                }
                SessionCommand::Info { reply } => {
                    let _ = reply.send(SessionInfo {
                        id: self.session.id().clone(),
                        stage: self.session.stage(),
                        ply: self.session.ply(),
                        age: self.session.age(),
                    });
                }
                SessionCommand::GraceExpired { epoch } => {
                    self.session.grace_expired(epoch);
                }
                SessionCommand::Expire => {
                    self.session.expire_open();
                }
                SessionCommand::Shutdown => {
                    tracing::info!(
                        session_id = %self.session.id().0,
                        "session shutting down"
                    );
                    break;
                }
            }
        }

        tracing::info!(session_id = %self.session.id().0, "session actor stopped");
    }

    /// Arms a one-shot grace timer. The epoch travels with the timer so
    /// a reconnect-then-redisconnect cannot be forfeited by the first
    /// timer firing.
    fn arm_grace_timer(&self, epoch: u64) {
        let weak_tx = self.self_tx.clone();
        let grace = self.grace_period;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(tx) = weak_tx.upgrade() {
                let _ = tx.send(SessionCommand::GraceExpired { epoch }).await;
            }
        });
    }
}

/// Spawns a session actor task and returns a handle to it.
pub(crate) fn spawn_session(
    id: SessionId,
    creator: PlayerIdentity,
    sender: EventSender,
    collab: Arc<Collaborators>,
    grace_period: Duration,
    channel_size: usize,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(channel_size);

    let actor = SessionActor {
        session: Session::create(id.clone(), creator, sender, collab),
        grace_period,
        receiver: rx,
        self_tx: tx.downgrade(),
    };

    tokio::spawn(actor.run());

    SessionHandle { id, sender: tx }
}
