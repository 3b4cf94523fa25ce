//! Session manager: creates, tracks, and routes players to sessions.

use std::collections::HashMap;
use std::sync::Arc;

use gambit_protocol::{PlayerIdentity, SessionId};
use gambit_registry::EventSender;
use rand::RngCore;

use crate::actor::{spawn_session, SessionHandle};
use crate::session::{Collaborators, DisconnectAction, SessionStage};
use crate::{JoinOutcome, SessionConfig, SessionError};

/// Default command channel size for session actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Result of [`SessionManager::join_or_create`].
#[derive(Debug, Clone)]
pub struct Placement {
    pub session_id: SessionId,
    pub outcome: JoinOutcome,
    /// True when a fresh session was created for the player.
    pub created: bool,
}

/// Manages all live sessions and tracks which player is in which one.
///
/// This is the entry point for session operations from the server
/// layer. A player can be in at most one session at a time.
pub struct SessionManager {
    sessions: HashMap<SessionId, SessionHandle>,
    player_sessions: HashMap<PlayerIdentity, SessionId>,
    collab: Arc<Collaborators>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(collab: Arc<Collaborators>, config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            player_sessions: HashMap::new(),
            collab,
            config,
        }
    }

    fn generate_session_id() -> SessionId {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        SessionId(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Creates a session with the player seated as white.
    fn create_session(
        &mut self,
        identity: PlayerIdentity,
        sender: EventSender,
    ) -> SessionId {
        let session_id = Self::generate_session_id();
        let handle = spawn_session(
            session_id.clone(),
            identity.clone(),
            sender,
            self.collab.clone(),
            self.config.grace_period,
            DEFAULT_CHANNEL_SIZE,
        );
        self.sessions.insert(session_id.clone(), handle);
        self.player_sessions.insert(identity, session_id.clone());
        tracing::info!(session_id = %session_id.0, "session created");
        session_id
    }

    pub fn handle_of(&self, session_id: &SessionId) -> Option<SessionHandle> {
        self.sessions.get(session_id).cloned()
    }

    pub fn session_of(&self, identity: &PlayerIdentity) -> Option<SessionId> {
        self.player_sessions.get(identity).cloned()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Places a player: reconnects them to their existing session,
    /// joins the explicitly named one, or matches them into an open
    /// session (creating one when none is waiting).
    pub async fn join_or_create(
        &mut self,
        identity: PlayerIdentity,
        session_id: Option<SessionId>,
        sender: EventSender,
    ) -> Result<Placement, SessionError> {
        // A mapped player goes back to their own session, whatever id
        // they asked for. Stale mappings (session finished and reaped
        // between requests) are dropped and the request retried fresh.
        if let Some(current) = self.player_sessions.get(&identity).cloned() {
            if let Some(handle) = self.sessions.get(&current) {
                if let Some(requested) = &session_id {
                    if requested != &current {
                        return Err(SessionError::AlreadyInSession(identity));
                    }
                }
                match handle.join(identity.clone(), sender.clone()).await {
                    Ok(outcome) => {
                        return Ok(Placement {
                            session_id: current,
                            outcome,
                            created: false,
                        });
                    }
                    Err(
                        SessionError::Finished(_) | SessionError::Unavailable(_),
                    ) => {
                        self.player_sessions.remove(&identity);
                    }
                    Err(e) => return Err(e),
                }
            } else {
                self.player_sessions.remove(&identity);
            }
        }

        if let Some(requested) = session_id {
            let handle = self
                .sessions
                .get(&requested)
                .cloned()
                .ok_or_else(|| SessionError::NotFound(requested.clone()))?;
            let outcome = handle.join(identity.clone(), sender).await?;
            self.player_sessions.insert(identity, requested.clone());
            return Ok(Placement {
                session_id: requested,
                outcome,
                created: false,
            });
        }

        // Matchmaking: scan for an open session. If a join fails due to
        // a race (someone else got the seat first), keep searching.
        let handles: Vec<SessionHandle> = self.sessions.values().cloned().collect();
        for handle in handles {
            let Ok(info) = handle.info().await else { continue };
            if info.stage != SessionStage::Open {
                continue;
            }
            if let Ok(outcome) =
                handle.join(identity.clone(), sender.clone()).await
            {
                self.player_sessions.insert(identity, info.id.clone());
                return Ok(Placement {
                    session_id: info.id,
                    outcome,
                    created: false,
                });
            }
        }

        // Nobody waiting. Open a new session.
        let session_id = self.create_session(identity.clone(), sender);
        Ok(Placement {
            session_id: session_id.clone(),
            outcome: JoinOutcome {
                seat: gambit_protocol::Seat::White,
                opponent: identity,
                resumed: false,
            },
            created: true,
        })
    }

    /// Routes a dropped connection to the player's session.
    pub async fn disconnect(
        &mut self,
        identity: &PlayerIdentity,
    ) -> Option<DisconnectAction> {
        let session_id = self.player_sessions.get(identity).cloned()?;
        let handle = self.sessions.get(&session_id).cloned()?;
        let action = handle.disconnect(identity.clone()).await.ok()?;
        if matches!(action, DisconnectAction::TornDown) {
            self.player_sessions
                .retain(|_, sid| *sid != session_id);
        }
        Some(action)
    }

    /// Removes finished sessions and expires sessions that never found
    /// an opponent. Called periodically by the server's reaper task.
    pub async fn reap(&mut self) {
        let handles: Vec<SessionHandle> = self.sessions.values().cloned().collect();
        let mut remove = Vec::new();

        for handle in handles {
            let Ok(info) = handle.info().await else {
                remove.push(handle.id().clone());
                continue;
            };
            match info.stage {
                SessionStage::Terminal => remove.push(info.id),
                SessionStage::Open if info.age >= self.config.open_timeout => {
                    let _ = handle.expire().await;
                    remove.push(info.id);
                }
                _ => {}
            }
        }

        for session_id in remove {
            if let Some(handle) = self.sessions.remove(&session_id) {
                let _ = handle.shutdown().await;
            }
            self.player_sessions.retain(|_, sid| *sid != session_id);
            tracing::debug!(session_id = %session_id.0, "session reaped");
        }
    }
}
