//! The connection registry: maps live connections to player identities.
//!
//! This is the layer between raw transport connections and the session
//! machinery. It answers "which connection speaks for this player right
//! now", enforces the single-active-connection-per-identity policy, and
//! detects liveness loss from missed heartbeats.
//!
//! # Concurrency note
//!
//! `ConnectionRegistry` is a plain `HashMap` wrapper with no interior
//! locking. It is owned behind one mutex at the server level — its own
//! exclusion scope, held only for registry work, never across session
//! operations or network I/O.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use gambit_protocol::{PlayerIdentity, ServerEvent};
use gambit_transport::ConnectionId;
use tokio::sync::mpsc;

/// Channel sender delivering outbound events to one connection's writer
/// task. Unbounded: the writer drains continuously and drops the whole
/// channel when the socket dies, so a slow client cannot back-pressure a
/// session actor.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Signal channel used to force-close a connection's read loop (the
/// handler selects on it alongside the socket).
pub type KickSender = mpsc::UnboundedSender<()>;

/// Configuration for connection liveness.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How often clients are expected to send a `heartbeat` frame.
    pub heartbeat_interval: Duration,

    /// How many consecutive heartbeats a connection may miss before it is
    /// force-closed.
    pub missed_limit: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(25),
            missed_limit: 2,
        }
    }
}

impl RegistryConfig {
    /// The silence window after which a connection counts as dead:
    /// one interval for the in-flight beat plus `missed_limit` missed ones.
    pub fn liveness_deadline(&self) -> Duration {
        self.heartbeat_interval * (self.missed_limit + 1)
    }
}

/// One identity's live binding.
struct Binding {
    conn_id: ConnectionId,
    sender: EventSender,
    kick: KickSender,
    last_seen: Instant,
}

/// Maps each authenticated identity to its single live connection.
pub struct ConnectionRegistry {
    bindings: HashMap<PlayerIdentity, Binding>,
    config: RegistryConfig,
}

impl ConnectionRegistry {
    /// Creates an empty registry with the given liveness config.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            bindings: HashMap::new(),
            config,
        }
    }

    /// Binds `identity` to a connection.
    ///
    /// If the identity already has a different live connection, the old
    /// one is kicked — a player opening a second tab takes over their
    /// identity, and the stale connection is closed rather than left to
    /// receive events meant for the new one.
    pub fn bind(
        &mut self,
        identity: PlayerIdentity,
        conn_id: ConnectionId,
        sender: EventSender,
        kick: KickSender,
    ) {
        if let Some(old) = self.bindings.insert(
            identity.clone(),
            Binding {
                conn_id,
                sender,
                kick,
                last_seen: Instant::now(),
            },
        ) {
            if old.conn_id != conn_id {
                tracing::info!(
                    %identity,
                    old = %old.conn_id,
                    new = %conn_id,
                    "identity rebound, kicking previous connection"
                );
                let _ = old.kick.send(());
            }
        }
        tracing::debug!(%identity, %conn_id, "connection bound");
    }

    /// Removes the binding for `identity`, but only if it still refers to
    /// `conn_id`.
    ///
    /// The guard matters on rebind: the kicked handler's cleanup runs
    /// after the new connection has already bound, and must not unbind it.
    /// Returns `true` if a binding was removed.
    pub fn unbind(&mut self, identity: &PlayerIdentity, conn_id: ConnectionId) -> bool {
        match self.bindings.get(identity) {
            Some(binding) if binding.conn_id == conn_id => {
                self.bindings.remove(identity);
                tracing::debug!(%identity, %conn_id, "connection unbound");
                true
            }
            _ => false,
        }
    }

    /// Best-effort send to the identity's bound connection.
    ///
    /// Silently drops the event if the identity has no binding or the
    /// writer task is gone — the protocol above never assumes delivery.
    pub fn send(&self, identity: &PlayerIdentity, event: ServerEvent) {
        if let Some(binding) = self.bindings.get(identity) {
            let _ = binding.sender.send(event);
        }
    }

    /// Records activity (a heartbeat or any frame) for the identity.
    pub fn touch(&mut self, identity: &PlayerIdentity) {
        if let Some(binding) = self.bindings.get_mut(identity) {
            binding.last_seen = Instant::now();
        }
    }

    /// Returns the outbound sender for `identity`, if bound.
    ///
    /// Session actors hold a clone of this so they can notify a player
    /// without going through the registry lock on every event.
    pub fn sender_of(&self, identity: &PlayerIdentity) -> Option<EventSender> {
        self.bindings.get(identity).map(|b| b.sender.clone())
    }

    /// Returns the connection currently bound to `identity`.
    pub fn connection_of(&self, identity: &PlayerIdentity) -> Option<ConnectionId> {
        self.bindings.get(identity).map(|b| b.conn_id)
    }

    /// Kicks every connection that has been silent past the liveness
    /// deadline and removes its binding.
    ///
    /// Called periodically by the server's reaper. Returns the kicked
    /// identities so the caller can run the ordinary disconnect path for
    /// each (suspend their session, notify the opponent).
    pub fn sweep_stale(&mut self) -> Vec<PlayerIdentity> {
        let deadline = self.config.liveness_deadline();
        let mut kicked = Vec::new();

        self.bindings.retain(|identity, binding| {
            if binding.last_seen.elapsed() > deadline {
                tracing::info!(
                    %identity,
                    conn = %binding.conn_id,
                    "liveness lost, force-closing connection"
                );
                let _ = binding.kick.send(());
                kicked.push(identity.clone());
                false
            } else {
                true
            }
        });

        kicked
    }

    /// Returns the number of bound connections.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
