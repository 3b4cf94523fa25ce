//! Error types for the session layer.
//!
//! Every rejected protocol action maps to exactly one variant here; the
//! handler above turns them into `error` frames without losing which
//! rule was violated. None of these mutate session state.

use gambit_protocol::{PlayerIdentity, SessionId};

/// Errors that can occur during session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session exists under the given id.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The player is already seated in a different session.
    #[error("{0} is already in a session")]
    AlreadyInSession(PlayerIdentity),

    /// The creator tried to join their own open session as the opponent.
    #[error("cannot join your own session {0}")]
    OwnSessionJoin(SessionId),

    /// Both seats are already filled.
    #[error("session {0} is full")]
    SessionFull(SessionId),

    /// The sender does not occupy a seat in this session.
    #[error("{0} is not a player in this session")]
    NotAPlayer(PlayerIdentity),

    /// The sender acted out of turn.
    #[error("not {0}'s turn")]
    NotYourTurn(PlayerIdentity),

    /// The rules oracle rejected the move.
    #[error("illegal move: {0}")]
    IllegalMove(String),

    /// The session is not in a state that accepts this action (still
    /// waiting for an opponent, or suspended).
    #[error("session {0} is not active")]
    NotActive(SessionId),

    /// Accept/decline arrived with no draw offer pending.
    #[error("no draw offer is pending")]
    NoPendingOffer,

    /// A player tried to accept or decline their own draw offer.
    #[error("cannot answer your own draw offer")]
    OwnOffer,

    /// A draw offer from the other seat is already pending; answer it
    /// with accept-draw or decline-draw instead of counter-offering.
    #[error("a draw offer is already pending")]
    OfferPending,

    /// The session reached a terminal state; all further events are
    /// rejected.
    #[error("session {0} already finished")]
    Finished(SessionId),

    /// The session's actor task is gone (shutting down or reaped).
    #[error("session {0} is unavailable")]
    Unavailable(SessionId),
}
