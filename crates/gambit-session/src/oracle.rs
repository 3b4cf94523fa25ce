//! The rules oracle boundary.
//!
//! The session layer never interprets positions or moves itself — it
//! forwards every candidate move to a [`RulesOracle`] and trusts the
//! verdict. The oracle is a pure function of (position, move); it holds
//! no session state, so one instance serves every session concurrently.

use gambit_protocol::Promotion;

/// How the oracle classifies a position after a legal move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalClassification {
    /// The side that just moved delivered mate.
    Checkmate,
    /// The side to move has no legal moves and is not in check.
    Stalemate,
    /// Drawn by rule (e.g. insufficient material).
    RuleDraw,
}

/// The oracle's answer for a legal move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveVerdict {
    /// Serialized position after the move.
    pub new_position: String,
    /// Set when the move ends the game.
    pub terminal: Option<TerminalClassification>,
}

/// Why the oracle rejected a move.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// The move is not legal in the given position.
    #[error("{0}")]
    Illegal(String),

    /// The position or a square could not be parsed. Points at state
    /// corruption or a malformed frame, never at a legal-but-bad move.
    #[error("malformed input: {0}")]
    Malformed(String),
}

/// Validates moves and classifies terminal positions.
pub trait RulesOracle: Send + Sync + 'static {
    /// The serialized starting position for a fresh session.
    fn starting_position(&self) -> String;

    /// Validates one candidate move against a position.
    ///
    /// Returns the resulting position (and terminal classification, if
    /// the game is over) for a legal move; an error for anything else.
    /// Must not carry state between calls.
    fn validate_move(
        &self,
        position: &str,
        from: &str,
        to: &str,
        promotion: Option<Promotion>,
    ) -> Result<MoveVerdict, OracleError>;
}
