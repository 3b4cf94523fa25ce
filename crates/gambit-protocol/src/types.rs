//! Core protocol types for Gambit's wire format.
//!
//! Every structure that travels between client and server is defined here.
//! Frames are flat JSON objects tagged by an `event` field, e.g.:
//!
//! ```json
//! { "event": "move", "session_id": "a3f…", "from": "e2", "to": "e4" }
//! ```
//!
//! The serde attributes below are load-bearing: the client SDK parses
//! exactly these shapes, so changing a tag or a field name is a protocol
//! break.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player's logical identity.
///
/// Gambit distinguishes two kinds of identity:
///
/// - **Registered** — an account-backed player. Finished games are rated
///   and recorded for these.
/// - **Guest** — a throwaway identity issued when a client connects without
///   credentials. Guests can play full games, but sessions involving a
///   guest on either seat are never rated or recorded.
///
/// The distinction is a tagged variant rather than a boolean flag so that
/// downstream code has to say which kind it means.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "kebab-case")]
pub enum PlayerIdentity {
    /// An account-backed player, named by their account name.
    Registered(String),
    /// An unauthenticated, throwaway identity.
    Guest(String),
}

impl PlayerIdentity {
    /// Returns the display name regardless of kind.
    pub fn name(&self) -> &str {
        match self {
            Self::Registered(name) | Self::Guest(name) => name,
        }
    }

    /// Returns `true` for guest identities.
    ///
    /// Sessions with a guest on either seat skip rating and recording.
    pub fn is_guest(&self) -> bool {
        matches!(self, Self::Guest(_))
    }
}

impl fmt::Display for PlayerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registered(name) => write!(f, "{name}"),
            Self::Guest(name) => write!(f, "guest:{name}"),
        }
    }
}

/// An opaque unique token identifying one session.
///
/// Generated server-side (32 hex chars); clients echo it back verbatim in
/// every session-scoped event. `#[serde(transparent)]` keeps it a plain
/// JSON string on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Seats, moves, outcomes
// ---------------------------------------------------------------------------

/// One of the two fixed roles in a session. White is the creator and moves
/// first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Seat {
    White,
    Black,
}

impl Seat {
    /// The opposing seat.
    pub fn other(self) -> Seat {
        match self {
            Seat::White => Seat::Black,
            Seat::Black => Seat::White,
        }
    }

    /// The seat to move at the given ply index.
    ///
    /// Turn order is derived from ply parity alone: White on even plies,
    /// Black on odd. There is no separate "whose turn" field to drift out
    /// of sync.
    pub fn to_move(ply: u32) -> Seat {
        if ply % 2 == 0 { Seat::White } else { Seat::Black }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seat::White => write!(f, "white"),
            Seat::Black => write!(f, "black"),
        }
    }
}

/// Promotion choice for a pawn reaching the last rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Promotion {
    Queen,
    Rook,
    Bishop,
    Knight,
}

/// One accepted half-move. Append-only: records are pushed onto the
/// session history and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// Source square in algebraic form ("e2").
    pub from: String,
    /// Destination square ("e4").
    pub to: String,
    /// Promotion piece, if the move promoted a pawn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<Promotion>,
    /// FEN of the position *after* this move.
    pub position: String,
    /// One-based ply index: the count of accepted moves including this
    /// one.
    pub ply: u32,
}

/// How a finished session ended, from the players' point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "seat", rename_all = "kebab-case")]
pub enum Outcome {
    /// The named seat won.
    Win(Seat),
    /// Agreed or forced draw.
    Draw,
    /// The session ended without a ratable result (creator left before an
    /// opponent joined, or both players vanished).
    Abandoned,
}

/// Human-readable reason tag attached to every terminal notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeReason {
    Checkmate,
    Resignation,
    DrawAgreement,
    /// Stalemate or another draw forced by the rules of the game.
    RuleDraw,
    DisconnectTimeout,
}

impl fmt::Display for OutcomeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checkmate => write!(f, "checkmate"),
            Self::Resignation => write!(f, "resignation"),
            Self::DrawAgreement => write!(f, "draw-agreement"),
            Self::RuleDraw => write!(f, "rule-draw"),
            Self::DisconnectTimeout => write!(f, "disconnect-timeout"),
        }
    }
}

// ---------------------------------------------------------------------------
// Client → server events
// ---------------------------------------------------------------------------

/// Everything a client may send.
///
/// `#[serde(tag = "event", rename_all = "kebab-case")]` produces the flat
/// internally tagged shape: `{ "event": "offer-draw", "session_id": … }`.
///
/// The `move` variant accepts the legacy `source`/`target` field names as
/// aliases; decoding normalizes both shapes into the one canonical variant
/// so nothing downstream ever branches on the wire spelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// First frame on every connection. A missing or empty token yields a
    /// guest identity; anything else is handed to the authenticator.
    Hello {
        #[serde(default)]
        token: Option<String>,
    },

    /// Join the named session, or create a fresh one if no id is given.
    JoinOrCreate {
        #[serde(default)]
        session_id: Option<SessionId>,
    },

    /// Attempt a move. Rejected unless the sender occupies the seat whose
    /// turn it is and the rules oracle approves.
    Move {
        session_id: SessionId,
        #[serde(alias = "source")]
        from: String,
        #[serde(alias = "target")]
        to: String,
        #[serde(default)]
        promotion: Option<Promotion>,
    },

    /// Concede the game.
    Resign { session_id: SessionId },

    /// Offer a draw to the opponent.
    OfferDraw { session_id: SessionId },

    /// Accept the opponent's pending draw offer.
    AcceptDraw { session_id: SessionId },

    /// Decline the opponent's pending draw offer.
    DeclineDraw { session_id: SessionId },

    /// Liveness ping. Expected at the registry's heartbeat interval;
    /// a connection that stops sending these gets force-closed.
    Heartbeat,
}

/// The set of event names [`ClientEvent`] can decode.
///
/// Used by the codec to tell "unknown event" (log and ignore) apart from
/// "known event, malformed fields" (decode error).
pub const CLIENT_EVENT_NAMES: &[&str] = &[
    "hello",
    "join-or-create",
    "move",
    "resign",
    "offer-draw",
    "accept-draw",
    "decline-draw",
    "heartbeat",
];

// ---------------------------------------------------------------------------
// Server → client events
// ---------------------------------------------------------------------------

/// Everything the server may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Reply to `hello`: the identity this connection is bound to.
    Welcome { identity: PlayerIdentity },

    /// A fresh session was created; the sender holds `seat` and waits for
    /// an opponent.
    SessionCreated { session_id: SessionId, seat: Seat },

    /// The sender joined an existing session.
    SessionJoined {
        session_id: SessionId,
        seat: Seat,
        opponent: PlayerIdentity,
    },

    /// Sent to the waiting creator when the second player arrives.
    OpponentJoined { opponent: PlayerIdentity },

    /// A move was accepted; sent to both players.
    PositionUpdated {
        session_id: SessionId,
        position: String,
        last_move: MoveRecord,
    },

    /// The opponent offered a draw.
    DrawOffered { by: Seat },

    /// The opponent declined the sender's draw offer.
    DrawDeclined { by: Seat },

    /// The session reached a terminal state; sent to both players, always,
    /// even when rating/recording is skipped or fails.
    SessionTerminal {
        outcome: Outcome,
        reason: OutcomeReason,
        final_position: String,
    },

    /// The opponent's connection dropped; the session is suspended for the
    /// grace period.
    OpponentDisconnected,

    /// The opponent reconnected; play resumes.
    OpponentReconnected,

    /// A rejected action. `code` follows HTTP-style conventions.
    Error { code: u16, message: String },

    /// Reply to `heartbeat`.
    HeartbeatAck,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The wire format is a contract with the client SDK: these tests pin
    //! the exact JSON shape each serde attribute produces.

    use super::*;

    // =====================================================================
    // Identity types
    // =====================================================================

    #[test]
    fn test_registered_identity_json_shape() {
        let id = PlayerIdentity::Registered("alice".into());
        let json: serde_json::Value = serde_json::to_value(&id).unwrap();
        assert_eq!(json["kind"], "registered");
        assert_eq!(json["name"], "alice");
    }

    #[test]
    fn test_guest_identity_json_shape() {
        let id = PlayerIdentity::Guest("g-1f2e".into());
        let json: serde_json::Value = serde_json::to_value(&id).unwrap();
        assert_eq!(json["kind"], "guest");
        assert_eq!(json["name"], "g-1f2e");
    }

    #[test]
    fn test_identity_is_guest() {
        assert!(PlayerIdentity::Guest("x".into()).is_guest());
        assert!(!PlayerIdentity::Registered("x".into()).is_guest());
    }

    #[test]
    fn test_identity_display() {
        assert_eq!(
            PlayerIdentity::Registered("alice".into()).to_string(),
            "alice"
        );
        assert_eq!(
            PlayerIdentity::Guest("g-7".into()).to_string(),
            "guest:g-7"
        );
    }

    #[test]
    fn test_session_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&SessionId("abc123".into())).unwrap();
        assert_eq!(json, "\"abc123\"");
    }

    // =====================================================================
    // Seat / turn derivation
    // =====================================================================

    #[test]
    fn test_seat_other_flips() {
        assert_eq!(Seat::White.other(), Seat::Black);
        assert_eq!(Seat::Black.other(), Seat::White);
    }

    #[test]
    fn test_seat_to_move_follows_ply_parity() {
        assert_eq!(Seat::to_move(0), Seat::White);
        assert_eq!(Seat::to_move(1), Seat::Black);
        assert_eq!(Seat::to_move(2), Seat::White);
        assert_eq!(Seat::to_move(41), Seat::Black);
    }

    #[test]
    fn test_seat_serializes_kebab_case() {
        assert_eq!(serde_json::to_string(&Seat::White).unwrap(), "\"white\"");
        assert_eq!(serde_json::to_string(&Seat::Black).unwrap(), "\"black\"");
    }

    // =====================================================================
    // Outcome / reason
    // =====================================================================

    #[test]
    fn test_outcome_win_json_shape() {
        let json: serde_json::Value =
            serde_json::to_value(Outcome::Win(Seat::White)).unwrap();
        assert_eq!(json["result"], "win");
        assert_eq!(json["seat"], "white");
    }

    #[test]
    fn test_outcome_draw_json_shape() {
        let json: serde_json::Value =
            serde_json::to_value(Outcome::Draw).unwrap();
        assert_eq!(json["result"], "draw");
        assert!(json.get("seat").is_none());
    }

    #[test]
    fn test_outcome_round_trip() {
        for outcome in [
            Outcome::Win(Seat::Black),
            Outcome::Draw,
            Outcome::Abandoned,
        ] {
            let bytes = serde_json::to_vec(&outcome).unwrap();
            let decoded: Outcome = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(outcome, decoded);
        }
    }

    #[test]
    fn test_reason_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&OutcomeReason::DrawAgreement).unwrap(),
            "\"draw-agreement\""
        );
        assert_eq!(
            serde_json::to_string(&OutcomeReason::DisconnectTimeout).unwrap(),
            "\"disconnect-timeout\""
        );
    }

    // =====================================================================
    // ClientEvent
    // =====================================================================

    #[test]
    fn test_client_event_move_json_shape() {
        let ev = ClientEvent::Move {
            session_id: SessionId("s1".into()),
            from: "e2".into(),
            to: "e4".into(),
            promotion: None,
        };
        let json: serde_json::Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "move");
        assert_eq!(json["session_id"], "s1");
        assert_eq!(json["from"], "e2");
        assert_eq!(json["to"], "e4");
    }

    #[test]
    fn test_client_event_move_accepts_legacy_field_names() {
        // The old client generation sent `source`/`target`. Decoding
        // normalizes both spellings into the same canonical variant.
        let legacy = r#"{
            "event": "move",
            "session_id": "s1",
            "source": "g1",
            "target": "f3"
        }"#;
        let ev: ClientEvent = serde_json::from_str(legacy).unwrap();
        assert_eq!(
            ev,
            ClientEvent::Move {
                session_id: SessionId("s1".into()),
                from: "g1".into(),
                to: "f3".into(),
                promotion: None,
            }
        );
    }

    #[test]
    fn test_client_event_move_with_promotion() {
        let json = r#"{
            "event": "move",
            "session_id": "s1",
            "from": "e7",
            "to": "e8",
            "promotion": "queen"
        }"#;
        let ev: ClientEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(
            ev,
            ClientEvent::Move {
                promotion: Some(Promotion::Queen),
                ..
            }
        ));
    }

    #[test]
    fn test_client_event_hello_token_optional() {
        let ev: ClientEvent =
            serde_json::from_str(r#"{"event": "hello"}"#).unwrap();
        assert_eq!(ev, ClientEvent::Hello { token: None });
    }

    #[test]
    fn test_client_event_join_or_create_without_id() {
        let ev: ClientEvent =
            serde_json::from_str(r#"{"event": "join-or-create"}"#).unwrap();
        assert_eq!(ev, ClientEvent::JoinOrCreate { session_id: None });
    }

    #[test]
    fn test_client_event_draw_events_round_trip() {
        for ev in [
            ClientEvent::OfferDraw {
                session_id: SessionId("s".into()),
            },
            ClientEvent::AcceptDraw {
                session_id: SessionId("s".into()),
            },
            ClientEvent::DeclineDraw {
                session_id: SessionId("s".into()),
            },
        ] {
            let bytes = serde_json::to_vec(&ev).unwrap();
            let decoded: ClientEvent = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(ev, decoded);
        }
    }

    #[test]
    fn test_client_event_heartbeat_json_shape() {
        let json = serde_json::to_string(&ClientEvent::Heartbeat).unwrap();
        assert_eq!(json, r#"{"event":"heartbeat"}"#);
    }

    #[test]
    fn test_client_event_names_cover_every_variant() {
        // Each name in the constant must decode to *something* (with the
        // right fields) — a drifted list would misclassify known events
        // as unknown.
        for name in CLIENT_EVENT_NAMES {
            let probe = serde_json::json!({
                "event": name,
                "session_id": "s1",
                "from": "e2",
                "to": "e4",
            });
            let result: Result<ClientEvent, _> =
                serde_json::from_value(probe);
            assert!(result.is_ok(), "{name} did not decode");
        }
    }

    // =====================================================================
    // ServerEvent
    // =====================================================================

    #[test]
    fn test_server_event_session_created_json_shape() {
        let ev = ServerEvent::SessionCreated {
            session_id: SessionId("s9".into()),
            seat: Seat::White,
        };
        let json: serde_json::Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "session-created");
        assert_eq!(json["session_id"], "s9");
        assert_eq!(json["seat"], "white");
    }

    #[test]
    fn test_server_event_session_terminal_json_shape() {
        let ev = ServerEvent::SessionTerminal {
            outcome: Outcome::Win(Seat::Black),
            reason: OutcomeReason::Resignation,
            final_position: "8/8/8/8/8/8/8/8 w - - 0 1".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "session-terminal");
        assert_eq!(json["outcome"]["result"], "win");
        assert_eq!(json["outcome"]["seat"], "black");
        assert_eq!(json["reason"], "resignation");
    }

    #[test]
    fn test_server_event_draw_offered_json_shape() {
        let ev = ServerEvent::DrawOffered { by: Seat::White };
        let json: serde_json::Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "draw-offered");
        assert_eq!(json["by"], "white");
    }

    #[test]
    fn test_server_event_error_json_shape() {
        let ev = ServerEvent::Error {
            code: 403,
            message: "not your turn".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["code"], 403);
        assert_eq!(json["message"], "not your turn");
    }

    #[test]
    fn test_server_event_position_updated_round_trip() {
        let ev = ServerEvent::PositionUpdated {
            session_id: SessionId("s1".into()),
            position: "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"
                .into(),
            last_move: MoveRecord {
                from: "e2".into(),
                to: "e4".into(),
                promotion: None,
                position:
                    "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"
                        .into(),
                ply: 0,
            },
        };
        let bytes = serde_json::to_vec(&ev).unwrap();
        let decoded: ServerEvent = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(ev, decoded);
    }

    #[test]
    fn test_server_event_unit_variants_round_trip() {
        for ev in [
            ServerEvent::OpponentDisconnected,
            ServerEvent::OpponentReconnected,
            ServerEvent::HeartbeatAck,
        ] {
            let bytes = serde_json::to_vec(&ev).unwrap();
            let decoded: ServerEvent = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(ev, decoded);
        }
    }

    #[test]
    fn test_move_record_omits_absent_promotion() {
        let record = MoveRecord {
            from: "e2".into(),
            to: "e4".into(),
            promotion: None,
            position: "fen".into(),
            ply: 0,
        };
        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert!(json.get("promotion").is_none());
    }
}
