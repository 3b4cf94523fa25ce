//! The session state machine: seats, lifecycle, moves, draw offers and
//! the terminal handoff.
//!
//! `Session` is a plain synchronous structure. The actor in
//! [`crate::actor`] owns one per task and feeds it commands; keeping the
//! rules here means every transition is unit-testable without a runtime.

use std::sync::Arc;

// The tokio clock, not the wall clock: session ages and suspension
// spans follow the same clock as the grace and reap timers.
use tokio::time::Instant;

use gambit_protocol::{
    MoveRecord, Outcome, OutcomeReason, PlayerIdentity, Promotion, Seat,
    ServerEvent, SessionId,
};
use gambit_registry::EventSender;

use crate::oracle::{OracleError, RulesOracle, TerminalClassification};
use crate::rating::{RatedResult, RatingEngine};
use crate::recorder::{RatingAdjustment, ResultRecorder, SessionRecord};
use crate::SessionError;

/// The external collaborators a session consults.
pub struct Collaborators {
    pub oracle: Arc<dyn RulesOracle>,
    pub rating: Arc<dyn RatingEngine>,
    pub recorder: Arc<dyn ResultRecorder>,
}

/// One seat: who holds it and, while they are connected, where their
/// events go.
#[derive(Debug)]
struct SeatSlot {
    identity: PlayerIdentity,
    sender: Option<EventSender>,
}

/// Lifecycle stage of a session.
#[derive(Debug, Clone)]
enum Lifecycle {
    /// One seat filled, waiting for an opponent.
    Open,
    /// Both seats filled and connected, game in progress.
    Active,
    /// One player dropped mid-game; the grace clock is running.
    Suspended { missing: Seat, since: Instant },
    /// Finished. No transition leaves this stage.
    Terminal {
        outcome: Outcome,
        reason: OutcomeReason,
    },
}

/// Coarse lifecycle stage, exposed for the manager's scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    Open,
    Active,
    Suspended,
    Terminal,
}

/// Result of a successful join.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    /// The seat the joiner now occupies.
    pub seat: Seat,
    /// Who sits across the board.
    pub opponent: PlayerIdentity,
    /// True when this was a reconnection rather than a fresh join.
    pub resumed: bool,
}

/// What a disconnect did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectAction {
    /// The session reached a terminal stage and can be removed.
    TornDown,
    /// The session entered the grace period. The epoch identifies this
    /// particular suspension; a reconnect bumps it, invalidating any
    /// timer armed for the old value.
    Suspended { epoch: u64 },
    /// The player had no live seat here (already terminal, or a stale
    /// disconnect after a rebind).
    AlreadyGone,
}

/// A two-player game session.
pub struct Session {
    id: SessionId,
    white: SeatSlot,
    black: Option<SeatSlot>,
    position: String,
    history: Vec<MoveRecord>,
    lifecycle: Lifecycle,
    /// Seat with an outstanding draw offer.
    pending_draw: Option<Seat>,
    created_at: Instant,
    /// Set in the same step as the Terminal transition, so the handoff
    /// runs at most once no matter how the session ends.
    handoff_done: bool,
    grace_epoch: u64,
    collab: Arc<Collaborators>,
}

impl Session {
    /// Creates a session with the creator seated as white.
    pub fn create(
        id: SessionId,
        creator: PlayerIdentity,
        sender: EventSender,
        collab: Arc<Collaborators>,
    ) -> Self {
        let position = collab.oracle.starting_position();
        Self {
            id,
            white: SeatSlot {
                identity: creator,
                sender: Some(sender),
            },
            black: None,
            position,
            history: Vec::new(),
            lifecycle: Lifecycle::Open,
            pending_draw: None,
            created_at: Instant::now(),
            handoff_done: false,
            grace_epoch: 0,
            collab,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn stage(&self) -> SessionStage {
        match self.lifecycle {
            Lifecycle::Open => SessionStage::Open,
            Lifecycle::Active => SessionStage::Active,
            Lifecycle::Suspended { .. } => SessionStage::Suspended,
            Lifecycle::Terminal { .. } => SessionStage::Terminal,
        }
    }

    pub fn ply(&self) -> u32 {
        self.history.len() as u32
    }

    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    fn seat_of(&self, identity: &PlayerIdentity) -> Option<Seat> {
        if &self.white.identity == identity {
            return Some(Seat::White);
        }
        match &self.black {
            Some(slot) if &slot.identity == identity => Some(Seat::Black),
            _ => None,
        }
    }

    fn slot(&self, seat: Seat) -> Option<&SeatSlot> {
        match seat {
            Seat::White => Some(&self.white),
            Seat::Black => self.black.as_ref(),
        }
    }

    fn slot_mut(&mut self, seat: Seat) -> Option<&mut SeatSlot> {
        match seat {
            Seat::White => Some(&mut self.white),
            Seat::Black => self.black.as_mut(),
        }
    }

    /// Sends an event to one seat. Drops silently if the seat is empty
    /// or disconnected.
    fn send_to(&self, seat: Seat, event: ServerEvent) {
        if let Some(slot) = self.slot(seat) {
            if let Some(sender) = &slot.sender {
                let _ = sender.send(event);
            }
        }
    }

    fn broadcast(&self, event: ServerEvent) {
        self.send_to(Seat::White, event.clone());
        self.send_to(Seat::Black, event);
    }

    /// Seats a player, replaces a dropped sender on reconnect, or
    /// refreshes the sender after a rebind.
    pub fn join(
        &mut self,
        identity: PlayerIdentity,
        sender: EventSender,
    ) -> Result<JoinOutcome, SessionError> {
        if let Some(seat) = self.seat_of(&identity) {
            return self.rejoin(seat, sender);
        }

        match self.lifecycle {
            Lifecycle::Open => {}
            Lifecycle::Terminal { .. } => {
                return Err(SessionError::Finished(self.id.clone()))
            }
            _ => return Err(SessionError::SessionFull(self.id.clone())),
        }

        self.black = Some(SeatSlot {
            identity: identity.clone(),
            sender: Some(sender),
        });
        self.lifecycle = Lifecycle::Active;
        tracing::info!(session_id = %self.id.0, player = %identity, "session active");

        self.send_to(
            Seat::White,
            ServerEvent::OpponentJoined { opponent: identity },
        );

        Ok(JoinOutcome {
            seat: Seat::Black,
            opponent: self.white.identity.clone(),
            resumed: false,
        })
    }

    fn rejoin(
        &mut self,
        seat: Seat,
        sender: EventSender,
    ) -> Result<JoinOutcome, SessionError> {
        match self.lifecycle {
            Lifecycle::Open => {
                // The creator is the only occupant of an open session.
                // If their previous channel is dead this is a reconnect
                // after a rebind kick and the sender is refreshed;
                // otherwise they asked to be their own opponent.
                let stale = self
                    .slot(seat)
                    .and_then(|s| s.sender.as_ref())
                    .is_none_or(|tx| tx.is_closed());
                if !stale {
                    return Err(SessionError::OwnSessionJoin(self.id.clone()));
                }
                if let Some(slot) = self.slot_mut(seat) {
                    slot.sender = Some(sender);
                }
                let opponent = self.white.identity.clone();
                return Ok(JoinOutcome {
                    seat,
                    opponent,
                    resumed: true,
                });
            }
            Lifecycle::Terminal { .. } => {
                return Err(SessionError::Finished(self.id.clone()))
            }
            Lifecycle::Active => {
                // Rebind race: a fresh connection for a seat that never
                // went through a disconnect. Swap the sender in place.
                if let Some(slot) = self.slot_mut(seat) {
                    slot.sender = Some(sender);
                }
            }
            Lifecycle::Suspended { missing, .. } => {
                if missing != seat {
                    // The connected player opened a second connection.
                    if let Some(slot) = self.slot_mut(seat) {
                        slot.sender = Some(sender);
                    }
                } else {
                    if let Some(slot) = self.slot_mut(seat) {
                        slot.sender = Some(sender);
                    }
                    self.lifecycle = Lifecycle::Active;
                    self.grace_epoch += 1;
                    tracing::info!(
                        session_id = %self.id.0,
                        seat = %seat,
                        "player reconnected within grace period"
                    );
                    self.send_to(seat.other(), ServerEvent::OpponentReconnected);
                }
            }
        }

        // Resync the rejoiner: current position plus the move that
        // produced it.
        if let Some(last) = self.history.last() {
            self.send_to(
                seat,
                ServerEvent::PositionUpdated {
                    session_id: self.id.clone(),
                    position: self.position.clone(),
                    last_move: last.clone(),
                },
            );
        }

        let opponent = match seat {
            Seat::White => self
                .black
                .as_ref()
                .map(|s| s.identity.clone())
                .unwrap_or_else(|| self.white.identity.clone()),
            Seat::Black => self.white.identity.clone(),
        };
        Ok(JoinOutcome {
            seat,
            opponent,
            resumed: true,
        })
    }

    /// Validates and applies one move, broadcasting the new position.
    pub fn apply_move(
        &mut self,
        identity: &PlayerIdentity,
        from: &str,
        to: &str,
        promotion: Option<Promotion>,
    ) -> Result<(), SessionError> {
        match self.lifecycle {
            Lifecycle::Active => {}
            Lifecycle::Terminal { .. } => {
                return Err(SessionError::Finished(self.id.clone()))
            }
            _ => return Err(SessionError::NotActive(self.id.clone())),
        }

        let seat = self
            .seat_of(identity)
            .ok_or_else(|| SessionError::NotAPlayer(identity.clone()))?;
        if Seat::to_move(self.ply()) != seat {
            return Err(SessionError::NotYourTurn(identity.clone()));
        }

        let verdict = self
            .collab
            .oracle
            .validate_move(&self.position, from, to, promotion)
            .map_err(|e| match e {
                OracleError::Illegal(msg) | OracleError::Malformed(msg) => {
                    SessionError::IllegalMove(msg)
                }
            })?;

        // Ply index counts accepted moves: the first move carries 1.
        let record = MoveRecord {
            from: from.to_string(),
            to: to.to_string(),
            promotion,
            position: verdict.new_position.clone(),
            ply: self.ply() + 1,
        };
        self.position = verdict.new_position;
        self.history.push(record.clone());
        // A move on the board retracts any outstanding draw offer.
        self.pending_draw = None;

        self.broadcast(ServerEvent::PositionUpdated {
            session_id: self.id.clone(),
            position: self.position.clone(),
            last_move: record,
        });

        if let Some(class) = verdict.terminal {
            let (outcome, reason) = match class {
                TerminalClassification::Checkmate => {
                    (Outcome::Win(seat), OutcomeReason::Checkmate)
                }
                TerminalClassification::Stalemate
                | TerminalClassification::RuleDraw => {
                    (Outcome::Draw, OutcomeReason::RuleDraw)
                }
            };
            self.finish(outcome, reason);
        }

        Ok(())
    }

    /// Concedes the game. Permitted while suspended too, so the player
    /// still at the board does not have to wait out the grace period.
    pub fn resign(
        &mut self,
        identity: &PlayerIdentity,
    ) -> Result<(), SessionError> {
        match self.lifecycle {
            Lifecycle::Active | Lifecycle::Suspended { .. } => {}
            Lifecycle::Terminal { .. } => {
                return Err(SessionError::Finished(self.id.clone()))
            }
            Lifecycle::Open => {
                return Err(SessionError::NotActive(self.id.clone()))
            }
        }

        let seat = self
            .seat_of(identity)
            .ok_or_else(|| SessionError::NotAPlayer(identity.clone()))?;
        self.finish(Outcome::Win(seat.other()), OutcomeReason::Resignation);
        Ok(())
    }

    /// Places a draw offer on the table.
    pub fn offer_draw(
        &mut self,
        identity: &PlayerIdentity,
    ) -> Result<(), SessionError> {
        match self.lifecycle {
            Lifecycle::Active => {}
            Lifecycle::Terminal { .. } => {
                return Err(SessionError::Finished(self.id.clone()))
            }
            _ => return Err(SessionError::NotActive(self.id.clone())),
        }

        let seat = self
            .seat_of(identity)
            .ok_or_else(|| SessionError::NotAPlayer(identity.clone()))?;

        match self.pending_draw {
            // Repeating your own offer changes nothing.
            Some(pending) if pending == seat => Ok(()),
            // A counter-offer while the opponent's offer stands must be
            // an explicit accept, not a second offer.
            Some(_) => Err(SessionError::OfferPending),
            None => {
                self.pending_draw = Some(seat);
                self.send_to(seat.other(), ServerEvent::DrawOffered { by: seat });
                Ok(())
            }
        }
    }

    pub fn accept_draw(
        &mut self,
        identity: &PlayerIdentity,
    ) -> Result<(), SessionError> {
        let seat = self.check_draw_response(identity)?;
        debug_assert_eq!(self.pending_draw, Some(seat.other()));
        self.finish(Outcome::Draw, OutcomeReason::DrawAgreement);
        Ok(())
    }

    pub fn decline_draw(
        &mut self,
        identity: &PlayerIdentity,
    ) -> Result<(), SessionError> {
        let seat = self.check_draw_response(identity)?;
        self.pending_draw = None;
        self.send_to(seat.other(), ServerEvent::DrawDeclined { by: seat });
        Ok(())
    }

    fn check_draw_response(
        &self,
        identity: &PlayerIdentity,
    ) -> Result<Seat, SessionError> {
        match self.lifecycle {
            Lifecycle::Active => {}
            Lifecycle::Terminal { .. } => {
                return Err(SessionError::Finished(self.id.clone()))
            }
            _ => return Err(SessionError::NotActive(self.id.clone())),
        }

        let seat = self
            .seat_of(identity)
            .ok_or_else(|| SessionError::NotAPlayer(identity.clone()))?;
        match self.pending_draw {
            None => Err(SessionError::NoPendingOffer),
            Some(pending) if pending == seat => Err(SessionError::OwnOffer),
            Some(_) => Ok(seat),
        }
    }

    /// Handles a dropped connection for the given player.
    pub fn disconnect(&mut self, identity: &PlayerIdentity) -> DisconnectAction {
        let Some(seat) = self.seat_of(identity) else {
            return DisconnectAction::AlreadyGone;
        };

        match self.lifecycle {
            Lifecycle::Terminal { .. } => DisconnectAction::AlreadyGone,
            Lifecycle::Open => {
                // Sole occupant left before anyone joined. Nothing to
                // rate or record.
                self.lifecycle = Lifecycle::Terminal {
                    outcome: Outcome::Abandoned,
                    reason: OutcomeReason::DisconnectTimeout,
                };
                self.handoff_done = true;
                DisconnectAction::TornDown
            }
            Lifecycle::Active => {
                if let Some(slot) = self.slot_mut(seat) {
                    slot.sender = None;
                }
                self.lifecycle = Lifecycle::Suspended {
                    missing: seat,
                    since: Instant::now(),
                };
                self.grace_epoch += 1;
                tracing::info!(
                    session_id = %self.id.0,
                    seat = %seat,
                    "player disconnected, grace period started"
                );
                self.send_to(seat.other(), ServerEvent::OpponentDisconnected);
                DisconnectAction::Suspended {
                    epoch: self.grace_epoch,
                }
            }
            Lifecycle::Suspended { missing, .. } => {
                if missing == seat {
                    // Second disconnect notice for the same absence.
                    return DisconnectAction::AlreadyGone;
                }
                // Both players gone. Nobody is owed a result.
                if let Some(slot) = self.slot_mut(seat) {
                    slot.sender = None;
                }
                self.finish(
                    Outcome::Abandoned,
                    OutcomeReason::DisconnectTimeout,
                );
                DisconnectAction::TornDown
            }
        }
    }

    /// Fires when a grace timer elapses. The epoch guards against a
    /// timer armed for an earlier suspension firing after a reconnect.
    pub fn grace_expired(&mut self, epoch: u64) {
        let Lifecycle::Suspended { missing, since } = self.lifecycle else {
            return;
        };
        if epoch != self.grace_epoch {
            return;
        }
        tracing::info!(
            session_id = %self.id.0,
            seat = %missing,
            suspended_for = ?since.elapsed(),
            "grace period expired, forfeiting"
        );
        self.finish(
            Outcome::Win(missing.other()),
            OutcomeReason::DisconnectTimeout,
        );
    }

    /// Closes a session that never found an opponent.
    pub fn expire_open(&mut self) {
        if !matches!(self.lifecycle, Lifecycle::Open) {
            return;
        }
        tracing::info!(session_id = %self.id.0, "open session expired");
        self.finish(Outcome::Abandoned, OutcomeReason::DisconnectTimeout);
    }

    /// Moves the session to Terminal, notifies both seats and performs
    /// the rating/recording handoff. Runs at most once.
    fn finish(&mut self, outcome: Outcome, reason: OutcomeReason) {
        if self.handoff_done || matches!(self.lifecycle, Lifecycle::Terminal { .. })
        {
            return;
        }
        self.handoff_done = true;
        self.lifecycle = Lifecycle::Terminal { outcome, reason };
        self.pending_draw = None;

        tracing::info!(
            session_id = %self.id.0,
            ?outcome,
            %reason,
            "session terminal"
        );

        self.broadcast(ServerEvent::SessionTerminal {
            outcome,
            reason,
            final_position: self.position.clone(),
        });

        let Some(black) = self.black.as_ref().map(|s| s.identity.clone()) else {
            // Expired open session. Nothing to record.
            return;
        };
        let white = self.white.identity.clone();

        let adjustments = self.compute_adjustments(&white, &black, outcome);

        let record = SessionRecord {
            session_id: self.id.clone(),
            white,
            black,
            outcome,
            reason,
            final_position: self.position.clone(),
            moves: self.history.clone(),
            adjustments,
        };

        if let Err(e) = self.collab.recorder.record(&record) {
            // The handoff flag stays set. The record is lost from the
            // session's point of view; recovery is the recorder's job.
            tracing::warn!(
                session_id = %self.id.0,
                error = %e,
                "result recorder failed"
            );
        }
    }

    /// Rating deltas for a finished game, or `None` when rating does
    /// not apply (guest seat, abandoned game).
    fn compute_adjustments(
        &self,
        white: &PlayerIdentity,
        black: &PlayerIdentity,
        outcome: Outcome,
    ) -> Option<[RatingAdjustment; 2]> {
        if white.is_guest() || black.is_guest() {
            return None;
        }
        let result = RatedResult::from_outcome(outcome)?;

        let rating_white = self.collab.recorder.rating_of(white);
        let rating_black = self.collab.recorder.rating_of(black);
        let (delta_white, delta_black) =
            self.collab
                .rating
                .compute_deltas(rating_white, rating_black, result);

        Some([
            RatingAdjustment {
                identity: white.clone(),
                rating_before: rating_white,
                delta: delta_white,
            },
            RatingAdjustment {
                identity: black.clone(),
                rating_before: rating_black,
                delta: delta_black,
            },
        ])
    }
}
