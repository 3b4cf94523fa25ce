//! The result recorder boundary: durable storage for finished sessions.

use std::collections::HashMap;
use std::sync::Mutex;

use gambit_protocol::{
    MoveRecord, Outcome, OutcomeReason, PlayerIdentity, SessionId,
};
use serde::{Deserialize, Serialize};

/// One seat's rating change for a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingAdjustment {
    pub identity: PlayerIdentity,
    pub rating_before: i32,
    pub delta: i32,
}

/// Everything the recorder needs about one finished session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub white: PlayerIdentity,
    pub black: PlayerIdentity,
    pub outcome: Outcome,
    pub reason: OutcomeReason,
    pub final_position: String,
    pub moves: Vec<MoveRecord>,
    /// `None` when rating was skipped (guest on either seat).
    pub adjustments: Option<[RatingAdjustment; 2]>,
}

/// Errors from the recorder.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    /// The store is unreachable. The session still completes from the
    /// players' point of view; the failure is logged for out-of-band
    /// retry.
    #[error("recorder unavailable: {0}")]
    Unavailable(String),
}

/// Durable append of finished sessions plus the account-rating store.
///
/// `record` must be idempotent on `session_id`: the session layer calls
/// it at most once per session, but out-of-band retries after a logged
/// failure may replay a record.
pub trait ResultRecorder: Send + Sync + 'static {
    /// Current rating for an identity (a default for accounts that have
    /// never played).
    fn rating_of(&self, identity: &PlayerIdentity) -> i32;

    /// Atomically appends the record and applies its rating adjustments.
    fn record(&self, record: &SessionRecord) -> Result<(), RecorderError>;
}

/// Rating assigned to accounts that have never finished a game.
pub const DEFAULT_RATING: i32 = 1200;

/// In-memory [`ResultRecorder`] for development servers and tests.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    inner: Mutex<MemoryStore>,
}

#[derive(Debug, Default)]
struct MemoryStore {
    ratings: HashMap<String, i32>,
    games: Vec<SessionRecord>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded sessions. Test hook.
    pub fn recorded(&self) -> usize {
        self.inner.lock().expect("recorder lock").games.len()
    }

    /// Returns the stored record for a session, if any. Test hook.
    pub fn record_for(&self, session_id: &SessionId) -> Option<SessionRecord> {
        self.inner
            .lock()
            .expect("recorder lock")
            .games
            .iter()
            .find(|g| &g.session_id == session_id)
            .cloned()
    }
}

impl ResultRecorder for MemoryRecorder {
    fn rating_of(&self, identity: &PlayerIdentity) -> i32 {
        self.inner
            .lock()
            .expect("recorder lock")
            .ratings
            .get(identity.name())
            .copied()
            .unwrap_or(DEFAULT_RATING)
    }

    fn record(&self, record: &SessionRecord) -> Result<(), RecorderError> {
        let mut store = self.inner.lock().expect("recorder lock");

        // Idempotent on session id: a replay changes nothing.
        if store.games.iter().any(|g| g.session_id == record.session_id) {
            return Ok(());
        }

        if let Some(adjustments) = &record.adjustments {
            for adj in adjustments {
                let rating = store
                    .ratings
                    .entry(adj.identity.name().to_string())
                    .or_insert(DEFAULT_RATING);
                *rating += adj.delta;
            }
        }
        store.games.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gambit_protocol::Seat;

    fn record(id: &str) -> SessionRecord {
        SessionRecord {
            session_id: SessionId(id.into()),
            white: PlayerIdentity::Registered("alice".into()),
            black: PlayerIdentity::Registered("bob".into()),
            outcome: Outcome::Win(Seat::White),
            reason: OutcomeReason::Checkmate,
            final_position: "fen".into(),
            moves: vec![],
            adjustments: Some([
                RatingAdjustment {
                    identity: PlayerIdentity::Registered("alice".into()),
                    rating_before: 1200,
                    delta: 16,
                },
                RatingAdjustment {
                    identity: PlayerIdentity::Registered("bob".into()),
                    rating_before: 1200,
                    delta: -16,
                },
            ]),
        }
    }

    #[test]
    fn test_unknown_identity_gets_default_rating() {
        let recorder = MemoryRecorder::new();
        assert_eq!(
            recorder.rating_of(&PlayerIdentity::Registered("new".into())),
            DEFAULT_RATING
        );
    }

    #[test]
    fn test_record_applies_adjustments() {
        let recorder = MemoryRecorder::new();
        recorder.record(&record("s1")).unwrap();

        assert_eq!(recorder.recorded(), 1);
        assert_eq!(
            recorder.rating_of(&PlayerIdentity::Registered("alice".into())),
            1216
        );
        assert_eq!(
            recorder.rating_of(&PlayerIdentity::Registered("bob".into())),
            1184
        );
    }

    #[test]
    fn test_record_is_idempotent_on_session_id() {
        let recorder = MemoryRecorder::new();
        recorder.record(&record("s1")).unwrap();
        recorder.record(&record("s1")).unwrap();

        assert_eq!(recorder.recorded(), 1);
        // Deltas were not applied twice.
        assert_eq!(
            recorder.rating_of(&PlayerIdentity::Registered("alice".into())),
            1216
        );
    }

    #[test]
    fn test_record_without_adjustments_stores_game_only() {
        let recorder = MemoryRecorder::new();
        let mut rec = record("s2");
        rec.adjustments = None;
        recorder.record(&rec).unwrap();

        assert_eq!(recorder.recorded(), 1);
        assert_eq!(
            recorder.rating_of(&PlayerIdentity::Registered("alice".into())),
            DEFAULT_RATING
        );
    }
}
