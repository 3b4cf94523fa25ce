//! Session lifecycle management for Gambit.
//!
//! Each session runs as an isolated Tokio task (actor model) owning a
//! [`Session`] state machine: seats, turn order, the draw sub-protocol
//! and the exactly-once terminal handoff to the rating and recording
//! collaborators.
//!
//! # Key types
//!
//! - [`SessionManager`] — creates/reaps sessions, routes players
//! - [`SessionHandle`] — send commands to a running session actor
//! - [`RulesOracle`] — move validation boundary
//! - [`RatingEngine`] / [`ResultRecorder`] — terminal handoff targets
//! - [`SessionConfig`] — grace period and open-session timeout

mod actor;
mod config;
mod error;
mod manager;
mod oracle;
mod rating;
mod recorder;
mod session;

pub use actor::{SessionHandle, SessionInfo};
pub use config::SessionConfig;
pub use error::SessionError;
pub use manager::{Placement, SessionManager};
pub use oracle::{MoveVerdict, OracleError, RulesOracle, TerminalClassification};
pub use rating::{EloRating, RatedResult, RatingEngine};
pub use recorder::{
    MemoryRecorder, RatingAdjustment, RecorderError, ResultRecorder,
    SessionRecord, DEFAULT_RATING,
};
pub use session::{Collaborators, DisconnectAction, JoinOutcome, SessionStage};
