//! # Gambit
//!
//! A two-player turn-based game session server.
//!
//! Gambit pairs remote players into sessions, relays validated moves
//! between them in real time over WebSocket, negotiates session-ending
//! events (checkmate, resignation, draw agreement, disconnect timeout),
//! and records finished games together with Elo rating adjustments.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use gambit::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), GambitError> {
//!     let server = GambitServerBuilder::new()
//!         .bind("0.0.0.0:8080")
//!         .build(GuestAuthenticator)
//!         .await?;
//!     server.run().await
//! }
//! ```

mod error;
mod handler;
mod server;

pub use error::GambitError;
pub use server::{GambitServer, GambitServerBuilder};

/// Everything needed to stand up a server.
pub mod prelude {
    pub use crate::{GambitError, GambitServer, GambitServerBuilder};
    pub use gambit_protocol::{
        ClientEvent, Codec, JsonCodec, MoveRecord, Outcome, OutcomeReason,
        PlayerIdentity, Promotion, Seat, ServerEvent, SessionId,
    };
    pub use gambit_registry::{
        Authenticator, GuestAuthenticator, RegistryConfig,
    };
    pub use gambit_rules::ChessOracle;
    pub use gambit_session::{
        Collaborators, EloRating, MemoryRecorder, RatingEngine,
        ResultRecorder, RulesOracle, SessionConfig,
    };
}
