//! Wire protocol for Gambit.
//!
//! This crate defines the "language" that clients and servers speak:
//!
//! - **Types** ([`ClientEvent`], [`ServerEvent`], [`Outcome`], etc.) —
//!   the frames that travel on the wire and the identity/outcome types
//!   shared by every other layer.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how frames become bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong doing so.
//!
//! The protocol layer knows nothing about connections or sessions; it
//! only (de)serializes frames and normalizes legacy field spellings into
//! one canonical event type.

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    CLIENT_EVENT_NAMES, ClientEvent, MoveRecord, Outcome, OutcomeReason,
    PlayerIdentity, Promotion, Seat, ServerEvent, SessionId,
};
