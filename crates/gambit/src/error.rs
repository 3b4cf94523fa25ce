//! Unified error type for the Gambit server.

use gambit_protocol::ProtocolError;
use gambit_registry::RegistryError;
use gambit_session::SessionError;
use gambit_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When embedding the `gambit` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate.
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum GambitError {
    /// A transport-level error (connection, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A registry-level error (authentication, binding).
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A session-level error (turn order, lifecycle, draw offers).
    #[error(transparent)]
    Session(#[from] SessionError),
}
