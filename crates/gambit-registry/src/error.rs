//! Error types for the connection registry.

use gambit_protocol::PlayerIdentity;

/// Errors that can occur during identity binding.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The credential was invalid, expired, or rejected by the
    /// [`Authenticator`](crate::Authenticator).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// No live connection is bound to the given identity.
    #[error("no connection bound for {0}")]
    NotBound(PlayerIdentity),
}
