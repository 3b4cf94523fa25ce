//! Authentication hook for resolving a connection to a player identity.
//!
//! Gambit does not issue or verify credentials itself — that belongs to
//! whatever auth provider the deployment uses. The [`Authenticator`]
//! trait is the boundary: one async method from an optional token to a
//! [`PlayerIdentity`], called once per connection when the client's
//! `hello` frame arrives.

use gambit_protocol::PlayerIdentity;
use rand::Rng;

use crate::RegistryError;

/// Resolves a client's credential to an identity.
///
/// `Send + Sync + 'static` because the authenticator is shared across
/// connection tasks for the lifetime of the server.
pub trait Authenticator: Send + Sync + 'static {
    /// Validates the given token and returns the player's identity.
    ///
    /// A `None` token is a client connecting without credentials;
    /// implementations decide whether that yields a guest identity or a
    /// rejection.
    fn authenticate(
        &self,
        token: Option<&str>,
    ) -> impl std::future::Future<Output = Result<PlayerIdentity, RegistryError>> + Send;
}

/// The development authenticator: any non-empty token is taken at face
/// value as a registered account name; no token means a fresh guest.
///
/// Production deployments replace this with a JWT/API validator; the
/// session layer only ever sees the resulting [`PlayerIdentity`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GuestAuthenticator;

impl Authenticator for GuestAuthenticator {
    async fn authenticate(
        &self,
        token: Option<&str>,
    ) -> Result<PlayerIdentity, RegistryError> {
        match token {
            Some(name) if !name.is_empty() => {
                Ok(PlayerIdentity::Registered(name.to_string()))
            }
            _ => Ok(PlayerIdentity::Guest(guest_name())),
        }
    }
}

/// Generates a short random guest name like `g-1f9a0b`.
fn guest_name() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 3] = rng.random();
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("g-{hex}")
}
