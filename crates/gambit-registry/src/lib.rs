//! Connection registry for Gambit.
//!
//! This crate binds transient network connections to logical player
//! identities:
//!
//! 1. **Authentication** — resolving a credential to a
//!    [`PlayerIdentity`](gambit_protocol::PlayerIdentity) via the
//!    [`Authenticator`] trait.
//! 2. **Binding** — tracking which connection currently speaks for each
//!    identity, with a single-active-connection policy
//!    ([`ConnectionRegistry`]).
//! 3. **Liveness** — detecting silent connections from missed heartbeats
//!    and force-closing them through the ordinary disconnect path.
//!
//! The session layer above consumes disconnect notifications from here;
//! it never talks to sockets directly.

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod registry;

pub use auth::{Authenticator, GuestAuthenticator};
pub use error::RegistryError;
pub use registry::{
    ConnectionRegistry, EventSender, KickSender, RegistryConfig,
};
