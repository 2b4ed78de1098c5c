//! Authentication gate for the oauth-gate server.
//!
//! This module provides:
//! - OIDC authentication with an external identity provider (Google by default)
//! - A signing-key cache refreshed in the background
//! - The gate middleware that classifies every request and runs the login,
//!   callback, and logout legs of the authorization-code flow
//! - Request-scoped user context and the extractors downstream handlers use
//!
//! # Session Model
//!
//! There is no server-side session store. The authenticated identity is
//! encoded into the `auth_session` cookie, which is encrypted and authenticated
//! with the server key (a private cookie). Every gated request decrypts and
//! decodes it; anything that does not decode is treated as "not logged in".
//!
//! Email verification is checked once, when the callback builds the
//! `IdentityRecord`. Logging out clears the cookie on this browser only.

pub mod context;
pub mod keys;
pub mod middleware;
pub mod oidc;
pub mod provider;
pub mod routes;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use axum_extra::extract::cookie::Key;
use oauth_gate_identity::SessionCodec;

pub use context::{
    AuthenticatedIdentity, CurrentUser, OptionalIdentity, RequireUser, UserContext,
    propagate_user_context,
};
pub use keys::SigningKeyCache;
pub use middleware::{GateRejection, SESSION_COOKIE, authenticate};
pub use oidc::{OidcClient, OidcError};
pub use provider::IdentityProvider;
pub use routes::{AuthPaths, Route};

/// Shared state of the authentication gate.
pub struct AuthGate {
    /// Identity provider used for the login and callback legs.
    pub(crate) provider: Arc<dyn IdentityProvider>,
    /// Session credential codec.
    pub(crate) codec: SessionCodec,
    /// Key for the private session cookie.
    pub(crate) key: Key,
    /// Path layout.
    pub(crate) paths: AuthPaths,
    /// Whether the session cookie carries the Secure flag.
    pub(crate) secure_cookies: bool,
}

impl AuthGate {
    /// Creates a gate.
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        codec: SessionCodec,
        key: Key,
        paths: AuthPaths,
        secure_cookies: bool,
    ) -> Self {
        Self {
            provider,
            codec,
            key,
            paths,
            secure_cookies,
        }
    }

    /// Returns the gate's path layout.
    pub fn paths(&self) -> &AuthPaths {
        &self.paths
    }
}
