//! The gate's view of the identity provider.

use async_trait::async_trait;
use oauth_gate_identity::{AuthenticationError, IdentityRecord, RedirectTarget};

/// An OAuth2/OIDC identity provider as the gate uses it.
///
/// The production implementation is [`OidcClient`](super::OidcClient).
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the URL that starts the authorization-code flow, carrying
    /// `target` in the `state` parameter.
    fn authorization_url(&self, target: &RedirectTarget) -> String;

    /// Exchanges an authorization code for a verified identity.
    async fn exchange_code(&self, code: &str) -> Result<IdentityRecord, AuthenticationError>;
}
