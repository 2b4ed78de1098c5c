//! OIDC client implementation using the openidconnect crate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use oauth_gate_identity::{
    AuthenticationError, IdentityRecord, OidcConfig, ProviderClaims, RedirectTarget,
};
use openidconnect::core::{CoreAuthPrompt, CoreAuthenticationFlow, CoreProviderMetadata};
use openidconnect::{
    AuthType, AuthorizationCode, ClientId, ClientSecret, CsrfToken, IssuerUrl, Nonce,
    RedirectUrl, Scope, TokenResponse,
};
use rootcause::prelude::Report;

use super::keys::SigningKeyCache;
use super::provider::IdentityProvider;

/// Type alias for the OIDC client with endpoints set from provider metadata
type ConfiguredCoreClient = openidconnect::Client<
    openidconnect::EmptyAdditionalClaims,
    openidconnect::core::CoreAuthDisplay,
    openidconnect::core::CoreGenderClaim,
    openidconnect::core::CoreJweContentEncryptionAlgorithm,
    openidconnect::core::CoreJsonWebKey,
    openidconnect::core::CoreAuthPrompt,
    openidconnect::StandardErrorResponse<openidconnect::core::CoreErrorResponseType>,
    openidconnect::core::CoreTokenResponse,
    openidconnect::core::CoreTokenIntrospectionResponse,
    openidconnect::core::CoreRevocableToken,
    openidconnect::core::CoreRevocationErrorResponse,
    openidconnect::EndpointSet,
    openidconnect::EndpointNotSet,
    openidconnect::EndpointNotSet,
    openidconnect::EndpointNotSet,
    openidconnect::EndpointMaybeSet,
    openidconnect::EndpointMaybeSet,
>;

/// OIDC client for authenticating users.
pub struct OidcClient {
    provider_metadata: CoreProviderMetadata,
    client_id: ClientId,
    client_secret: ClientSecret,
    redirect_url: RedirectUrl,
    scopes: Vec<String>,
    http_client: reqwest::Client,
    signing_keys: Arc<SigningKeyCache>,
    timeout: Duration,
}

impl OidcClient {
    /// Creates a new OIDC client by discovering the provider metadata.
    ///
    /// Every provider call, discovery included, is bounded by `timeout`.
    pub async fn discover(
        config: &OidcConfig,
        timeout: Duration,
        signing_keys_refresh: Duration,
    ) -> Result<Self, Report<OidcError>> {
        let issuer_url = IssuerUrl::new(config.issuer_url().to_string())
            .map_err(|e| OidcError::Configuration(format!("invalid issuer URL: {}", e)))?;

        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| {
                OidcError::Configuration(format!("failed to create HTTP client: {}", e))
            })?;

        let provider_metadata = CoreProviderMetadata::discover_async(issuer_url, &http_client)
            .await
            .map_err(|e| OidcError::Discovery(format!("failed to discover provider: {}", e)))?;

        let signing_keys = Arc::new(SigningKeyCache::new(
            provider_metadata.jwks_uri().url().clone(),
            provider_metadata.jwks().clone(),
            http_client.clone(),
            signing_keys_refresh,
        ));

        tracing::info!(
            issuer = %config.issuer_url(),
            signing_keys = signing_keys.current().keys().len(),
            "discovered identity provider"
        );

        Self::from_metadata(config, provider_metadata, signing_keys, http_client, timeout)
    }

    /// Creates a client from already-known provider metadata.
    pub fn from_metadata(
        config: &OidcConfig,
        provider_metadata: CoreProviderMetadata,
        signing_keys: Arc<SigningKeyCache>,
        http_client: reqwest::Client,
        timeout: Duration,
    ) -> Result<Self, Report<OidcError>> {
        let redirect_url = RedirectUrl::new(config.redirect_uri().to_string())
            .map_err(|e| OidcError::Configuration(format!("invalid redirect URI: {}", e)))?;

        if provider_metadata.token_endpoint().is_none() {
            return Err(
                OidcError::Discovery("provider metadata has no token endpoint".to_string()).into(),
            );
        }

        Ok(Self {
            provider_metadata,
            client_id: ClientId::new(config.client_id().to_string()),
            client_secret: ClientSecret::new(config.client_secret().to_string()),
            redirect_url,
            scopes: config.scopes().to_vec(),
            http_client,
            signing_keys,
            timeout,
        })
    }

    /// Overrides the bound on provider calls.
    #[cfg(test)]
    pub(crate) fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the signing-key cache used to verify ID tokens.
    pub fn signing_keys(&self) -> &Arc<SigningKeyCache> {
        &self.signing_keys
    }

    /// Builds a client that verifies against the current signing keys.
    fn core_client(&self) -> ConfiguredCoreClient {
        let metadata = self
            .provider_metadata
            .clone()
            .set_jwks((*self.signing_keys.current()).clone());

        openidconnect::core::CoreClient::from_provider_metadata(
            metadata,
            self.client_id.clone(),
            Some(self.client_secret.clone()),
        )
        .set_redirect_uri(self.redirect_url.clone())
        .set_auth_type(AuthType::RequestBody)
    }

    async fn exchange(&self, code: &str) -> Result<IdentityRecord, AuthenticationError> {
        let client = self.core_client();

        let token_response = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .map_err(|e| AuthenticationError::TokenExchange {
                reason: e.to_string(),
            })?
            .request_async(&self.http_client)
            .await
            .map_err(|e| AuthenticationError::TokenExchange {
                reason: e.to_string(),
            })?;

        let id_token = token_response
            .id_token()
            .ok_or_else(|| AuthenticationError::TokenVerification {
                reason: "no ID token in response".to_string(),
            })?;

        let claims = id_token
            .claims(&client.id_token_verifier(), accept_any_nonce)
            .map_err(|e| AuthenticationError::TokenVerification {
                reason: e.to_string(),
            })?;

        let provider_claims = ProviderClaims::new(claims.subject().to_string())
            .with_email(claims.email().map(|e| e.as_str().to_string()))
            .with_email_verified(claims.email_verified())
            .with_name(
                claims
                    .name()
                    .and_then(|n| n.get(None))
                    .map(|n| n.as_str().to_string()),
            )
            .with_picture(
                claims
                    .picture()
                    .and_then(|p| p.get(None))
                    .map(|p| p.as_str().to_string()),
            );

        IdentityRecord::from_claims(provider_claims)
    }
}

/// The login leg keeps no server-side state, so there is no nonce to compare.
fn accept_any_nonce(_: Option<&Nonce>) -> Result<(), String> {
    Ok(())
}

#[async_trait]
impl IdentityProvider for OidcClient {
    fn authorization_url(&self, target: &RedirectTarget) -> String {
        let state = target.as_str().to_string();

        let client = self.core_client();
        let mut auth_request = client
            .authorize_url(
                CoreAuthenticationFlow::AuthorizationCode,
                move || CsrfToken::new(state),
                Nonce::new_random,
            )
            .add_prompt(CoreAuthPrompt::Consent)
            .add_extra_param("access_type", "offline");

        // openidconnect always requests "openid" itself.
        for scope in self.scopes.iter().filter(|s| s.as_str() != "openid") {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }

        let (auth_url, _state, _nonce) = auth_request.url();
        auth_url.to_string()
    }

    async fn exchange_code(&self, code: &str) -> Result<IdentityRecord, AuthenticationError> {
        match tokio::time::timeout(self.timeout, self.exchange(code)).await {
            Ok(result) => result,
            Err(_) => Err(AuthenticationError::Timeout),
        }
    }
}

/// OIDC-related errors.
#[derive(Debug)]
pub enum OidcError {
    /// Configuration error (invalid URLs, etc.)
    Configuration(String),
    /// Failed to discover provider metadata.
    Discovery(String),
    /// Failed to fetch or parse the provider's signing keys.
    SigningKeys(String),
}

impl std::fmt::Display for OidcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "OIDC configuration error: {}", msg),
            Self::Discovery(msg) => write!(f, "OIDC discovery error: {}", msg),
            Self::SigningKeys(msg) => write!(f, "OIDC signing key error: {}", msg),
        }
    }
}

impl std::error::Error for OidcError {}
