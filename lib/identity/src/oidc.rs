//! OIDC (OpenID Connect) provider configuration.
//!
//! Describes how to reach the external identity provider. It holds no clients
//! and performs no I/O; the server crate turns it into a discovered provider at
//! startup.

/// Issuer URL for Google's OpenID Connect provider.
pub const GOOGLE_ISSUER_URL: &str = "https://accounts.google.com";

/// Scopes requested when none are configured.
const DEFAULT_SCOPES: [&str; 3] = ["openid", "email", "profile"];

/// Configuration for the OIDC identity provider. Built with [`OidcConfig::builder`].
#[derive(Debug, Clone)]
pub struct OidcConfig {
    issuer_url: String,
    client_id: String,
    client_secret: String,
    /// Absolute callback URI, e.g. `https://app.example.com/auth/callback`.
    redirect_uri: String,
    scopes: Vec<String>,
}

impl OidcConfig {
    /// Starts a Google configuration with the default scopes.
    #[must_use]
    pub fn builder(
        client_id: String,
        client_secret: String,
        redirect_uri: String,
    ) -> OidcConfigBuilder {
        OidcConfigBuilder {
            issuer_url: GOOGLE_ISSUER_URL.to_string(),
            client_id,
            client_secret,
            redirect_uri,
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Returns the OIDC issuer URL.
    #[must_use]
    pub fn issuer_url(&self) -> &str {
        &self.issuer_url
    }

    /// Returns the OAuth2 client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the OAuth2 client secret.
    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Returns the OAuth2 redirect URI.
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Returns the scopes to request, `openid` first.
    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }
}

/// Builder for `OidcConfig`.
#[derive(Debug)]
pub struct OidcConfigBuilder {
    issuer_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: Vec<String>,
}

impl OidcConfigBuilder {
    /// Points the configuration at a different issuer.
    #[must_use]
    pub fn issuer_url(mut self, issuer_url: String) -> Self {
        self.issuer_url = issuer_url;
        self
    }

    /// Replaces the scopes to request.
    ///
    /// Blank entries and repeats are dropped. `openid` is always requested,
    /// since the flow depends on an ID token.
    #[must_use]
    pub fn scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = vec!["openid".to_string()];
        for scope in scopes {
            let scope = scope.trim();
            if !scope.is_empty() && !self.scopes.iter().any(|s| s == scope) {
                self.scopes.push(scope.to_string());
            }
        }
        self
    }

    /// Builds the `OidcConfig`.
    #[must_use]
    pub fn build(self) -> OidcConfig {
        OidcConfig {
            issuer_url: self.issuer_url,
            client_id: self.client_id,
            client_secret: self.client_secret,
            redirect_uri: self.redirect_uri,
            scopes: self.scopes,
        }
    }
}
