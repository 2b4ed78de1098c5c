//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the gateway,
//! loaded via the `config` crate from environment variables with `__` as
//! the nesting separator (`OAUTH__CLIENT_ID` is `oauth.client_id`).
//!
//! Provider credentials are optional. When they are missing the gateway
//! starts with authentication disabled; see [`OAuthSettings::provider_config`].

use std::time::Duration;

use axum_extra::extract::cookie::Key;
use oauth_gate_identity::{
    DEFAULT_SESSION_MAX_AGE_SECONDS, GOOGLE_ISSUER_URL, MAX_SESSION_MAX_AGE_SECONDS, OidcConfig,
    SessionCodec,
};
use serde::Deserialize;

use crate::auth::AuthPaths;
use crate::auth::routes::DEFAULT_PUBLIC_PATHS;
use crate::error::ConfigurationError;

/// Minimum length of `SESSION__SECRET_KEY`.
const MIN_SECRET_KEY_LEN: usize = 32;

/// Server configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Identity provider settings.
    #[serde(default)]
    pub oauth: OAuthSettings,

    /// Session cookie settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Gate routing and provider call settings.
    #[serde(default)]
    pub gate: GateConfig,
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

/// Identity provider settings as they arrive from the environment.
#[derive(Clone, Deserialize)]
pub struct OAuthSettings {
    /// OAuth2 client ID. Absent disables authentication.
    pub client_id: Option<String>,

    /// OAuth2 client secret. Absent disables authentication.
    pub client_secret: Option<String>,

    /// Externally visible base URL; the callback path is appended to it.
    #[serde(default = "default_redirect_base_url")]
    pub redirect_base_url: String,

    /// OIDC issuer used for discovery.
    #[serde(default = "default_issuer_url")]
    pub issuer_url: String,

    /// Comma-separated scopes.
    #[serde(default = "default_scopes")]
    pub scopes: String,
}

fn default_redirect_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_issuer_url() -> String {
    GOOGLE_ISSUER_URL.to_string()
}

fn default_scopes() -> String {
    "openid,email,profile".to_string()
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_base_url: default_redirect_base_url(),
            issuer_url: default_issuer_url(),
            scopes: default_scopes(),
        }
    }
}

// Hand-written so the client secret never reaches the logs.
impl std::fmt::Debug for OAuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthSettings")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("redirect_base_url", &self.redirect_base_url)
            .field("issuer_url", &self.issuer_url)
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl OAuthSettings {
    /// Builds the provider configuration, with the redirect URI pointing at
    /// `callback_path` under the configured base URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::Absent` if the client ID or secret is
    /// missing or empty, and `ConfigurationError::Invalid` if a URL does not
    /// parse.
    pub fn provider_config(&self, callback_path: &str) -> Result<OidcConfig, ConfigurationError> {
        let client_id = self.client_id.as_deref().filter(|v| !v.trim().is_empty());
        let client_secret = self
            .client_secret
            .as_deref()
            .filter(|v| !v.trim().is_empty());

        let (client_id, client_secret) = match (client_id, client_secret) {
            (Some(id), Some(secret)) => (id, secret),
            (id, secret) => {
                let mut missing = Vec::new();
                if id.is_none() {
                    missing.push("OAUTH__CLIENT_ID");
                }
                if secret.is_none() {
                    missing.push("OAUTH__CLIENT_SECRET");
                }
                return Err(ConfigurationError::Absent { missing });
            }
        };

        let base = url::Url::parse(&self.redirect_base_url).map_err(|e| {
            ConfigurationError::Invalid {
                setting: "OAUTH__REDIRECT_BASE_URL",
                details: e.to_string(),
            }
        })?;
        url::Url::parse(&self.issuer_url).map_err(|e| ConfigurationError::Invalid {
            setting: "OAUTH__ISSUER_URL",
            details: e.to_string(),
        })?;

        let redirect_uri = format!(
            "{}{}",
            base.as_str().trim_end_matches('/'),
            callback_path
        );

        let scopes = self.scopes.split(',').map(str::to_string).collect();

        Ok(OidcConfig::builder(
            client_id.to_string(),
            client_secret.to_string(),
            redirect_uri,
        )
        .issuer_url(self.issuer_url.clone())
        .scopes(scopes)
        .build())
    }
}

/// Session-related configuration.
#[derive(Clone, Deserialize)]
pub struct SessionConfig {
    /// Lifetime of the session cookie and of the credential inside it.
    #[serde(default = "default_max_age_seconds")]
    pub max_age_seconds: i64,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true for production safety; set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,

    /// Key material for cookie encryption. Random per process when unset.
    pub secret_key: Option<String>,
}

fn default_max_age_seconds() -> i64 {
    DEFAULT_SESSION_MAX_AGE_SECONDS
}

fn default_secure_cookies() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_age_seconds: default_max_age_seconds(),
            secure_cookies: default_secure_cookies(),
            secret_key: None,
        }
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("max_age_seconds", &self.max_age_seconds)
            .field("secure_cookies", &self.secure_cookies)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl SessionConfig {
    /// Returns the session codec for the configured lifetime.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::Invalid` if the lifetime is not positive
    /// or longer than a year.
    pub fn codec(&self) -> Result<SessionCodec, ConfigurationError> {
        if !(1..=MAX_SESSION_MAX_AGE_SECONDS).contains(&self.max_age_seconds) {
            return Err(ConfigurationError::Invalid {
                setting: "SESSION__MAX_AGE_SECONDS",
                details: format!(
                    "must be between 1 and {}, got {}",
                    MAX_SESSION_MAX_AGE_SECONDS, self.max_age_seconds
                ),
            });
        }

        Ok(SessionCodec::new(chrono::Duration::seconds(
            self.max_age_seconds,
        )))
    }

    /// Returns the cookie encryption key.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::Invalid` if a secret is configured but too short.
    pub fn cookie_key(&self) -> Result<Key, ConfigurationError> {
        match self.secret_key.as_deref() {
            Some(secret) if secret.len() < MIN_SECRET_KEY_LEN => {
                Err(ConfigurationError::Invalid {
                    setting: "SESSION__SECRET_KEY",
                    details: format!("must be at least {} bytes", MIN_SECRET_KEY_LEN),
                })
            }
            Some(secret) => Ok(Key::derive_from(secret.as_bytes())),
            None => {
                tracing::warn!(
                    "SESSION__SECRET_KEY is not set; using a random key, sessions will not survive a restart"
                );
                Ok(Key::generate())
            }
        }
    }
}

/// Gate routing and provider call settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    /// Prefix of the login, callback, logout, and status endpoints.
    #[serde(default = "default_auth_path_prefix")]
    pub auth_path_prefix: String,

    /// Comma-separated paths served without a session.
    #[serde(default = "default_public_paths")]
    pub public_paths: String,

    /// Bound on each identity provider call, in seconds.
    #[serde(default = "default_provider_timeout_seconds")]
    pub provider_timeout_seconds: u64,

    /// Upper bound on the signing-key refresh interval, in seconds.
    #[serde(default = "default_signing_keys_refresh_seconds")]
    pub signing_keys_refresh_seconds: u64,
}

fn default_auth_path_prefix() -> String {
    "/auth".to_string()
}

fn default_public_paths() -> String {
    DEFAULT_PUBLIC_PATHS.join(",")
}

fn default_provider_timeout_seconds() -> u64 {
    10
}

fn default_signing_keys_refresh_seconds() -> u64 {
    3600
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            auth_path_prefix: default_auth_path_prefix(),
            public_paths: default_public_paths(),
            provider_timeout_seconds: default_provider_timeout_seconds(),
            signing_keys_refresh_seconds: default_signing_keys_refresh_seconds(),
        }
    }
}

impl GateConfig {
    /// Returns the gate's path layout.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::Invalid` if the prefix or a public path
    /// does not start with `/`.
    pub fn paths(&self) -> Result<AuthPaths, ConfigurationError> {
        let prefix = self.auth_path_prefix.trim().trim_end_matches('/');
        if !prefix.starts_with('/') {
            return Err(ConfigurationError::Invalid {
                setting: "GATE__AUTH_PATH_PREFIX",
                details: format!("'{}' must start with '/'", self.auth_path_prefix),
            });
        }

        let mut public = Vec::new();
        for path in self
            .public_paths
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
        {
            if !path.starts_with('/') {
                return Err(ConfigurationError::Invalid {
                    setting: "GATE__PUBLIC_PATHS",
                    details: format!("'{}' must start with '/'", path),
                });
            }
            public.push(path.to_string());
        }

        Ok(AuthPaths::new(prefix, public))
    }

    /// Returns the bound on identity provider calls.
    #[must_use]
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_seconds.max(1))
    }

    /// Returns the upper bound on the signing-key refresh interval.
    #[must_use]
    pub fn signing_keys_refresh(&self) -> Duration {
        Duration::from_secs(self.signing_keys_refresh_seconds)
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but does not parse.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::load(None)
    }

    /// Loads configuration from the given variables instead of the process
    /// environment.
    fn load(vars: Option<config::Map<String, String>>) -> Result<Self, ConfigurationError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .source(vars),
            )
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|e| ConfigurationError::Load {
                details: e.to_string(),
            })
    }
}
