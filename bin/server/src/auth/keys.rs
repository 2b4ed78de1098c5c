//! Cache of the identity provider's token signing keys.
//!
//! The key set is fetched once during discovery and then replaced in the
//! background. Requests only ever read the current set; a swap is atomic, so a
//! verification in flight keeps the set it started with.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use openidconnect::core::CoreJsonWebKeySet;
use reqwest::header::CACHE_CONTROL;
use rootcause::prelude::Report;
use tokio::task::JoinHandle;
use url::Url;

use super::oidc::OidcError;

/// Floor on the refresh interval, and the retry delay after a failed refresh.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// A freshly fetched key set and how long the provider says it may be cached.
#[derive(Debug)]
pub struct FetchedKeys {
    pub keys: CoreJsonWebKeySet,
    pub max_age: Option<Duration>,
}

/// Process-wide signing-key cache with atomic replacement.
pub struct SigningKeyCache {
    keys: ArcSwap<CoreJsonWebKeySet>,
    jwks_uri: Url,
    http_client: reqwest::Client,
    max_refresh_interval: Duration,
}

impl SigningKeyCache {
    /// Creates a cache seeded with `initial`.
    pub fn new(
        jwks_uri: Url,
        initial: CoreJsonWebKeySet,
        http_client: reqwest::Client,
        max_refresh_interval: Duration,
    ) -> Self {
        Self {
            keys: ArcSwap::from_pointee(initial),
            jwks_uri,
            http_client,
            max_refresh_interval,
        }
    }

    /// Returns the current key set.
    pub fn current(&self) -> Arc<CoreJsonWebKeySet> {
        self.keys.load_full()
    }

    /// Replaces the current key set.
    pub fn replace(&self, keys: CoreJsonWebKeySet) {
        self.keys.store(Arc::new(keys));
    }

    /// Fetches the key set from the provider without touching the cache.
    pub async fn fetch(&self) -> Result<FetchedKeys, Report<OidcError>> {
        let response = self
            .http_client
            .get(self.jwks_uri.clone())
            .send()
            .await
            .map_err(|e| OidcError::SigningKeys(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OidcError::SigningKeys(format!("provider returned {}", status)).into());
        }

        let max_age = response
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_max_age);

        let body = response
            .bytes()
            .await
            .map_err(|e| OidcError::SigningKeys(format!("failed to read body: {}", e)))?;

        let keys: CoreJsonWebKeySet = serde_json::from_slice(&body)
            .map_err(|e| OidcError::SigningKeys(format!("invalid key set: {}", e)))?;

        Ok(FetchedKeys { keys, max_age })
    }

    /// Fetches and installs a new key set, returning the delay until the next
    /// refresh. On failure the current set is kept.
    pub async fn refresh(&self) -> Result<Duration, Report<OidcError>> {
        let fetched = self.fetch().await?;
        let next = next_refresh_interval(self.max_refresh_interval, fetched.max_age);

        tracing::debug!(
            jwks_uri = %self.jwks_uri,
            next_refresh_seconds = next.as_secs(),
            "refreshed signing keys"
        );
        self.replace(fetched.keys);

        Ok(next)
    }

    /// Starts the background refresher. It runs until the runtime shuts down.
    pub fn spawn_refresher(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut delay = self.max_refresh_interval.max(MIN_REFRESH_INTERVAL);
            loop {
                tokio::time::sleep(delay).await;
                delay = match self.refresh().await {
                    Ok(next) => next,
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            retry_seconds = MIN_REFRESH_INTERVAL.as_secs(),
                            "signing key refresh failed, keeping current keys"
                        );
                        MIN_REFRESH_INTERVAL
                    }
                };
            }
        })
    }
}

/// Picks the delay before the next refresh.
fn next_refresh_interval(max: Duration, max_age: Option<Duration>) -> Duration {
    max_age
        .map_or(max, |max_age| max_age.min(max))
        .max(MIN_REFRESH_INTERVAL)
}

/// Extracts `max-age` from a `Cache-Control` header value.
fn parse_max_age(header: &str) -> Option<Duration> {
    header.split(',').find_map(|directive| {
        let (name, value) = directive.trim().split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("max-age") {
            return None;
        }
        value
            .trim()
            .trim_matches('"')
            .parse::<u64>()
            .ok()
            .map(Duration::from_secs)
    })
}
