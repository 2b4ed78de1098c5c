//! Session credential encoding.
//!
//! A session is stored entirely client-side: the identity record is wrapped in
//! a versioned envelope with issue and expiry instants, serialized to JSON, and
//! base64url-encoded. No server-side lookup is needed to decode it.
//!
//! Decoding never fails loudly. Any input that does not decode to a current,
//! well-formed envelope is reported as "no session", because a corrupted or
//! stale cookie is an expected runtime condition.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::record::IdentityRecord;

/// Default session lifetime: 24 hours.
pub const DEFAULT_SESSION_MAX_AGE_SECONDS: i64 = 86_400;

/// Longest accepted session lifetime: 365 days.
pub const MAX_SESSION_MAX_AGE_SECONDS: i64 = 365 * 86_400;

/// Current envelope format version.
const ENVELOPE_VERSION: u8 = 1;

/// An encoded session credential, suitable as a cookie value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPayload(String);

impl CredentialPayload {
    /// Returns the payload as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the payload, returning the encoded string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for CredentialPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of inspecting a credential payload.
///
/// `decode` collapses everything but `Valid` into "no session"; this type
/// keeps the expired case apart for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedSession {
    /// A current, well-formed session.
    Valid(IdentityRecord),
    /// A well-formed session past its expiry.
    Expired,
    /// Anything that did not decode.
    Malformed,
}

impl DecodedSession {
    /// Returns the identity record if the session is valid.
    #[must_use]
    pub fn into_valid(self) -> Option<IdentityRecord> {
        match self {
            Self::Valid(record) => Some(record),
            Self::Expired | Self::Malformed => None,
        }
    }
}

/// Wire shape of an encoded session.
#[derive(Serialize, Deserialize)]
struct SessionEnvelope {
    v: u8,
    identity: IdentityRecord,
    iat: i64,
    exp: i64,
}

/// Encodes and decodes session credentials.
#[derive(Debug, Clone, Copy)]
pub struct SessionCodec {
    max_age: Duration,
}

impl Default for SessionCodec {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_SESSION_MAX_AGE_SECONDS))
    }
}

impl SessionCodec {
    /// Creates a codec issuing sessions valid for `max_age`.
    #[must_use]
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }

    /// Returns the lifetime of issued sessions.
    #[must_use]
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Encodes a record into a credential issued now.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Encode` if the envelope cannot be serialized.
    pub fn encode(&self, record: &IdentityRecord) -> Result<CredentialPayload, SessionError> {
        self.encode_at(record, Utc::now())
    }

    /// Encodes a record into a credential issued at `issued_at`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Encode` if the expiry is out of range or the
    /// envelope cannot be serialized.
    pub fn encode_at(
        &self,
        record: &IdentityRecord,
        issued_at: DateTime<Utc>,
    ) -> Result<CredentialPayload, SessionError> {
        let expires_at = issued_at
            .checked_add_signed(self.max_age)
            .ok_or_else(|| SessionError::Encode {
                reason: "session expiry is out of range".to_string(),
            })?;

        let envelope = SessionEnvelope {
            v: ENVELOPE_VERSION,
            identity: record.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let json = serde_json::to_vec(&envelope).map_err(|e| SessionError::Encode {
            reason: e.to_string(),
        })?;

        Ok(CredentialPayload(URL_SAFE_NO_PAD.encode(json)))
    }

    /// Decodes a credential, returning `None` for anything but a current session.
    #[must_use]
    pub fn decode(&self, payload: &str) -> Option<IdentityRecord> {
        self.decode_at(payload, Utc::now())
    }

    /// Decodes a credential as of `now`.
    #[must_use]
    pub fn decode_at(&self, payload: &str, now: DateTime<Utc>) -> Option<IdentityRecord> {
        self.inspect_at(payload, now).into_valid()
    }

    /// Inspects a credential, distinguishing expired from malformed input.
    #[must_use]
    pub fn inspect(&self, payload: &str) -> DecodedSession {
        self.inspect_at(payload, Utc::now())
    }

    /// Inspects a credential as of `now`.
    #[must_use]
    pub fn inspect_at(&self, payload: &str, now: DateTime<Utc>) -> DecodedSession {
        let Ok(bytes) = URL_SAFE_NO_PAD.decode(payload.trim()) else {
            tracing::debug!("session payload is not base64url");
            return DecodedSession::Malformed;
        };

        let envelope: SessionEnvelope = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(error = %e, "session payload is not a session envelope");
                return DecodedSession::Malformed;
            }
        };

        if envelope.v != ENVELOPE_VERSION || !envelope.identity.is_well_formed() {
            tracing::debug!(version = envelope.v, "session envelope rejected");
            return DecodedSession::Malformed;
        }

        if now.timestamp() >= envelope.exp {
            return DecodedSession::Expired;
        }

        DecodedSession::Valid(envelope.identity)
    }
}
