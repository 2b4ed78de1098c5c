//! Identity and session primitives for the oauth-gate authentication gateway.
//!
//! This crate provides:
//! - The authenticated identity record (`IdentityRecord`) built from provider claims
//! - The session credential codec (`SessionCodec`, `CredentialPayload`)
//! - Same-origin redirect target validation (`RedirectTarget`)
//! - Identity provider configuration (`OidcConfig`, `OidcConfigBuilder`)
//! - The authentication error taxonomy
//!
//! Everything here is pure: no network access, no clocks other than the ones
//! passed in (or `Utc::now()` in the convenience wrappers).
//!
//! # Trust Model
//!
//! An `IdentityRecord` can only be built from provider claims whose email is
//! marked verified. Verification is decided once, at exchange time, and the
//! raw flag is never carried forward to consumers of the record.
//!
//! # Example
//!
//! ```
//! use oauth_gate_identity::{IdentityRecord, ProviderClaims, SessionCodec};
//!
//! let claims = ProviderClaims::new("110169484474386276334".to_string())
//!     .with_email(Some("alice@example.com".to_string()))
//!     .with_email_verified(Some(true))
//!     .with_name(Some("Alice".to_string()));
//!
//! let record = IdentityRecord::from_claims(claims).expect("verified email");
//!
//! let codec = SessionCodec::default();
//! let payload = codec.encode(&record).expect("encode");
//! assert_eq!(codec.decode(payload.as_str()), Some(record));
//!
//! // Tampered payloads degrade to "no session".
//! assert_eq!(codec.decode("not-a-session"), None);
//! ```

pub mod codec;
pub mod error;
pub mod oidc;
pub mod record;
pub mod redirect;

// Re-export main types at crate root
pub use codec::{
    CredentialPayload, DEFAULT_SESSION_MAX_AGE_SECONDS, DecodedSession,
    MAX_SESSION_MAX_AGE_SECONDS, SessionCodec,
};
pub use error::{AuthenticationError, InvalidRedirectTarget, SessionError};
pub use oidc::{GOOGLE_ISSUER_URL, OidcConfig, OidcConfigBuilder};
pub use record::{IdentityRecord, ProviderClaims};
pub use redirect::RedirectTarget;
