//! Error types for the identity crate.
//!
//! - `AuthenticationError`: failures while turning an authorization code into
//!   an identity. The gate collapses all of these into a single user-visible
//!   "authentication failed" response; the variant only reaches the logs.
//! - `SessionError`: failures while producing a session credential.
//! - `InvalidRedirectTarget`: a redirect target that is not a same-origin path.

use std::fmt;

/// Errors from authentication operations.
///
/// These errors represent failures in establishing the user's identity
/// during the callback leg of the authorization-code flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
    /// The callback arrived without an authorization code.
    MissingCode,
    /// The identity provider reported an error instead of a code.
    ProviderError {
        error: String,
        description: Option<String>,
    },
    /// The token endpoint rejected the code or could not be reached.
    TokenExchange { reason: String },
    /// The ID token was missing or failed signature, issuer, audience, or expiry checks.
    TokenVerification { reason: String },
    /// The verified token does not mark the email address as verified.
    UnverifiedEmail { subject: String },
    /// Missing required claim in token.
    MissingClaim { claim: String },
    /// The provider did not answer within the configured bound.
    Timeout,
}

impl AuthenticationError {
    /// Returns true if this failure means "known user, not allowed"
    /// rather than "could not authenticate".
    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::UnverifiedEmail { .. })
    }
}

impl fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCode => {
                write!(f, "no authorization code provided")
            }
            Self::ProviderError { error, description } => match description {
                Some(description) => {
                    write!(f, "identity provider returned '{error}': {description}")
                }
                None => write!(f, "identity provider returned '{error}'"),
            },
            Self::TokenExchange { reason } => {
                write!(f, "token exchange failed: {reason}")
            }
            Self::TokenVerification { reason } => {
                write!(f, "token verification failed: {reason}")
            }
            Self::UnverifiedEmail { subject } => {
                write!(f, "email not verified for subject: {subject}")
            }
            Self::MissingClaim { claim } => {
                write!(f, "missing required claim: {claim}")
            }
            Self::Timeout => {
                write!(f, "identity provider request timed out")
            }
        }
    }
}

impl std::error::Error for AuthenticationError {}

/// Errors from producing a session credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The identity record could not be serialized.
    Encode { reason: String },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode { reason } => write!(f, "failed to encode session: {reason}"),
        }
    }
}

impl std::error::Error for SessionError {}

/// A redirect target that is not a same-origin relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidRedirectTarget {
    /// Why the candidate was refused.
    pub reason: &'static str,
}

impl fmt::Display for InvalidRedirectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid redirect target: {}", self.reason)
    }
}

impl std::error::Error for InvalidRedirectTarget {}
