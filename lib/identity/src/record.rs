//! The authenticated identity record and the provider claims it is built from.
//!
//! The record is what the rest of the system trusts. It is constructed in
//! exactly one place, from claims taken out of a verified ID token, and that
//! constructor refuses any identity whose email is not verified.

use serde::{Deserialize, Serialize};

use crate::error::AuthenticationError;

/// Claims extracted from a verified OIDC ID token.
///
/// This is an intermediate shape: it still carries the raw `email_verified`
/// flag, which is consumed by [`IdentityRecord::from_claims`] and dropped.
#[derive(Debug, Clone, Default)]
pub struct ProviderClaims {
    /// The subject claim (unique user identifier from the provider).
    pub subject: String,
    /// Email address (optional in the token, required for a record).
    pub email: Option<String>,
    /// The provider's `email_verified` claim.
    pub email_verified: Option<bool>,
    /// Display name (from the `name` claim).
    pub name: Option<String>,
    /// Profile picture URL (from the `picture` claim).
    pub picture: Option<String>,
}

impl ProviderClaims {
    /// Creates a new set of claims for the given subject.
    #[must_use]
    pub fn new(subject: String) -> Self {
        Self {
            subject,
            ..Self::default()
        }
    }

    /// Sets the email claim.
    #[must_use]
    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }

    /// Sets the email-verified claim.
    #[must_use]
    pub fn with_email_verified(mut self, verified: Option<bool>) -> Self {
        self.email_verified = verified;
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    /// Sets the profile picture URL.
    #[must_use]
    pub fn with_picture(mut self, picture: Option<String>) -> Self {
        self.picture = picture;
        self
    }
}

/// The authenticated user's attributes.
///
/// Existence of a value of this type means the provider vouched for the email
/// address at exchange time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// Stable, opaque, provider-issued subject identifier.
    #[serde(rename = "sub")]
    subject: String,
    /// Verified email address.
    email: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    /// Profile picture URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    picture: Option<String>,
}

impl IdentityRecord {
    /// Builds a record from verified token claims.
    ///
    /// # Errors
    ///
    /// Returns `MissingClaim` if the subject or email is absent or empty, and
    /// `UnverifiedEmail` if the provider did not mark the email as verified
    /// (an absent flag counts as unverified).
    pub fn from_claims(claims: ProviderClaims) -> Result<Self, AuthenticationError> {
        if claims.subject.is_empty() {
            return Err(AuthenticationError::MissingClaim {
                claim: "sub".to_string(),
            });
        }

        let email = claims
            .email
            .filter(|email| !email.is_empty())
            .ok_or_else(|| AuthenticationError::MissingClaim {
                claim: "email".to_string(),
            })?;

        if claims.email_verified != Some(true) {
            return Err(AuthenticationError::UnverifiedEmail {
                subject: claims.subject,
            });
        }

        Ok(Self {
            subject: claims.subject,
            email,
            name: claims.name.filter(|name| !name.is_empty()),
            picture: claims.picture.filter(|picture| !picture.is_empty()),
        })
    }

    /// Returns the provider-issued subject identifier.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the verified email address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the display name, if the provider supplied one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the profile picture URL, if the provider supplied one.
    #[must_use]
    pub fn picture(&self) -> Option<&str> {
        self.picture.as_deref()
    }

    /// Returns true if the record carries the fields every session needs.
    ///
    /// Used when a record is rebuilt from a credential rather than from claims.
    pub(crate) fn is_well_formed(&self) -> bool {
        !self.subject.is_empty() && !self.email.is_empty()
    }
}
