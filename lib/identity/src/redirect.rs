//! Post-login redirect targets.
//!
//! The login leg carries the user's originally requested path through the
//! provider round trip and redirects there after the callback. Because that
//! value arrives from the query string, it is only honored when it is a
//! same-origin relative path; everything else collapses to `/`.

use std::fmt;

use crate::error::InvalidRedirectTarget;

/// Longest target that is carried through the login round trip.
const MAX_TARGET_LEN: usize = 2048;

/// A same-origin path (plus optional query) to return to after login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget(String);

impl RedirectTarget {
    /// The site root.
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Validates a candidate target.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRedirectTarget` unless the candidate starts with a
    /// single `/`, contains no backslash or control character, and fits in
    /// the length bound. `//host` and `/\host` are refused because browsers
    /// treat them as scheme-relative.
    pub fn try_new(candidate: &str) -> Result<Self, InvalidRedirectTarget> {
        if candidate.len() > MAX_TARGET_LEN {
            return Err(InvalidRedirectTarget {
                reason: "too long",
            });
        }
        if !candidate.starts_with('/') {
            return Err(InvalidRedirectTarget {
                reason: "not a relative path",
            });
        }
        if candidate.starts_with("//") {
            return Err(InvalidRedirectTarget {
                reason: "scheme-relative URL",
            });
        }
        if candidate.contains('\\') {
            return Err(InvalidRedirectTarget {
                reason: "contains a backslash",
            });
        }
        if candidate.chars().any(char::is_control) {
            return Err(InvalidRedirectTarget {
                reason: "contains a control character",
            });
        }

        Ok(Self(candidate.to_string()))
    }

    /// Validates an optional candidate, falling back to the root.
    #[must_use]
    pub fn sanitize(candidate: Option<&str>) -> Self {
        match candidate.filter(|c| !c.is_empty()) {
            Some(candidate) => Self::try_new(candidate).unwrap_or_else(|e| {
                tracing::debug!(error = %e, "discarding redirect target");
                Self::root()
            }),
            None => Self::root(),
        }
    }

    /// Returns the target as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RedirectTarget {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for RedirectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
