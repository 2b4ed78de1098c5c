//! Error types for server startup.
//!
//! Request-time failures never leave the gate as errors; they become fixed
//! responses (see `auth::middleware::GateRejection`). What remains here is the
//! configuration and startup taxonomy, reported through rootcause in `main`.

use std::fmt;

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigurationError {
    /// Provider credentials are not configured. Authentication is disabled,
    /// the process still starts.
    Absent {
        /// Names of the missing settings.
        missing: Vec<&'static str>,
    },
    /// A setting is present but unusable.
    Invalid {
        /// The offending setting.
        setting: &'static str,
        /// Error details.
        details: String,
    },
    /// The configuration sources could not be read.
    Load {
        /// Error details.
        details: String,
    },
}

impl ConfigurationError {
    /// Returns true if this error means "run without authentication".
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent { .. })
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent { missing } => {
                write!(
                    f,
                    "identity provider is not configured (missing {})",
                    missing.join(", ")
                )
            }
            Self::Invalid { setting, details } => {
                write!(f, "invalid setting '{}': {}", setting, details)
            }
            Self::Load { details } => {
                write!(f, "failed to load configuration: {}", details)
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Errors that stop the server from starting or keep it from running.
#[derive(Debug)]
pub enum StartupError {
    /// Configuration could not be loaded or is invalid.
    Configuration {
        /// Error details.
        details: String,
    },
    /// The identity provider could not be discovered.
    Provider {
        /// Error details.
        details: String,
    },
    /// The listen address could not be bound.
    Bind {
        /// The requested address.
        address: String,
        /// Error details.
        details: String,
    },
    /// The server exited with an error.
    Serve {
        /// Error details.
        details: String,
    },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { details } => write!(f, "configuration error: {}", details),
            Self::Provider { details } => {
                write!(f, "identity provider unavailable: {}", details)
            }
            Self::Bind { address, details } => {
                write!(f, "failed to bind to '{}': {}", address, details)
            }
            Self::Serve { details } => write!(f, "server error: {}", details),
        }
    }
}

impl std::error::Error for StartupError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_lists_missing_settings() {
        let err = ConfigurationError::Absent {
            missing: vec!["OAUTH__CLIENT_ID", "OAUTH__CLIENT_SECRET"],
        };

        assert!(err.is_absent());
        assert_eq!(
            err.to_string(),
            "identity provider is not configured (missing OAUTH__CLIENT_ID, OAUTH__CLIENT_SECRET)"
        );
    }

    #[test]
    fn invalid_is_not_absent() {
        let err = ConfigurationError::Invalid {
            setting: "SESSION__SECRET_KEY",
            details: "must be at least 32 bytes".to_string(),
        };

        assert!(!err.is_absent());
        assert!(err.to_string().contains("SESSION__SECRET_KEY"));
    }

    #[test]
    fn bind_display() {
        let err = StartupError::Bind {
            address: "0.0.0.0:8080".to_string(),
            details: "address in use".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to bind to '0.0.0.0:8080': address in use"
        );
    }
}
