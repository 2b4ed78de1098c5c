//! Request-scoped user context.
//!
//! The gate attaches the decoded [`AuthenticatedIdentity`] to the request's
//! extensions; [`propagate_user_context`] then derives the narrower
//! [`UserContext`] that downstream handlers read. Both live only as long as
//! the request, so concurrent requests never see each other's user.

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use oauth_gate_identity::IdentityRecord;

/// The identity the gate established for this request.
#[derive(Debug, Clone)]
pub struct AuthenticatedIdentity(pub IdentityRecord);

/// What downstream handlers learn about the current user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    email: String,
}

impl UserContext {
    /// Creates a context for the given email.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }

    /// Returns the user's verified email.
    pub fn email(&self) -> &str {
        &self.email
    }
}

/// Installs a [`UserContext`] when the gate authenticated the request.
///
/// Has no effect on requests without an identity, including every request
/// when it runs before the gate.
pub async fn propagate_user_context(mut request: Request, next: Next) -> Response {
    let context = request
        .extensions()
        .get::<AuthenticatedIdentity>()
        .map(|identity| UserContext::new(identity.0.email()));

    if let Some(context) = context {
        request.extensions_mut().insert(context);
    }

    next.run(request).await
}

/// Extractor for the current user, if any.
pub struct CurrentUser(pub Option<UserContext>);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentUser(parts.extensions.get::<UserContext>().cloned()))
    }
}

/// Extractor for requiring a current user.
pub struct RequireUser(pub UserContext);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = ContextRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserContext>()
            .cloned()
            .map(RequireUser)
            .ok_or(ContextRejection::NotAuthenticated)
    }
}

/// Extractor for the full identity record, if the gate attached one.
pub struct OptionalIdentity(pub Option<IdentityRecord>);

impl<S> FromRequestParts<S> for OptionalIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalIdentity(
            parts
                .extensions
                .get::<AuthenticatedIdentity>()
                .map(|identity| identity.0.clone()),
        ))
    }
}

/// Rejection type for context extractors.
#[derive(Debug)]
pub enum ContextRejection {
    NotAuthenticated,
}

impl IntoResponse for ContextRejection {
    fn into_response(self) -> Response {
        match self {
            Self::NotAuthenticated => {
                (StatusCode::UNAUTHORIZED, "Not authenticated").into_response()
            }
        }
    }
}
