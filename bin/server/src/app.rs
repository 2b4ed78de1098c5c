//! Gateway assembly.
//!
//! Wraps the downstream application in the middleware chain. Requests pass
//! the trace layer, then the gate, then the context propagator, then reach
//! the routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthGate, AuthPaths, OptionalIdentity, authenticate, propagate_user_context};

/// Whether the gate is installed.
#[derive(Clone)]
pub enum AuthMode {
    /// Every non-public request needs a session.
    Enforced(Arc<AuthGate>),
    /// OAuth credentials are not configured; requests pass unauthenticated.
    Disabled,
}

impl AuthMode {
    /// Returns `true` when the gate is installed.
    pub fn is_enforced(&self) -> bool {
        matches!(self, Self::Enforced(_))
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Enforced(_) => "enforced",
            Self::Disabled => "disabled",
        }
    }
}

/// Body of the status endpoint.
#[derive(Debug, Serialize)]
struct AuthStatus {
    authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<StatusUser>,
}

#[derive(Debug, Serialize)]
struct StatusUser {
    email: String,
    name: Option<String>,
    picture: Option<String>,
}

/// Body of the health endpoint.
#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    authentication: &'static str,
}

/// Mounts the status and health endpoints on `application` and wraps it in
/// the middleware chain.
pub fn assemble(application: Router, auth: AuthMode, paths: &AuthPaths) -> Router {
    let authentication = auth.label();
    let router = application
        .route(&paths.status_path(), get(status))
        .route("/health", get(move || health(authentication)))
        .layer(from_fn(propagate_user_context));

    let router = match auth {
        AuthMode::Enforced(gate) => router.layer(from_fn_with_state(gate, authenticate)),
        AuthMode::Disabled => router,
    };

    router.layer(TraceLayer::new_for_http())
}

/// Reports the request's identity. Never contacts the provider.
async fn status(OptionalIdentity(identity): OptionalIdentity) -> Json<AuthStatus> {
    Json(AuthStatus {
        authenticated: identity.is_some(),
        user: identity.map(|record| StatusUser {
            email: record.email().to_string(),
            name: record.name().map(str::to_string),
            picture: record.picture().map(str::to_string),
        }),
    })
}

async fn health(authentication: &'static str) -> Json<Health> {
    Json(Health {
        status: "ok",
        authentication,
    })
}
