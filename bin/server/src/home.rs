//! Landing application mounted behind the gate.
//!
//! Stands in for the downstream application: it only reads the request's
//! [`CurrentUser`] and points at the gate's login and logout endpoints.

use std::sync::Arc;

use axum::{Router, extract::State, routing::get};

use crate::auth::{AuthPaths, CurrentUser};

struct Links {
    login: String,
    logout: String,
}

/// Returns the landing application's routes.
pub fn router(paths: &AuthPaths) -> Router {
    let links = Arc::new(Links {
        login: paths.login_path(),
        logout: paths.logout_path(),
    });

    Router::new().route("/", get(home)).with_state(links)
}

/// Plain-text greeting; the response is `text/plain`, so nothing is escaped.
async fn home(State(links): State<Arc<Links>>, CurrentUser(user): CurrentUser) -> String {
    match user {
        Some(user) => format!(
            "Signed in as {}.\nLog out: {}\n",
            user.email(),
            links.logout
        ),
        None => format!("Please log in to continue.\nLog in: {}\n", links.login),
    }
}
