//! The authentication gate middleware.
//!
//! Every request is classified by path (see [`Route`]) and handled by exactly
//! one branch. The login, callback, and logout legs answer directly; public
//! requests pass through untouched; gated requests pass through only with a
//! session that decrypts and decodes.

use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, Uri, header::LOCATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, PrivateCookieJar, SameSite};
use oauth_gate_identity::{
    AuthenticationError, CredentialPayload, DecodedSession, IdentityRecord, RedirectTarget,
    SessionError,
};
use serde::Deserialize;
use time::Duration as TimeDuration;

use super::AuthGate;
use super::context::AuthenticatedIdentity;
use super::routes::Route;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "auth_session";

/// Query parameters for the login endpoint.
#[derive(Debug, Default, Deserialize)]
struct LoginQuery {
    next: Option<String>,
}

/// Query parameters for the OIDC callback.
#[derive(Debug, Default, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Gate middleware. Install with `axum::middleware::from_fn_with_state`.
pub async fn authenticate(
    State(gate): State<Arc<AuthGate>>,
    request: Request,
    next: Next,
) -> Response {
    match gate.paths.classify(request.uri().path()) {
        Route::Login => login(&gate, request.uri()),
        Route::Callback => callback(&gate, request.uri())
            .await
            .unwrap_or_else(IntoResponse::into_response),
        Route::Logout => logout(&gate),
        Route::Public => next.run(request).await,
        Route::Gated => gated(&gate, request, next).await,
    }
}

/// Starts the authorization-code flow.
fn login(gate: &AuthGate, uri: &Uri) -> Response {
    let query = Query::<LoginQuery>::try_from_uri(uri)
        .map(|Query(query)| query)
        .unwrap_or_default();
    let target = RedirectTarget::sanitize(query.next.as_deref());

    tracing::debug!(target = %target, "redirecting to identity provider");
    found(&gate.provider.authorization_url(&target))
}

/// Completes the authorization-code flow and issues the session cookie.
async fn callback(gate: &AuthGate, uri: &Uri) -> Result<Response, GateRejection> {
    let query = Query::<CallbackQuery>::try_from_uri(uri)
        .map(|Query(query)| query)
        .unwrap_or_default();

    if let Some(error) = query.error {
        return Err(AuthenticationError::ProviderError {
            error,
            description: query.error_description,
        }
        .into());
    }

    let code = query
        .code
        .filter(|code| !code.is_empty())
        .ok_or(GateRejection::MissingCode)?;

    let record = gate.provider.exchange_code(&code).await?;
    let payload = gate.codec.encode(&record)?;
    let target = RedirectTarget::sanitize(query.state.as_deref());

    tracing::info!(subject = record.subject(), "user authenticated");

    let jar = PrivateCookieJar::new(gate.key.clone()).add(session_cookie(gate, payload));
    Ok((jar, found(target.as_str())).into_response())
}

/// Clears the session cookie.
fn logout(gate: &AuthGate) -> Response {
    let remove_session = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .secure(gate.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::ZERO);

    (CookieJar::new().add(remove_session), found("/")).into_response()
}

/// Forwards requests with a valid session, redirects the rest to login.
async fn gated(gate: &AuthGate, mut request: Request, next: Next) -> Response {
    match session_identity(gate, request.headers()) {
        Some(record) => {
            request
                .extensions_mut()
                .insert(AuthenticatedIdentity(record));
            next.run(request).await
        }
        // The status endpoint reports anonymous requests instead of redirecting them.
        None if request.uri().path() == gate.paths.status_path() => next.run(request).await,
        None => {
            let original = request
                .uri()
                .path_and_query()
                .map_or("/", |pq| pq.as_str());
            let query = url::form_urlencoded::Serializer::new(String::new())
                .append_pair("next", original)
                .finish();
            found(&format!("{}?{}", gate.paths.login_path(), query))
        }
    }
}

/// Reads the identity from the private session cookie.
fn session_identity(gate: &AuthGate, headers: &HeaderMap) -> Option<IdentityRecord> {
    // Cookies that fail decryption are dropped by the jar.
    let jar = PrivateCookieJar::from_headers(headers, gate.key.clone());
    let cookie = jar.get(SESSION_COOKIE)?;

    match gate.codec.inspect(cookie.value()) {
        DecodedSession::Valid(record) => Some(record),
        DecodedSession::Expired => {
            tracing::debug!("session expired");
            None
        }
        DecodedSession::Malformed => {
            tracing::debug!("session malformed");
            None
        }
    }
}

fn session_cookie(gate: &AuthGate, payload: CredentialPayload) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, payload.into_string()))
        .path("/")
        .http_only(true)
        .secure(gate.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::seconds(gate.codec.max_age().num_seconds()))
        .build()
}

/// A 302 redirect. `Redirect::to` answers 303.
fn found(location: &str) -> Response {
    match HeaderValue::from_bytes(location.as_bytes()) {
        Ok(value) => (StatusCode::FOUND, [(LOCATION, value)]).into_response(),
        Err(_) => {
            tracing::error!("redirect location is not a valid header value");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

/// Responses the gate answers with instead of forwarding.
///
/// The cause is logged and never echoed to the client.
#[derive(Debug)]
pub enum GateRejection {
    MissingCode,
    Forbidden(AuthenticationError),
    AuthenticationFailed(AuthenticationError),
    Session(SessionError),
}

impl From<AuthenticationError> for GateRejection {
    fn from(error: AuthenticationError) -> Self {
        match error {
            AuthenticationError::MissingCode => Self::MissingCode,
            error if error.is_forbidden() => Self::Forbidden(error),
            error => Self::AuthenticationFailed(error),
        }
    }
}

impl From<SessionError> for GateRejection {
    fn from(error: SessionError) -> Self {
        Self::Session(error)
    }
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::MissingCode => (StatusCode::BAD_REQUEST, "Missing authorization code"),
            Self::Forbidden(error) => {
                tracing::warn!(error = %error, "authentication refused");
                (StatusCode::FORBIDDEN, "Access denied")
            }
            Self::AuthenticationFailed(error) => {
                tracing::warn!(error = %error, "authentication failed");
                (StatusCode::UNAUTHORIZED, "Authentication failed")
            }
            Self::Session(error) => {
                tracing::error!(error = %error, "failed to issue session");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::{FAKE_AUTHORIZE_URL, FakeProvider, alice};
    use crate::auth::{AuthPaths, CurrentUser, propagate_user_context};
    use axum::{
        Router,
        body::Body,
        http::header::{COOKIE, SET_COOKIE},
        middleware,
        routing::get,
    };
    use axum_extra::extract::cookie::Key;
    use oauth_gate_identity::SessionCodec;
    use tower::ServiceExt;

    struct Harness {
        app: Router,
        provider: Arc<FakeProvider>,
        key: Key,
    }

    fn harness(provider: FakeProvider) -> Harness {
        let provider = Arc::new(provider);
        let key = Key::generate();
        let gate = Arc::new(AuthGate::new(
            provider.clone(),
            SessionCodec::default(),
            key.clone(),
            AuthPaths::default(),
            true,
        ));

        async fn whoami(CurrentUser(user): CurrentUser) -> String {
            user.map_or_else(|| "anonymous".to_string(), |u| u.email().to_string())
        }

        let app = Router::new()
            .route("/dashboard", get(whoami))
            .route("/health", get(|| async { "ok" }))
            .route("/auth/status", get(whoami))
            .layer(middleware::from_fn(propagate_user_context))
            .layer(middleware::from_fn_with_state(gate, authenticate));

        Harness { app, provider, key }
    }

    async fn send(app: &Router, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = axum::http::Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        app.clone()
            .oneshot(builder.body(Body::empty()).expect("request"))
            .await
            .expect("response")
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(LOCATION)
            .expect("location header")
            .to_str()
            .expect("location str")
    }

    fn set_cookie(response: &Response) -> String {
        response
            .headers()
            .get(SET_COOKIE)
            .expect("set-cookie header")
            .to_str()
            .expect("cookie str")
            .to_string()
    }

    /// The `name=value` pair of a Set-Cookie header, for replaying as a Cookie header.
    fn cookie_pair(set_cookie: &str) -> String {
        set_cookie
            .split(';')
            .next()
            .expect("cookie pair")
            .to_string()
    }

    /// Encrypts `value` into a session cookie the way the gate does.
    fn encrypted_session(key: &Key, value: String) -> String {
        let jar = PrivateCookieJar::new(key.clone()).add(Cookie::new(SESSION_COOKIE, value));
        cookie_pair(&set_cookie(&jar.into_response()))
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    #[tokio::test]
    async fn login_redirects_to_provider_with_target() {
        let h = harness(FakeProvider::succeeding(alice()));

        let response = send(&h.app, "/auth/login?next=%2Freports%3Fyear%3D2024", None).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            location(&response),
            format!("{FAKE_AUTHORIZE_URL}?state=%2Freports%3Fyear%3D2024")
        );
    }

    #[tokio::test]
    async fn login_replaces_offsite_target() {
        let h = harness(FakeProvider::succeeding(alice()));

        for next in ["http%3A%2F%2Fevil.example%2F", "%2F%2Fevil.example", ""] {
            let response = send(&h.app, &format!("/auth/login?next={next}"), None).await;
            assert_eq!(location(&response), format!("{FAKE_AUTHORIZE_URL}?state=%2F"));
        }

        let response = send(&h.app, "/auth/login", None).await;
        assert_eq!(location(&response), format!("{FAKE_AUTHORIZE_URL}?state=%2F"));
    }

    #[tokio::test]
    async fn callback_sets_session_and_redirects_to_state() {
        let h = harness(FakeProvider::succeeding(alice()));

        let response = send(&h.app, "/auth/callback?code=abc&state=%2Fdashboard", None).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/dashboard");

        let cookie = set_cookie(&response);
        assert!(cookie.starts_with("auth_session="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=86400"));
        assert!(cookie.contains("Secure"));
        assert_eq!(h.provider.exchanges(), 1);
    }

    #[tokio::test]
    async fn callback_with_offsite_state_lands_on_root() {
        let h = harness(FakeProvider::succeeding(alice()));

        let response = send(
            &h.app,
            "/auth/callback?code=abc&state=https%3A%2F%2Fevil.example",
            None,
        )
        .await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/");
    }

    #[tokio::test]
    async fn callback_without_code_is_bad_request() {
        let h = harness(FakeProvider::succeeding(alice()));

        for uri in ["/auth/callback", "/auth/callback?code=&state=%2F"] {
            let response = send(&h.app, uri, None).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert!(response.headers().get(SET_COOKIE).is_none());
        }
        assert_eq!(h.provider.exchanges(), 0);
    }

    #[tokio::test]
    async fn callback_with_provider_error_is_unauthorized() {
        let h = harness(FakeProvider::succeeding(alice()));

        let response = send(
            &h.app,
            "/auth/callback?error=access_denied&state=%2Fdashboard",
            None,
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(SET_COOKIE).is_none());
        assert_eq!(h.provider.exchanges(), 0);
    }

    #[tokio::test]
    async fn failed_exchange_is_unauthorized_without_detail() {
        let h = harness(FakeProvider::failing(AuthenticationError::TokenVerification {
            reason: "signature mismatch for kid test-key".to_string(),
        }));

        let response = send(&h.app, "/auth/callback?code=abc&state=%2F", None).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(SET_COOKIE).is_none());
        let body = body_text(response).await;
        assert_eq!(body, "Authentication failed");
    }

    #[tokio::test]
    async fn unverified_email_is_forbidden() {
        let h = harness(FakeProvider::failing(AuthenticationError::UnverifiedEmail {
            subject: "110169484474386276334".to_string(),
        }));

        let response = send(&h.app, "/auth/callback?code=abc&state=%2F", None).await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn gated_request_without_session_redirects_to_login() {
        let h = harness(FakeProvider::succeeding(alice()));

        let response = send(&h.app, "/dashboard?tab=2", None).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            location(&response),
            "/auth/login?next=%2Fdashboard%3Ftab%3D2"
        );
    }

    #[tokio::test]
    async fn anonymous_status_request_is_forwarded() {
        let h = harness(FakeProvider::succeeding(alice()));

        let response = send(&h.app, "/auth/status", None).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "anonymous");
    }

    #[tokio::test]
    async fn callback_cookie_authenticates_later_requests() {
        let h = harness(FakeProvider::succeeding(alice()));

        let response = send(&h.app, "/auth/callback?code=abc&state=%2Fdashboard", None).await;
        let cookie = cookie_pair(&set_cookie(&response));

        let response = send(&h.app, "/dashboard", Some(&cookie)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "alice@example.com");
    }

    #[tokio::test]
    async fn garbage_session_redirects_to_login() {
        let h = harness(FakeProvider::succeeding(alice()));

        for cookie in ["auth_session=garbage", "auth_session="] {
            let response = send(&h.app, "/dashboard", Some(cookie)).await;
            assert_eq!(response.status(), StatusCode::FOUND, "cookie {cookie:?}");
        }
    }

    #[tokio::test]
    async fn unencrypted_session_payload_is_ignored() {
        let h = harness(FakeProvider::succeeding(alice()));
        let payload = SessionCodec::default().encode(&alice()).expect("encode");

        let cookie = format!("{SESSION_COOKIE}={}", payload.as_str());
        let response = send(&h.app, "/dashboard", Some(&cookie)).await;

        assert_eq!(response.status(), StatusCode::FOUND);
    }

    #[tokio::test]
    async fn session_from_another_key_is_ignored() {
        let h = harness(FakeProvider::succeeding(alice()));
        let payload = SessionCodec::default().encode(&alice()).expect("encode");

        let cookie = encrypted_session(&Key::generate(), payload.into_string());
        let response = send(&h.app, "/dashboard", Some(&cookie)).await;

        assert_eq!(response.status(), StatusCode::FOUND);
    }

    #[tokio::test]
    async fn expired_session_redirects_to_login() {
        let h = harness(FakeProvider::succeeding(alice()));
        let issued_at = chrono::Utc::now() - chrono::Duration::days(2);
        let payload = SessionCodec::default()
            .encode_at(&alice(), issued_at)
            .expect("encode");

        let cookie = encrypted_session(&h.key, payload.into_string());
        let response = send(&h.app, "/dashboard", Some(&cookie)).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert!(location(&response).starts_with("/auth/login?next="));
    }

    #[tokio::test]
    async fn public_path_is_forwarded_untouched() {
        let h = harness(FakeProvider::succeeding(alice()));

        let response = send(&h.app, "/health", Some("auth_session=garbage")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(SET_COOKIE).is_none());
        assert_eq!(body_text(response).await, "ok");
    }

    #[tokio::test]
    async fn logout_clears_cookie_and_redirects_home() {
        let h = harness(FakeProvider::succeeding(alice()));

        let response = send(&h.app, "/auth/logout", None).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/");
        let cookie = set_cookie(&response);
        assert!(cookie.starts_with("auth_session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[test]
    fn rejection_status_codes() {
        let cases = [
            (GateRejection::MissingCode, StatusCode::BAD_REQUEST),
            (
                AuthenticationError::UnverifiedEmail {
                    subject: "s".to_string(),
                }
                .into(),
                StatusCode::FORBIDDEN,
            ),
            (AuthenticationError::Timeout.into(), StatusCode::UNAUTHORIZED),
            (
                AuthenticationError::MissingClaim {
                    claim: "email".to_string(),
                }
                .into(),
                StatusCode::UNAUTHORIZED,
            ),
            (AuthenticationError::MissingCode.into(), StatusCode::BAD_REQUEST),
        ];

        for (rejection, status) in cases {
            assert_eq!(rejection.into_response().status(), status);
        }
    }
}
