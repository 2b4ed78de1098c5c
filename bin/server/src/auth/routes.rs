//! Path layout and per-request classification for the gate.

/// Paths served without a session unless configured otherwise.
pub const DEFAULT_PUBLIC_PATHS: &[&str] = &["/health", "/docs", "/redoc", "/openapi.json"];

/// What the gate does with a request, decided from its path alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Start the authorization-code flow.
    Login,
    /// Complete the authorization-code flow.
    Callback,
    /// Clear the session.
    Logout,
    /// Forward without reading or writing the session.
    Public,
    /// Forward only with a valid session.
    Gated,
}

/// Where the gate's own endpoints live and which paths bypass it.
#[derive(Debug, Clone)]
pub struct AuthPaths {
    prefix: String,
    public: Vec<String>,
}

impl Default for AuthPaths {
    fn default() -> Self {
        Self::new(
            "/auth",
            DEFAULT_PUBLIC_PATHS
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
        )
    }
}

impl AuthPaths {
    /// Creates a layout with endpoints under `prefix`.
    ///
    /// Trailing slashes on the prefix and public paths are ignored.
    pub fn new(prefix: impl Into<String>, public: Vec<String>) -> Self {
        let prefix = prefix.into().trim_end_matches('/').to_string();
        let public = public
            .into_iter()
            .map(|p| {
                let trimmed = p.trim_end_matches('/');
                if trimmed.is_empty() {
                    "/".to_string()
                } else {
                    trimmed.to_string()
                }
            })
            .collect();

        Self { prefix, public }
    }

    /// Returns the path that starts the login flow.
    pub fn login_path(&self) -> String {
        format!("{}/login", self.prefix)
    }

    /// Returns the path the provider redirects back to.
    pub fn callback_path(&self) -> String {
        format!("{}/callback", self.prefix)
    }

    /// Returns the path that clears the session.
    pub fn logout_path(&self) -> String {
        format!("{}/logout", self.prefix)
    }

    /// Returns the path of the status endpoint.
    pub fn status_path(&self) -> String {
        format!("{}/status", self.prefix)
    }

    /// Classifies a request path.
    ///
    /// The auth endpoints are matched exactly. Public paths are matched as a
    /// prefix on a segment boundary, so `/docs` covers `/docs/index.html` but
    /// not `/docsecret`. Everything else, the status endpoint included, is gated;
    /// the gate forwards an anonymous status request instead of redirecting it.
    pub fn classify(&self, path: &str) -> Route {
        if let Some(rest) = path.strip_prefix(self.prefix.as_str()) {
            match rest {
                "/login" => return Route::Login,
                "/callback" => return Route::Callback,
                "/logout" => return Route::Logout,
                _ => {}
            }
        }

        if self.public.iter().any(|public| is_under(path, public)) {
            return Route::Public;
        }

        Route::Gated
    }
}

/// Returns true if `path` is `base` or lies below it.
fn is_under(path: &str, base: &str) -> bool {
    if base == "/" {
        return path == "/";
    }

    match path.strip_prefix(base) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
