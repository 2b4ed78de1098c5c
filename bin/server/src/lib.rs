//! oauth-gate server.
//!
//! An authenticating front for an HTTP application: users sign in with an
//! OpenID Connect provider (Google by default), the verified identity is kept
//! in an encrypted session cookie, and downstream handlers read it from the
//! request without touching the cookie themselves.

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod home;
