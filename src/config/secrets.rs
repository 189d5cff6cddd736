//! Secret handling utilities.
//!
//! Re-exports secrecy types and builds the one header that ever exposes
//! the dashboard token.

pub use secrecy::{ExposeSecret, SecretString};

/// Authorization scheme expected by the collector.
pub const AUTH_SCHEME: &str = "dashboard-token";

/// Value of the `Authorization` header for the given token.
pub fn authorization_value(token: &SecretString) -> String {
    format!("{AUTH_SCHEME} {}", token.expose_secret())
}
