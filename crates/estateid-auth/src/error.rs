//! Error types for credential resolution and request signing.

/// Errors that can occur while obtaining credentials or signing a request.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No authenticated session exists, so no credentials can be supplied.
    #[error("No credentials available: no authenticated session")]
    CredentialUnavailable,

    /// The identity token could not be decoded or lacks a `sub` claim.
    #[error("Invalid identity token: {0}")]
    InvalidIdentityToken(String),

    /// Only GET and POST are signed for backend calls.
    #[error("Unsupported method for signing: {0}")]
    UnsupportedMethod(String),

    /// The signed request could not be assembled.
    #[error("Signing failed: {0}")]
    SigningFailed(String),
}
