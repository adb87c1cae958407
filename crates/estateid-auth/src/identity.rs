//! Identity token handling.
//!
//! The identity provider hands out a JWT whose `sub` claim is the stable user
//! identifier. Only the payload is decoded here; verifying the token signature
//! is the backend's job.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use estateid_core::IdentitySubject;
use serde::Deserialize;

use crate::error::AuthError;

/// Raw identity token (a JWT) of the authenticated user.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityToken(String);

#[derive(Debug, Deserialize)]
struct Claims {
    sub: Option<String>,
}

impl IdentityToken {
    /// Wrap a raw JWT string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract the `sub` claim from the token payload.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidIdentityToken`] if the token is not a
    /// three-segment JWT, the payload is not base64url JSON, or `sub` is
    /// missing or empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use estateid_auth::IdentityToken;
    ///
    /// // {"sub":"user-1"}
    /// let token = IdentityToken::new("e30.eyJzdWIiOiJ1c2VyLTEifQ.sig");
    /// assert_eq!(token.subject().unwrap().as_str(), "user-1");
    /// ```
    pub fn subject(&self) -> Result<IdentitySubject, AuthError> {
        let mut segments = self.0.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(AuthError::InvalidIdentityToken(
                "expected three dot-separated segments".to_owned(),
            ));
        };

        let decoded = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| {
                AuthError::InvalidIdentityToken(format!("payload is not base64url: {e}"))
            })?;

        let claims: Claims = serde_json::from_slice(&decoded)
            .map_err(|e| AuthError::InvalidIdentityToken(format!("payload is not JSON: {e}")))?;

        match claims.sub {
            Some(sub) if !sub.is_empty() => Ok(IdentitySubject::new(sub)),
            _ => Err(AuthError::InvalidIdentityToken(
                "missing sub claim".to_owned(),
            )),
        }
    }
}

impl fmt::Debug for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IdentityToken(<redacted>)")
    }
}
