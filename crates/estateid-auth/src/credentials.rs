//! Credential provider trait and implementations.
//!
//! A [`CredentialProvider`] stands in for the managed identity service: it
//! hands out short-lived signing [`Credentials`] and the identity token of the
//! current user. The login flow that establishes the session lives outside this
//! crate.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::AuthError;
use crate::identity::IdentityToken;

/// Short-lived, scoped signing credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Access key id, sent in the clear as part of the credential scope.
    pub access_key_id: String,
    /// Secret access key used to derive the signing key.
    pub secret_access_key: String,
    /// Session token for temporary credentials.
    pub session_token: Option<String>,
    /// When the credentials stop being accepted, if known.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Create long-lived credentials without a session token.
    #[must_use]
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
            expires_at: None,
        }
    }

    /// Attach a session token.
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Attach an expiry time.
    #[must_use]
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Whether the credentials expire within `window` of `now`.
    #[must_use]
    pub fn expires_within(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.expires_at.is_some_and(|at| at - window <= now)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of signing credentials and identity for the current user session.
///
/// Implementations must return [`AuthError::CredentialUnavailable`] when no
/// authenticated session exists, never empty credentials.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Return currently valid credentials, refreshing them if necessary.
    async fn credentials(&self) -> Result<Credentials, AuthError>;

    /// Return the identity token of the authenticated user.
    async fn identity_token(&self) -> Result<IdentityToken, AuthError>;
}

/// A provider returning fixed credentials and a fixed identity token.
///
/// Suitable for tests and development environments.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use estateid_auth::credentials::{CredentialProvider, Credentials, StaticCredentialProvider};
/// use estateid_auth::IdentityToken;
///
/// let provider: Arc<dyn CredentialProvider> = Arc::new(StaticCredentialProvider::new(
///     Credentials::new("AKIDEXAMPLE", "secret"),
///     IdentityToken::new("e30.eyJzdWIiOiJ1c2VyLTEifQ.sig"),
/// ));
/// ```
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    credentials: Credentials,
    identity_token: IdentityToken,
}

impl StaticCredentialProvider {
    /// Create a new provider from fixed values.
    #[must_use]
    pub fn new(credentials: Credentials, identity_token: IdentityToken) -> Self {
        Self {
            credentials,
            identity_token,
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn credentials(&self) -> Result<Credentials, AuthError> {
        Ok(self.credentials.clone())
    }

    async fn identity_token(&self) -> Result<IdentityToken, AuthError> {
        Ok(self.identity_token.clone())
    }
}

/// A provider for a user who is not signed in.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignedOutProvider;

#[async_trait]
impl CredentialProvider for SignedOutProvider {
    async fn credentials(&self) -> Result<Credentials, AuthError> {
        Err(AuthError::CredentialUnavailable)
    }

    async fn identity_token(&self) -> Result<IdentityToken, AuthError> {
        Err(AuthError::CredentialUnavailable)
    }
}

/// A provider reading credentials from the process environment on every call.
///
/// | Variable | Meaning |
/// |----------|---------|
/// | `AWS_ACCESS_KEY_ID` | access key id |
/// | `AWS_SECRET_ACCESS_KEY` | secret access key |
/// | `AWS_SESSION_TOKEN` | optional session token |
/// | `ESTATEID_ID_TOKEN` | identity token (JWT) |
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentialProvider;

impl EnvCredentialProvider {
    fn var(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn credentials(&self) -> Result<Credentials, AuthError> {
        let access_key_id = Self::var("AWS_ACCESS_KEY_ID").ok_or(AuthError::CredentialUnavailable)?;
        let secret_access_key =
            Self::var("AWS_SECRET_ACCESS_KEY").ok_or(AuthError::CredentialUnavailable)?;

        let mut credentials = Credentials::new(access_key_id, secret_access_key);
        credentials.session_token = Self::var("AWS_SESSION_TOKEN");
        Ok(credentials)
    }

    async fn identity_token(&self) -> Result<IdentityToken, AuthError> {
        Self::var("ESTATEID_ID_TOKEN")
            .map(IdentityToken::new)
            .ok_or(AuthError::CredentialUnavailable)
    }
}

/// Default margin before expiry at which cached credentials are refreshed.
const DEFAULT_REFRESH_WINDOW_SECS: i64 = 300;

/// Wraps a provider and caches its credentials until they near expiry.
///
/// Concurrent callers share one refresh: the cache is guarded by an async
/// mutex held across the inner provider call. Credentials without an expiry
/// are cached indefinitely.
pub struct CachingCredentialProvider<P> {
    inner: P,
    refresh_window: Duration,
    cached: Mutex<Option<Credentials>>,
}

impl<P: CredentialProvider> CachingCredentialProvider<P> {
    /// Wrap `inner` with the default five minute refresh window.
    #[must_use]
    pub fn new(inner: P) -> Self {
        Self::with_refresh_window(inner, Duration::seconds(DEFAULT_REFRESH_WINDOW_SECS))
    }

    /// Wrap `inner`, refreshing once credentials expire within `refresh_window`.
    #[must_use]
    pub fn with_refresh_window(inner: P, refresh_window: Duration) -> Self {
        Self {
            inner,
            refresh_window,
            cached: Mutex::new(None),
        }
    }

    /// Drop any cached credentials so the next call refreshes.
    pub async fn invalidate(&self) {
        self.cached.lock().await.take();
    }
}

impl<P> fmt::Debug for CachingCredentialProvider<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingCredentialProvider")
            .field("refresh_window", &self.refresh_window)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<P: CredentialProvider> CredentialProvider for CachingCredentialProvider<P> {
    async fn credentials(&self) -> Result<Credentials, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some(credentials) = cached.as_ref() {
            if !credentials.expires_within(Utc::now(), self.refresh_window) {
                return Ok(credentials.clone());
            }
            debug!(
                access_key_id = %credentials.access_key_id,
                "cached credentials near expiry, refreshing"
            );
        }

        let fresh = self.inner.credentials().await?;
        *cached = Some(fresh.clone());
        Ok(fresh)
    }

    async fn identity_token(&self) -> Result<IdentityToken, AuthError> {
        self.inner.identity_token().await
    }
}

#[async_trait]
impl<P: CredentialProvider + ?Sized> CredentialProvider for Arc<P> {
    async fn credentials(&self) -> Result<Credentials, AuthError> {
        (**self).credentials().await
    }

    async fn identity_token(&self) -> Result<IdentityToken, AuthError> {
        (**self).identity_token().await
    }
}
