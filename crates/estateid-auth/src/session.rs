//! Explicit authenticated-session handle.

use std::fmt;
use std::sync::Arc;

use estateid_core::IdentitySubject;

use crate::credentials::{CredentialProvider, Credentials, SignedOutProvider};
use crate::error::AuthError;

/// The authenticated user session passed into every backend call.
///
/// Cloning is cheap; clones share the same provider (and therefore the same
/// credential cache, if the provider keeps one).
#[derive(Clone)]
pub struct AuthSession {
    provider: Arc<dyn CredentialProvider>,
}

impl AuthSession {
    /// Create a session backed by `provider`.
    pub fn new(provider: impl CredentialProvider + 'static) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }

    /// Create a session from an already shared provider.
    #[must_use]
    pub fn from_shared(provider: Arc<dyn CredentialProvider>) -> Self {
        Self { provider }
    }

    /// A session for a user who is not signed in.
    #[must_use]
    pub fn signed_out() -> Self {
        Self::new(SignedOutProvider)
    }

    /// The credential provider of this session.
    #[must_use]
    pub fn provider(&self) -> &dyn CredentialProvider {
        self.provider.as_ref()
    }

    /// Current signing credentials.
    pub async fn credentials(&self) -> Result<Credentials, AuthError> {
        self.provider.credentials().await
    }

    /// The identity subject of the signed-in user.
    pub async fn subject(&self) -> Result<IdentitySubject, AuthError> {
        self.provider.identity_token().await?.subject()
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession").finish_non_exhaustive()
    }
}
