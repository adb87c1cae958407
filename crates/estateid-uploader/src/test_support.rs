//! Fixtures shared by the coordinator and session tests.

use estateid_auth::credentials::StaticCredentialProvider;
use estateid_auth::{AuthSession, Credentials, IdentityToken};

use crate::UploadCoordinator;

/// `sub` claim of [`TEST_ID_TOKEN`].
pub(crate) const TEST_SUBJECT: &str = "user-1";

/// Unsigned identity token whose payload is `{"sub":"user-1"}`.
pub(crate) const TEST_ID_TOKEN: &str = "e30.eyJzdWIiOiJ1c2VyLTEifQ.sig";

pub(crate) fn signed_in_session() -> AuthSession {
    AuthSession::new(StaticCredentialProvider::new(
        Credentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY")
            .with_session_token("session-token"),
        IdentityToken::new(TEST_ID_TOKEN),
    ))
}

pub(crate) fn coordinator_for(server: &mockito::ServerGuard) -> UploadCoordinator {
    UploadCoordinator::with_client(reqwest::Client::new(), server.url().parse().unwrap())
}
