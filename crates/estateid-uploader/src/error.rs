//! Upload workflow error types.
//!
//! Each phase of the workflow has its own failure variant so callers can
//! decide which phase to re-invoke. Nothing here is retried internally.

use std::fmt;

use estateid_auth::AuthError;
use estateid_core::SessionId;

use crate::session::SessionEvent;

/// Errors surfaced by the upload coordinator and session uploader.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// No authenticated session exists.
    #[error("no authenticated session: credentials unavailable")]
    CredentialUnavailable,

    /// The identity token of the session is unusable.
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    /// The backend request could not be signed.
    #[error("request signing failed: {0}")]
    SigningFailed(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP client initialisation failed: {0}")]
    HttpClient(String),

    /// Requesting a pre-signed upload URL failed in transport or with a non-2xx status.
    #[error("upload URL request for {object_name} failed: {reason}")]
    UploadTargetRequestFailed {
        /// Object the URL was requested for.
        object_name: String,
        /// Transport error or status description.
        reason: String,
    },

    /// The upload URL response body was not a valid upload target.
    #[error("upload URL response for {object_name} is malformed: {reason}")]
    UploadTargetParseFailed {
        /// Object the URL was requested for.
        object_name: String,
        /// Parse failure description.
        reason: String,
    },

    /// The PUT to object storage failed.
    #[error("transfer of {object_name} failed: {reason}")]
    TransferFailed {
        /// Object being transferred.
        object_name: String,
        /// Transport error or status description.
        reason: String,
    },

    /// Reporting session completion to the backend failed.
    #[error("completion report for session {session_id} failed: {reason}")]
    CompletionReportFailed {
        /// Session being completed.
        session_id: SessionId,
        /// Transport error or status description.
        reason: String,
    },

    /// A session was started without any files.
    #[error("session has no files to upload")]
    EmptySession,

    /// Some files of the session failed; completion was not reported.
    #[error("session {session_id} incomplete: {} of {total} files failed", .failed.len())]
    IncompleteSession {
        /// Session that was left incomplete.
        session_id: SessionId,
        /// Number of files in the session.
        total: usize,
        /// The files that failed and why.
        failed: Vec<FileFailure>,
        /// Trace of the session up to the point it stopped.
        events: Vec<SessionEvent>,
    },
}

impl From<AuthError> for UploadError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::CredentialUnavailable => Self::CredentialUnavailable,
            AuthError::InvalidIdentityToken(reason) => Self::InvalidIdentity(reason),
            AuthError::UnsupportedMethod(_) | AuthError::SigningFailed(_) => {
                Self::SigningFailed(error.to_string())
            }
        }
    }
}

/// A file that failed within a session, with the phase error that stopped it.
#[derive(Debug)]
pub struct FileFailure {
    /// Object name of the failed file.
    pub object_name: String,
    /// The error that stopped it.
    pub error: UploadError,
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.object_name, self.error)
    }
}

/// Convenience result type for upload operations.
pub type UploadResult<T> = Result<T, UploadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_map_auth_errors_to_upload_taxonomy() {
        assert!(matches!(
            UploadError::from(AuthError::CredentialUnavailable),
            UploadError::CredentialUnavailable
        ));
        assert!(matches!(
            UploadError::from(AuthError::InvalidIdentityToken("bad".to_owned())),
            UploadError::InvalidIdentity(reason) if reason == "bad"
        ));
        assert!(matches!(
            UploadError::from(AuthError::SigningFailed("boom".to_owned())),
            UploadError::SigningFailed(_)
        ));
    }

    #[test]
    fn test_should_describe_incomplete_session() {
        let error = UploadError::IncompleteSession {
            session_id: SessionId::new("s1").unwrap(),
            total: 3,
            failed: vec![FileFailure {
                object_name: "b.gml".to_owned(),
                error: UploadError::TransferFailed {
                    object_name: "b.gml".to_owned(),
                    reason: "HTTP 403 Forbidden".to_owned(),
                },
            }],
            events: Vec::new(),
        };
        assert_eq!(error.to_string(), "session s1 incomplete: 1 of 3 files failed");
    }
}
