//! The three-phase upload protocol for one session.
//!
//! 1. [`UploadCoordinator::request_upload_target`] - signed `POST /upload_url`
//! 2. [`UploadCoordinator::transfer_bytes`] - unsigned `PUT` to the pre-signed URL
//! 3. [`UploadCoordinator::report_completion`] - signed `POST /receipt_request`
//!
//! The coordinator keeps no per-session state. Calling phase C only after every
//! phase B of the session succeeded is the caller's responsibility; see
//! [`crate::SessionUploader`] for a caller that enforces it.

use estateid_auth::AuthSession;
use estateid_core::{ApiEndpoint, ClientConfig, SessionId, UploadFile};
use http::header::CONTENT_TYPE;
use tracing::{info, warn};

use crate::api::{
    RECEIPT_REQUEST_PATH, ReceiptAck, ReceiptRequest, UPLOAD_URL_PATH, UploadTarget,
    UploadUrlRequest,
};
use crate::client::{BackendClient, CallError, failure_body, status_reason};
use crate::error::{UploadError, UploadResult};

/// Drives the upload URL, transfer and completion calls.
#[derive(Debug, Clone)]
pub struct UploadCoordinator {
    backend: BackendClient,
    storage: reqwest::Client,
}

impl UploadCoordinator {
    /// Create a coordinator for the given backend endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::HttpClient`] if the HTTP client cannot be built.
    pub fn new(endpoint: ApiEndpoint) -> UploadResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| UploadError::HttpClient(e.to_string()))?;
        Ok(Self::with_client(http, endpoint))
    }

    /// Create a coordinator for the backend named in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::HttpClient`] if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> UploadResult<Self> {
        Self::new(config.api_endpoint.clone())
    }

    /// Create a coordinator sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(http: reqwest::Client, endpoint: ApiEndpoint) -> Self {
        Self {
            backend: BackendClient::new(http.clone(), endpoint),
            storage: http,
        }
    }

    /// The backend endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &ApiEndpoint {
        self.backend.endpoint()
    }

    /// Phase A: obtain a pre-signed upload URL for `file_name`.
    ///
    /// # Errors
    ///
    /// Credential and signing failures map through
    /// [`UploadError::from`]; transport failures and non-2xx responses become
    /// [`UploadError::UploadTargetRequestFailed`]; an unusable body becomes
    /// [`UploadError::UploadTargetParseFailed`].
    pub async fn request_upload_target(
        &self,
        session: &AuthSession,
        session_id: &SessionId,
        file_name: &str,
    ) -> UploadResult<UploadTarget> {
        let subject = session.subject().await?;
        let request = UploadUrlRequest {
            session_id: session_id.as_str(),
            user_id: subject.as_str(),
            object_name: file_name,
        };

        let body = self
            .backend
            .post_json(session, UPLOAD_URL_PATH, &request)
            .await
            .map_err(|e| match e {
                CallError::Auth(auth) => UploadError::from(auth),
                other => {
                    warn!(
                        session_id = %session_id,
                        object_name = file_name,
                        reason = %other.reason(),
                        "Upload URL request failed"
                    );
                    UploadError::UploadTargetRequestFailed {
                        object_name: file_name.to_owned(),
                        reason: other.reason(),
                    }
                }
            })?;

        let target = parse_upload_target(&body).map_err(|reason| {
            warn!(
                session_id = %session_id,
                object_name = file_name,
                %reason,
                "Malformed upload URL response"
            );
            UploadError::UploadTargetParseFailed {
                object_name: file_name.to_owned(),
                reason,
            }
        })?;

        info!(session_id = %session_id, object_name = file_name, "Upload URL issued");
        Ok(target)
    }

    /// Phase B: PUT the file bytes to the pre-signed URL.
    ///
    /// No signature is attached; the URL itself carries the authorization.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::TransferFailed`] on transport failure or a
    /// non-2xx response. The transfer is not retried.
    pub async fn transfer_bytes(
        &self,
        target: &UploadTarget,
        file: &UploadFile,
    ) -> UploadResult<()> {
        let transfer_failed = |reason: String| {
            warn!(object_name = %file.name, %reason, "Transfer failed");
            UploadError::TransferFailed {
                object_name: file.name.clone(),
                reason,
            }
        };

        let mut request = self.storage.put(&target.signed_url);
        if !file.content_type.is_empty() {
            request = request.header(CONTENT_TYPE, &file.content_type);
        }

        let response = request
            .body(file.bytes.clone())
            .send()
            .await
            .map_err(|e| transfer_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = failure_body(response.text().await);
            return Err(transfer_failed(status_reason(status, &body)));
        }

        info!(
            object_name = %file.name,
            bytes = file.len(),
            status = %status,
            "Transferred object"
        );
        Ok(())
    }

    /// Phase C: tell the backend every upload of the session is done.
    ///
    /// # Errors
    ///
    /// Credential and signing failures map through [`UploadError::from`];
    /// anything else becomes [`UploadError::CompletionReportFailed`].
    pub async fn report_completion(
        &self,
        session: &AuthSession,
        session_id: &SessionId,
    ) -> UploadResult<ReceiptAck> {
        let subject = session.subject().await?;
        let request = ReceiptRequest {
            session_id: session_id.as_str(),
            user_id: subject.as_str(),
        };

        let body = self
            .backend
            .post_json(session, RECEIPT_REQUEST_PATH, &request)
            .await
            .map_err(|e| match e {
                CallError::Auth(auth) => UploadError::from(auth),
                other => {
                    warn!(
                        session_id = %session_id,
                        reason = %other.reason(),
                        "Completion report failed"
                    );
                    UploadError::CompletionReportFailed {
                        session_id: session_id.clone(),
                        reason: other.reason(),
                    }
                }
            })?;

        info!(session_id = %session_id, "Session completion reported");
        Ok(ReceiptAck::from_body(&body))
    }
}

fn parse_upload_target(body: &[u8]) -> Result<UploadTarget, String> {
    let target: UploadTarget =
        serde_json::from_slice(body).map_err(|e| format!("invalid JSON: {e}"))?;
    let url = reqwest::Url::parse(&target.signed_url)
        .map_err(|e| format!("signed_url is not a URL: {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("signed_url has unsupported scheme {}", url.scheme()));
    }
    Ok(target)
}
