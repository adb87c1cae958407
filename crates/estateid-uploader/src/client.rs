//! Signed JSON calls to the backend API.

use bytes::Bytes;
use estateid_auth::{AuthError, AuthSession, RequestSigner};
use estateid_core::ApiEndpoint;
use http::{Method, StatusCode};
use serde::Serialize;
use tracing::debug;

/// Why a backend call did not produce a 2xx response.
#[derive(Debug)]
pub(crate) enum CallError {
    /// Credential resolution or signing failed before anything was sent.
    Auth(AuthError),
    /// The request body could not be serialized.
    Encode(serde_json::Error),
    /// The request failed in transport.
    Transport(reqwest::Error),
    /// The backend answered with a non-2xx status.
    Status { status: StatusCode, body: String },
}

impl CallError {
    /// Human readable reason for phase error variants.
    pub(crate) fn reason(&self) -> String {
        match self {
            Self::Auth(e) => e.to_string(),
            Self::Encode(e) => format!("cannot encode request body: {e}"),
            Self::Transport(e) => e.to_string(),
            Self::Status { status, body } => status_reason(*status, body),
        }
    }
}

/// Render an HTTP status plus a short body excerpt.
pub(crate) fn status_reason(status: StatusCode, body: &str) -> String {
    const MAX_BODY: usize = 200;
    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {status}")
    } else {
        let excerpt: String = body.chars().take(MAX_BODY).collect();
        format!("HTTP {status}: {excerpt}")
    }
}

/// Body text for a failure reason, or the read error if the body was lost.
pub(crate) fn failure_body<E: std::fmt::Display>(body: Result<String, E>) -> String {
    body.unwrap_or_else(|e| format!("<body unreadable: {e}>"))
}

/// Client issuing SigV4-signed JSON POSTs against the backend host.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    signer: RequestSigner,
}

impl BackendClient {
    /// Create a backend client sharing `http` for transport.
    #[must_use]
    pub fn new(http: reqwest::Client, endpoint: ApiEndpoint) -> Self {
        Self {
            http,
            signer: RequestSigner::new(endpoint),
        }
    }

    /// The backend endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &ApiEndpoint {
        self.signer.endpoint()
    }

    /// Sign and send a JSON POST, returning the body of a 2xx response.
    pub(crate) async fn post_json<T: Serialize + ?Sized>(
        &self,
        session: &AuthSession,
        path: &str,
        body: &T,
    ) -> Result<Bytes, CallError> {
        let payload = serde_json::to_vec(body).map_err(CallError::Encode)?;
        let signed = self
            .signer
            .sign(session.provider(), &Method::POST, path, Some(payload.into()))
            .await
            .map_err(CallError::Auth)?;

        let (parts, body) = signed.into_parts();
        debug!(method = %parts.method, uri = %parts.uri, "Sending signed backend request");

        let response = self
            .http
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers)
            .body(body)
            .send()
            .await
            .map_err(CallError::Transport)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(CallError::Transport)?;

        if status.is_success() {
            Ok(bytes)
        } else {
            Err(CallError::Status {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            })
        }
    }
}
