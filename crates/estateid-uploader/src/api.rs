//! Backend wire models.

use serde::{Deserialize, Serialize};

/// Route issuing a pre-signed PUT URL for one object.
pub const UPLOAD_URL_PATH: &str = "/upload_url";

/// Route acknowledging that all uploads of a session are done.
pub const RECEIPT_REQUEST_PATH: &str = "/receipt_request";

/// Body of `POST /upload_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadUrlRequest<'a> {
    /// Session the object belongs to.
    pub session_id: &'a str,
    /// Identity subject of the uploader.
    pub user_id: &'a str,
    /// Object (file) name.
    pub object_name: &'a str,
}

/// Body of `POST /receipt_request`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiptRequest<'a> {
    /// Session being completed.
    pub session_id: &'a str,
    /// Identity subject of the uploader.
    pub user_id: &'a str,
}

/// A time-limited storage URL authorizing one PUT of one object.
///
/// The backend echoes the request fields next to `signed_url`; they are kept
/// when present.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct UploadTarget {
    /// Pre-signed PUT URL.
    pub signed_url: String,
    /// Echoed session id.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Echoed identity subject.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Echoed object name.
    #[serde(default)]
    pub object_name: Option<String>,
}

impl UploadTarget {
    /// Create a target from a bare URL.
    #[must_use]
    pub fn new(signed_url: impl Into<String>) -> Self {
        Self {
            signed_url: signed_url.into(),
            session_id: None,
            user_id: None,
            object_name: None,
        }
    }
}

impl std::fmt::Debug for UploadTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The query string carries the storage signature.
        let url = self
            .signed_url
            .split_once('?')
            .map_or(self.signed_url.as_str(), |(base, _)| base);
        f.debug_struct("UploadTarget")
            .field("signed_url", &format_args!("{url}?<redacted>"))
            .field("session_id", &self.session_id)
            .field("user_id", &self.user_id)
            .field("object_name", &self.object_name)
            .finish()
    }
}

/// Acknowledgement returned by `POST /receipt_request`.
///
/// The shape is backend-defined; non-JSON bodies become `Value::Null`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReceiptAck(pub serde_json::Value);

impl ReceiptAck {
    /// Parse an acknowledgement body.
    #[must_use]
    pub fn from_body(body: &[u8]) -> Self {
        Self(serde_json::from_slice(body).unwrap_or(serde_json::Value::Null))
    }
}
