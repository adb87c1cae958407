//! Request signer for backend API calls.
//!
//! [`RequestSigner`] turns a method, route and optional JSON body into an
//! [`http::Request`] carrying SigV4 headers for the configured backend host.
//! Credentials are fetched from the [`CredentialProvider`] on every call and
//! dropped once the request is signed.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use estateid_core::ApiEndpoint;
use http::Method;
use http::header::{AUTHORIZATION, CONTENT_TYPE, HOST};
use tracing::debug;

use crate::canonical::{CanonicalHeaders, CanonicalRequest};
use crate::credentials::{CredentialProvider, Credentials};
use crate::error::AuthError;
use crate::sigv4::{
    AMZ_DATE_FORMAT, SCOPE_DATE_FORMAT, authorization_header, build_string_to_sign,
    compute_signature, credential_scope, derive_signing_key, hash_payload,
};

/// Region in the credential scope of every backend signature.
pub const SIGNING_REGION: &str = "ap-northeast-1";

/// Service name in the credential scope of every backend signature.
pub const SIGNING_SERVICE: &str = "lambda";

/// Content type of every signed backend request.
pub const JSON_CONTENT_TYPE: &str = "application/json";

const X_AMZ_DATE: &str = "x-amz-date";
const X_AMZ_CONTENT_SHA256: &str = "x-amz-content-sha256";
const X_AMZ_SECURITY_TOKEN: &str = "x-amz-security-token";

/// A request with SigV4 headers attached, valid for one issue.
pub type SignedRequest = http::Request<Bytes>;

/// Signs backend API requests for a fixed host.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use estateid_auth::{Credentials, RequestSigner};
/// use http::Method;
///
/// let signer = RequestSigner::new("api.example.com".parse().unwrap());
/// let request = signer
///     .sign_at(
///         &Credentials::new("AKIDEXAMPLE", "secret"),
///         &Method::POST,
///         "/upload_url",
///         Some(br#"{"session_id":"s1"}"#.to_vec().into()),
///         Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
///     )
///     .unwrap();
/// assert!(request.headers().contains_key("authorization"));
/// ```
#[derive(Debug, Clone)]
pub struct RequestSigner {
    endpoint: ApiEndpoint,
}

impl RequestSigner {
    /// Create a signer for the given backend endpoint.
    #[must_use]
    pub fn new(endpoint: ApiEndpoint) -> Self {
        Self { endpoint }
    }

    /// The backend endpoint requests are signed for.
    #[must_use]
    pub fn endpoint(&self) -> &ApiEndpoint {
        &self.endpoint
    }

    /// Fetch current credentials and sign a request to `path`.
    ///
    /// Suspends while the provider resolves (and possibly refreshes)
    /// credentials.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CredentialUnavailable`] when no authenticated
    /// session exists, [`AuthError::UnsupportedMethod`] for methods other than
    /// GET and POST, and [`AuthError::SigningFailed`] if the request cannot
    /// be assembled.
    pub async fn sign(
        &self,
        provider: &dyn CredentialProvider,
        method: &Method,
        path: &str,
        body: Option<Bytes>,
    ) -> Result<SignedRequest, AuthError> {
        ensure_signable(method)?;
        let credentials = provider.credentials().await?;
        self.sign_at(&credentials, method, path, body, Utc::now())
    }

    /// Sign a request with explicit credentials and timestamp.
    ///
    /// # Errors
    ///
    /// Same as [`RequestSigner::sign`], minus credential resolution.
    pub fn sign_at(
        &self,
        credentials: &Credentials,
        method: &Method,
        path: &str,
        body: Option<Bytes>,
        now: DateTime<Utc>,
    ) -> Result<SignedRequest, AuthError> {
        ensure_signable(method)?;
        if !path.starts_with('/') {
            return Err(AuthError::SigningFailed(format!(
                "path must be absolute: {path}"
            )));
        }

        let body = body.unwrap_or_default();
        let amz_date = now.format(AMZ_DATE_FORMAT).to_string();
        let date = now.format(SCOPE_DATE_FORMAT).to_string();
        let payload_hash = hash_payload(&body);

        let mut headers: Vec<(&str, &str)> = vec![
            (HOST.as_str(), self.endpoint.host()),
            (CONTENT_TYPE.as_str(), JSON_CONTENT_TYPE),
            (X_AMZ_CONTENT_SHA256, payload_hash.as_str()),
            (X_AMZ_DATE, amz_date.as_str()),
        ];
        if let Some(token) = credentials.session_token.as_deref() {
            headers.push((X_AMZ_SECURITY_TOKEN, token));
        }

        let canonical = CanonicalRequest::new(
            method.as_str(),
            path,
            CanonicalHeaders::from_pairs(headers.iter().copied()),
            payload_hash.as_str(),
        );
        debug!(canonical_request = %canonical, "Built canonical request");

        let scope = credential_scope(&date, SIGNING_REGION, SIGNING_SERVICE);
        let string_to_sign = build_string_to_sign(&amz_date, &scope, &canonical.digest());
        debug!(string_to_sign, "Built string to sign");

        let signing_key = derive_signing_key(
            &credentials.secret_access_key,
            &date,
            SIGNING_REGION,
            SIGNING_SERVICE,
        );
        let signature = compute_signature(&signing_key, &string_to_sign);
        let authorization = authorization_header(
            &credentials.access_key_id,
            &scope,
            &canonical.signed_headers(),
            &signature,
        );

        let mut builder = http::Request::builder()
            .method(method.clone())
            .uri(self.endpoint.url(path));
        for (name, value) in &headers {
            builder = builder.header(*name, *value);
        }

        builder
            .header(AUTHORIZATION, authorization)
            .body(body)
            .map_err(|e| AuthError::SigningFailed(e.to_string()))
    }
}

fn ensure_signable(method: &Method) -> Result<(), AuthError> {
    if *method == Method::GET || *method == Method::POST {
        Ok(())
    } else {
        Err(AuthError::UnsupportedMethod(method.to_string()))
    }
}
