//! AWS Signature Version 4 request signing for the estate ID upload client.
//!
//! Backend API calls are authenticated with short-lived credentials issued by
//! a managed identity service. This crate provides the pieces between that
//! service and the network:
//!
//! - [`credentials`] - Credential provider trait and implementations
//! - [`identity`] - Identity token subject extraction
//! - [`session`] - Explicit authenticated-session handle
//! - [`canonical`] - Canonical request construction per the SigV4 rules
//! - [`sigv4`] - Signing key derivation and signature computation
//! - [`signer`] - Request signer for the fixed backend host
//! - [`error`] - Authentication error types
//!
//! # Usage
//!
//! ```rust
//! use estateid_auth::{AuthSession, Credentials, IdentityToken, RequestSigner};
//! use estateid_auth::credentials::StaticCredentialProvider;
//!
//! let session = AuthSession::new(StaticCredentialProvider::new(
//!     Credentials::new("AKIDEXAMPLE", "secret"),
//!     IdentityToken::new("e30.eyJzdWIiOiJ1c2VyLTEifQ.sig"),
//! ));
//! let signer = RequestSigner::new("api.example.com".parse().unwrap());
//!
//! // signer.sign(session.provider(), &http::Method::POST, "/upload_url", body).await
//! ```

pub mod canonical;
pub mod credentials;
pub mod error;
pub mod identity;
pub mod session;
pub mod signer;
pub mod sigv4;

pub use credentials::{CredentialProvider, Credentials};
pub use error::AuthError;
pub use identity::IdentityToken;
pub use session::AuthSession;
pub use signer::{RequestSigner, SIGNING_REGION, SIGNING_SERVICE, SignedRequest};
