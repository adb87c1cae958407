//! Pre-signed URL upload workflow for the estate ID processing backend.
//!
//! A session uploads one or more files in three phases:
//!
//! - [`coordinator`] - Signed upload-URL request, unsigned storage PUT and
//!   signed completion report for single files
//! - [`session`] - Runs the phases for a whole session and reports completion
//!   only after every transfer succeeded
//! - [`api`] - Backend request and response bodies
//! - [`client`] - SigV4-signed JSON calls to the backend host
//! - [`error`] - Per-phase error taxonomy
//!
//! # Usage
//!
//! ```rust,no_run
//! use estateid_auth::AuthSession;
//! use estateid_auth::credentials::{CachingCredentialProvider, EnvCredentialProvider};
//! use estateid_core::{ClientConfig, SessionId, UploadFile};
//! use estateid_uploader::SessionUploader;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env()?;
//! let session = AuthSession::new(CachingCredentialProvider::new(EnvCredentialProvider));
//! let uploader = SessionUploader::from_config(&config)?;
//!
//! let files = vec![UploadFile::new("a.gml", "application/gml+xml", b"<gml/>".to_vec())];
//! let report = uploader.upload(&session, &SessionId::generate(), files).await?;
//! println!("uploaded {} files", report.uploaded.len());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod coordinator;
pub mod error;
pub mod session;

#[cfg(test)]
mod test_support;

pub use api::{ReceiptAck, UploadTarget};
pub use client::BackendClient;
pub use coordinator::UploadCoordinator;
pub use error::{FileFailure, UploadError, UploadResult};
pub use session::{SessionEvent, SessionReport, SessionUploader, UploadedFile};
