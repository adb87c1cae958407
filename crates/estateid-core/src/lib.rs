//! Core types and configuration for the estate ID upload client.
//!
//! This crate provides the building blocks shared by the signing and upload
//! crates: the session and identity newtypes, the file payload type, and the
//! environment-driven [`ClientConfig`].

mod config;
mod error;
mod types;

pub use config::{ApiEndpoint, ClientConfig, IdentityPoolConfig};
pub use error::{CoreError, CoreResult};
pub use types::{IdentitySubject, SessionId, UploadFile};
