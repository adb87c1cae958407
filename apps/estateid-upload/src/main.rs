//! estateid-upload - upload files to the estate ID processing backend.
//!
//! Each invocation is one upload session: every file gets a pre-signed URL and
//! is PUT to object storage, then the backend is told the session is complete.
//! Completion is only reported when every file made it.
//!
//! # Usage
//!
//! ```text
//! ESTATEID_API_ENDPOINT=api.example.com estateid-upload bldg.gml dem.tif
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `ESTATEID_API_ENDPOINT` | *(required)* | Backend host |
//! | `ESTATEID_UPLOAD_CONCURRENCY` | `4` | Files in flight per session |
//! | `ESTATEID_COGNITO_REGION` | `ap-northeast-1` | Identity service region (logged) |
//! | `ESTATEID_COGNITO_USER_POOL_ID` | *(unset)* | User pool (logged) |
//! | `ESTATEID_COGNITO_CLIENT_ID` | *(unset)* | User pool app client (logged) |
//! | `ESTATEID_COGNITO_IDENTITY_POOL_ID` | *(unset)* | Identity pool (logged) |
//! | `AWS_ACCESS_KEY_ID` | *(required)* | Signing access key |
//! | `AWS_SECRET_ACCESS_KEY` | *(required)* | Signing secret key |
//! | `AWS_SESSION_TOKEN` | *(unset)* | Signing session token |
//! | `ESTATEID_ID_TOKEN` | *(required)* | Identity token of the signed-in user |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

mod cli;
mod media;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use estateid_auth::AuthSession;
use estateid_auth::credentials::{CachingCredentialProvider, EnvCredentialProvider};
use estateid_core::{ClientConfig, SessionId, UploadFile};
use estateid_uploader::{SessionUploader, UploadError};
use mime::Mime;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    Ok(())
}

/// Object name for a path: its final component.
fn object_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_owned)
        .with_context(|| format!("cannot derive an object name from {}", path.display()))
}

async fn read_files(paths: &[PathBuf], declared: Option<&Mime>) -> Result<Vec<UploadFile>> {
    let mut seen = HashSet::new();
    let mut names = Vec::with_capacity(paths.len());
    for path in paths {
        let name = object_name(path)?;
        if !seen.insert(name.clone()) {
            bail!("duplicate object name {name} in one session");
        }
        names.push(name);
    }

    let mut files = Vec::with_capacity(paths.len());
    for (path, name) in paths.iter().zip(names) {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let content_type = media::content_type_for(declared, &name, &bytes);
        files.push(UploadFile::new(name, content_type, bytes));
    }

    Ok(files)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ClientConfig::from_env().context("failed to load configuration")?;
    if let Some(concurrency) = cli.concurrency {
        config.upload_concurrency = concurrency.get();
    }

    init_tracing(&config.log_level)?;

    let session_id = match cli.session_id {
        Some(id) => SessionId::new(id).context("invalid --session-id")?,
        None => SessionId::generate(),
    };
    let declared = cli
        .content_type
        .as_deref()
        .map(media::parse_declared)
        .transpose()?;

    let files = read_files(&cli.files, declared.as_ref()).await?;

    info!(
        endpoint = %config.api_endpoint,
        session_id = %session_id,
        files = files.len(),
        "Starting estateid-upload v{}",
        env!("CARGO_PKG_VERSION"),
    );

    if config.identity.is_configured() {
        info!(identity = %config.identity, "Identity service");
    } else {
        warn!(
            identity = %config.identity,
            "Identity pools not configured, relying on credentials from the environment"
        );
    }

    let session = AuthSession::new(CachingCredentialProvider::new(EnvCredentialProvider));
    let uploader = SessionUploader::from_config(&config).context("failed to create uploader")?;

    let report = uploader
        .upload(&session, &session_id, files)
        .await
        .inspect_err(|e| {
            if let UploadError::IncompleteSession { failed, .. } = e {
                for failure in failed {
                    error!(
                        object_name = %failure.object_name,
                        error = %failure.error,
                        "File not uploaded"
                    );
                }
            }
        })
        .with_context(|| format!("upload session {session_id} failed"))?;

    for file in &report.uploaded {
        info!(object_name = %file.object_name, bytes = file.size, "Uploaded");
    }
    info!(session_id = %report.session_id, "Session complete");
    println!("{}", report.session_id);

    Ok(())
}
