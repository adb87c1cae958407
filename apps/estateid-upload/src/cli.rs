//! Command-line arguments.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "estateid-upload")]
#[command(version, about = "Upload files to the estate ID processing backend", long_about = None)]
pub struct Cli {
    /// Session grouping the uploads. A random UUID is used when omitted.
    #[arg(long)]
    pub session_id: Option<String>,

    /// Media type sent for every file. Detected per file when omitted.
    #[arg(long)]
    pub content_type: Option<String>,

    /// Maximum number of files in flight. Overrides `ESTATEID_UPLOAD_CONCURRENCY`.
    #[arg(long)]
    pub concurrency: Option<NonZeroUsize>,

    /// Files to upload as one session.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}
