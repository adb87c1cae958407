//! Media type selection for uploaded files.

use anyhow::{Context, Result};
use mime::Mime;

/// Parse a media type given on the command line.
pub fn parse_declared(value: &str) -> Result<Mime> {
    value
        .trim()
        .parse()
        .with_context(|| format!("invalid media type: {value}"))
}

/// Pick the `Content-Type` for a file.
///
/// A declared type wins. Otherwise the content is sniffed, then the extension
/// is consulted for text formats that carry no magic bytes.
pub fn content_type_for(declared: Option<&Mime>, file_name: &str, bytes: &[u8]) -> String {
    if let Some(declared) = declared {
        return declared.to_string();
    }
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_owned();
    }
    by_extension(file_name).map_or_else(
        || mime::APPLICATION_OCTET_STREAM.to_string(),
        str::to_owned,
    )
}

fn by_extension(file_name: &str) -> Option<&'static str> {
    let (_, extension) = file_name.rsplit_once('.')?;
    match extension.to_ascii_lowercase().as_str() {
        "gml" => Some("application/gml+xml"),
        "xml" => Some("text/xml"),
        "json" | "geojson" => Some("application/json"),
        "csv" => Some("text/csv"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}
