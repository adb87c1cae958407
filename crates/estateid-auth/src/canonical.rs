//! Canonical request construction for AWS Signature Version 4.
//!
//! The canonical form of an outgoing request is:
//!
//! ```text
//! HTTPRequestMethod\n
//! CanonicalURI\n
//! CanonicalQueryString\n
//! CanonicalHeaders\n\n
//! SignedHeaders\n
//! HashedPayload
//! ```
//!
//! Since the client builds the request it signs, every component is encoded
//! here rather than taken from the wire.

use std::collections::BTreeMap;
use std::fmt;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use sha2::{Digest, Sha256};

/// Characters left unescaped by SigV4: `A-Z a-z 0-9 - _ . ~`.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Lowercased, sorted, whitespace-normalized headers that take part in the signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalHeaders {
    entries: BTreeMap<String, String>,
}

impl CanonicalHeaders {
    /// Build canonical headers from name/value pairs.
    ///
    /// Repeated names are joined with commas in insertion order.
    ///
    /// # Examples
    ///
    /// ```
    /// use estateid_auth::canonical::CanonicalHeaders;
    ///
    /// let headers = CanonicalHeaders::from_pairs([
    ///     ("X-Amz-Date", "20150830T123600Z"),
    ///     ("Host", " example.amazonaws.com "),
    /// ]);
    /// assert_eq!(headers.signed_headers(), "host;x-amz-date");
    /// ```
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut entries: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in pairs {
            let value = collapse_whitespace(value.trim());
            entries
                .entry(name.to_ascii_lowercase())
                .and_modify(|existing| {
                    existing.push(',');
                    existing.push_str(&value);
                })
                .or_insert(value);
        }
        Self { entries }
    }

    /// The semicolon-separated list of signed header names.
    #[must_use]
    pub fn signed_headers(&self) -> String {
        self.entries.keys().map(String::as_str).collect::<Vec<_>>().join(";")
    }
}

impl fmt::Display for CanonicalHeaders {
    /// Writes one `name:value` line per header, without a trailing newline.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{name}:{value}")?;
        }
        Ok(())
    }
}

/// A fully canonicalized request, ready to be hashed into the string to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest {
    method: String,
    uri: String,
    query: String,
    headers: CanonicalHeaders,
    payload_hash: String,
}

impl CanonicalRequest {
    /// Canonicalize a request.
    ///
    /// `path_and_query` is the request target as sent (`/route?a=b`);
    /// `payload_hash` is the hex SHA-256 of the body.
    #[must_use]
    pub fn new(
        method: &str,
        path_and_query: &str,
        headers: CanonicalHeaders,
        payload_hash: impl Into<String>,
    ) -> Self {
        let (path, query) = path_and_query
            .split_once('?')
            .unwrap_or((path_and_query, ""));

        Self {
            method: method.to_ascii_uppercase(),
            uri: canonical_uri(path),
            query: canonical_query_string(query),
            headers,
            payload_hash: payload_hash.into(),
        }
    }

    /// The semicolon-separated signed header list.
    #[must_use]
    pub fn signed_headers(&self) -> String {
        self.headers.signed_headers()
    }

    /// Hex SHA-256 of the canonical request string.
    #[must_use]
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.to_string().as_bytes()))
    }
}

impl fmt::Display for CanonicalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n{}\n{}\n{}\n\n{}\n{}",
            self.method,
            self.uri,
            self.query,
            self.headers,
            self.headers.signed_headers(),
            self.payload_hash
        )
    }
}

/// Percent-encode each path segment, preserving `/`. Empty paths become `/`.
///
/// Segments are decoded before encoding so an already-encoded path is not
/// encoded twice.
///
/// # Examples
///
/// ```
/// use estateid_auth::canonical::canonical_uri;
///
/// assert_eq!(canonical_uri("/upload_url"), "/upload_url");
/// assert_eq!(canonical_uri(""), "/");
/// assert_eq!(canonical_uri("/a b"), "/a%20b");
/// ```
#[must_use]
pub fn canonical_uri(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_owned();
    }

    path.split('/')
        .map(|segment| uri_encode(&percent_decode_str(segment).decode_utf8_lossy()))
        .collect::<Vec<_>>()
        .join("/")
}

/// Encode and sort query parameters by name, then value.
///
/// # Examples
///
/// ```
/// use estateid_auth::canonical::canonical_query_string;
///
/// assert_eq!(canonical_query_string(""), "");
/// assert_eq!(canonical_query_string("b=2&a=1"), "a=1&b=2");
/// assert_eq!(canonical_query_string("k=a b"), "k=a%20b");
/// ```
#[must_use]
pub fn canonical_query_string(query: &str) -> String {
    let mut params: Vec<(String, String)> = query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|param| {
            let (k, v) = param.split_once('=').unwrap_or((param, ""));
            (
                uri_encode(&percent_decode_str(k).decode_utf8_lossy()),
                uri_encode(&percent_decode_str(v).decode_utf8_lossy()),
            )
        })
        .collect();

    params.sort_unstable();

    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn uri_encode(input: &str) -> String {
    utf8_percent_encode(input, UNRESERVED).to_string()
}

fn collapse_whitespace(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_was_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_was_space {
                result.push(' ');
            }
            prev_was_space = true;
        } else {
            result.push(ch);
            prev_was_space = false;
        }
    }
    result
}
