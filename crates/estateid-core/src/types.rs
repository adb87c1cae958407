//! Domain value types shared across the upload workflow.

use std::fmt;

use bytes::Bytes;

/// Identifier grouping the uploads that form one logical submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Create a session id from a caller supplied string.
    ///
    /// # Errors
    /// Returns an error if the id is empty or whitespace only.
    pub fn new(id: impl Into<String>) -> Result<Self, crate::CoreError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(crate::CoreError::InvalidSessionId);
        }
        Ok(Self(id))
    }

    /// Generate a fresh random session id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the session id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable user identifier (the `sub` claim) of an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct IdentitySubject(String);

impl IdentitySubject {
    /// Wrap a subject string.
    #[must_use]
    pub fn new(sub: impl Into<String>) -> Self {
        Self(sub.into())
    }

    /// Get the subject as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentitySubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file selected for upload: object name, declared media type and raw bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    /// Object name sent to the backend (the file's base name).
    pub name: String,
    /// Declared media type, sent as `Content-Type` on the storage PUT.
    pub content_type: String,
    /// Raw file contents.
    pub bytes: Bytes,
}

impl UploadFile {
    /// Create a new upload file.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Size of the file contents in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the file has no contents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}
