//! Record identifiers: the caller's handle for a stored blob.
//!
//! Ids become file names under the storage root, so anything that could
//! escape the root (path separators, `..`) is rejected up front.

use std::fmt;

use crate::error::{StowageError, StowageResult};

/// A validated record identifier.
///
/// Guaranteed non-empty and free of `/`, `\` and `..`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> StowageResult<Self> {
        let id = id.into();
        validate(&id)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Check a raw id against the record id rules without allocating.
pub fn validate(id: &str) -> StowageResult<()> {
    if id.is_empty() {
        return Err(StowageError::InvalidArgument(
            "record id cannot be empty".into(),
        ));
    }
    if id.contains('/') || id.contains('\\') || id.contains("..") {
        return Err(StowageError::InvalidArgument(format!(
            "record id '{id}' contains forbidden characters or sequences"
        )));
    }
    Ok(())
}
