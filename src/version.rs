//! Firmware version identity.
//!
//! A [`VersionId`] is an opaque token. The agent never orders versions: an
//! announcement triggers an update whenever its token differs from the
//! running one, including "older" tokens.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Opaque firmware build identifier (e.g. `"v1.0.0"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(String);

impl VersionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for VersionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// True iff `announced` is not byte-identical to `current`.
pub fn is_update_needed(current: &VersionId, announced: &VersionId) -> bool {
    current != announced
}
