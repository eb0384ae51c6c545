// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace identifier derivation.
//!
//! A workspace id is a stable short string derived from the absolute
//! workfile path: the same path always yields the same id, different
//! paths yield different ids. The id doubles as the URL path segment and
//! the cache directory name, so it must stay filesystem- and URL-safe.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use smol_str::SmolStr;
use std::fmt;
use std::path::Path;

/// Hex characters of the path digest kept in the id.
const ID_LEN: usize = 12;

/// Deterministic identifier for an open workfile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceId(SmolStr);

impl WorkspaceId {
    /// Derive the id for a workfile path.
    ///
    /// The path is made absolute (without resolving symlinks, so the file
    /// does not need to exist yet) and hashed.
    pub fn for_path(path: &Path) -> Self {
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let digest = Sha256::digest(absolute.to_string_lossy().as_bytes());
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        Self(SmolStr::new(&hex[..ID_LEN]))
    }

    /// Wrap an id received over the wire (URL segment).
    pub fn from_string(id: impl AsRef<str>) -> Self {
        Self(SmolStr::new(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WorkspaceId {
    fn from(s: &str) -> Self {
        Self::from_string(s)
    }
}

impl AsRef<str> for WorkspaceId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl std::borrow::Borrow<str> for WorkspaceId {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
