//! Stable file identity for conversion tracking
//!
//! Every candidate file gets a `FileId` derived from its source path. The id
//! is the key for in-flight deduplication and for per-file state in the
//! conversion snapshot, so it must stay stable for the lifetime of a session
//! even if the file's metadata changes while a conversion is running.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Unique identifier for a source file, derived from its path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(pub String);

impl FileId {
    /// Create a FileId by hashing the file's path
    ///
    /// Only the path participates in the hash. Modification time is left out
    /// on purpose: converting a file touches the directory, and the identity
    /// of an in-flight job must not drift under it.
    pub fn from_path(path: &Path) -> Self {
        let mut hasher = DefaultHasher::new();
        path.to_string_lossy().hash(&mut hasher);

        FileId(format!("{:016x}", hasher.finish()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
