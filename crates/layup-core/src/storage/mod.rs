//! Key-value storage areas.
//!
//! A [`Storage`] models one browser-style storage area: string keys mapped to
//! string values, with synchronous access. The auth store reads two of them,
//! a persistent area (survives restarts) and a session area (scoped to one
//! tab or one CLI session).

use std::fmt;
use std::path::PathBuf;

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Which logical storage area a value lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageArea {
    /// Survives tab/browser close.
    Persistent,
    /// Scoped to one session.
    Session,
}

impl StorageArea {
    /// Browser API name, used in diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            StorageArea::Persistent => "localStorage",
            StorageArea::Session => "sessionStorage",
        }
    }
}

impl fmt::Display for StorageArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage quota exceeded writing '{key}' ({needed} bytes needed, quota {quota})")]
    QuotaExceeded {
        key: String,
        needed: usize,
        quota: usize,
    },
    #[error("storage access denied: {0}")]
    AccessDenied(String),
    #[error("storage I/O failed for {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("storage file {} is not a JSON object of strings", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One synchronous string-to-string storage area.
///
/// Implementations use interior mutability: the same area is usually shared
/// between the auth store and whatever else the host keeps in it.
pub trait Storage: Send + Sync {
    /// Returns the value stored under `key`, if any.
    ///
    /// # Errors
    /// Returns an error if the area cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    /// Returns an error if the write is rejected (quota, access) or fails.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    /// Returns an error if the area cannot be modified.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}
