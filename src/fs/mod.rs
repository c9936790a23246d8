//! Backend trait for abstracting file system access.
//!
//! This module provides the [`Backend`] trait which abstracts the filesystem
//! operations the transfer engine consumes, enabling different storage
//! backends (local disk, in-memory virtual FS, archive readers, remote
//! mounts). Paths crossing the trait are "/"-separated strings relative to
//! the backend root; [`Backend::join`] owns the joining semantics so that
//! backends with unusual path rules stay in control.

use serde::{Deserialize, Serialize};

/// Metadata for a single file, directory, or symlink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    /// Entry name (no path component).
    pub name: String,
    /// True for directories.
    pub is_dir: bool,
    /// True for symbolic links.
    pub is_symlink: bool,
    /// File length in bytes (0 for directories).
    pub length: u64,
    /// Link target, present iff `is_symlink`.
    pub link_target: Option<String>,
    /// Unix permission bits (0 where the backend has no notion of mode).
    pub mode: u32,
}

impl Descriptor {
    pub fn file(name: impl Into<String>, length: u64) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
            is_symlink: false,
            length,
            link_target: None,
            mode: 0o644,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
            is_symlink: false,
            length: 0,
            link_target: None,
            mode: 0o755,
        }
    }

    pub fn symlink(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
            is_symlink: true,
            length: 0,
            link_target: Some(target.into()),
            mode: 0o777,
        }
    }
}

/// Error type for backend operations.
#[derive(Debug, Clone)]
pub enum BackendError {
    /// Path not found
    NotFound(String),
    /// Permission denied
    PermissionDenied(String),
    /// Path already exists
    AlreadyExists(String),
    /// Operation not supported by this backend
    NotSupported,
    /// Generic I/O error
    Io(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "Path not found: {}", path),
            Self::PermissionDenied(path) => write!(f, "Permission denied: {}", path),
            Self::AlreadyExists(path) => write!(f, "Already exists: {}", path),
            Self::NotSupported => write!(f, "Operation not supported"),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(err.to_string()),
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists(err.to_string()),
            _ => Self::Io(err.to_string()),
        }
    }
}

/// A stream of bytes read from a backend.
///
/// This is a synchronous, blocking iterator-style interface for reading
/// file data in chunks. Used for streaming transfers between backends.
pub trait ReadStream: Send {
    /// Returns the next chunk of data, or None if complete.
    fn next_chunk(&mut self) -> Option<Result<Vec<u8>, BackendError>>;

    /// Total size of the file in bytes.
    fn total_size(&self) -> u64;

    /// Bytes read so far (for progress tracking).
    fn bytes_read(&self) -> u64;
}

/// Trait for filesystem backends the transfer engine moves bytes between.
///
/// Implementations provide access to different storage kinds:
/// - [`LocalFs`]: real local file system
/// - [`MemoryFs`]: in-memory virtual file system (also the test double)
///
/// All path parameters are relative to the backend root. The backend handles
/// translating them to actual storage locations.
pub trait Backend: Send + Sync {
    /// Returns the display name for this backend (e.g., "Local", "Zip: a.zip").
    fn name(&self) -> &str;

    /// True iff the path exists and is a directory.
    fn is_dir(&self, path: &str) -> Result<bool, BackendError>;

    /// Gets metadata for a single path. Fails if the path does not exist.
    fn stat(&self, path: &str) -> Result<Descriptor, BackendError>;

    /// Existence probe. Never fails for "not found" — that resolves false.
    fn exists(&self, path: &str) -> bool;

    /// Creates one directory level under `parent`, returning the created
    /// path. Fails on collision (EEXIST) or access problems.
    fn make_dir(&self, parent: &str, name: &str) -> Result<String, BackendError>;

    /// Creates a symlink at `link_path` pointing to `target`.
    fn make_symlink(&self, target: &str, link_path: &str) -> Result<(), BackendError>;

    /// Non-recursive directory listing.
    fn list(&self, path: &str) -> Result<Vec<Descriptor>, BackendError>;

    /// Sets the working context to `path` and returns the resolved path.
    ///
    /// Stateful backends (FTP-style) need this before `list`; for local and
    /// in-memory backends it only validates that the directory exists.
    fn cd(&self, path: &str) -> Result<String, BackendError>;

    /// Opens a streaming reader for `name` inside directory `dir`.
    fn open_read_stream(&self, dir: &str, name: &str) -> Result<Box<dyn ReadStream>, BackendError>;

    /// Consumes `stream` into a new file at `dest`.
    ///
    /// Invokes `on_progress` with the cumulative byte count as chunks land.
    /// On failure no partial file may remain at `dest`. Returns the number
    /// of bytes written.
    fn write_stream(
        &self,
        dest: &str,
        stream: Box<dyn ReadStream>,
        on_progress: &mut dyn FnMut(u64),
    ) -> Result<u64, BackendError>;

    /// Joins path parts per this backend's path semantics.
    fn join(&self, parts: &[&str]) -> String;
}

// Implementations
mod local;
mod memory;

pub use local::LocalFs;
pub use memory::MemoryFs;

#[cfg(test)]
mod local_test;
#[cfg(test)]
mod memory_test;
