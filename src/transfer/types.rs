//! Type definitions for transfer operations.
//!
//! Contains the unit/session status enums, per-unit records, the error
//! taxonomy, and the engine constants.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::fs::{Backend, BackendError, Descriptor};

// ============================================================================
// Engine constants
// ============================================================================

/// Transfers in flight per session.
pub const MAX_CONCURRENT_TRANSFERS: usize = 2;

/// Per-unit failures tolerated before the whole session trips to error.
pub const MAX_TRANSFER_ERRORS: usize = 5;

/// Sessions younger than this are not counted as pending, so near-instant
/// transfers never flash a progress indicator.
pub const REFRESH_DELAY: Duration = Duration::from_millis(600);

/// Minimum gap between progress events for one session.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

/// Attempts at finding a collision-free name before giving up on the unit.
pub const RENAME_PROBE_LIMIT: u32 = 1000;

// ============================================================================
// Statuses
// ============================================================================

/// Per-unit transfer status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Queued,
    Started,
    Done,
    Error,
    Cancelled,
}

impl UnitStatus {
    /// True once the unit can no longer change state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Cancelled)
    }
}

/// Session lifecycle status.
///
/// Transitions run `Calculating → Queued → Started → {Done | Error}`;
/// `Cancelled` is reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Calculating,
    Queued,
    Started,
    Done,
    Error,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Cancelled)
    }
}

// ============================================================================
// Transfer unit
// ============================================================================

/// One file, directory, or symlink being transferred.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferUnit {
    /// Source metadata.
    pub descriptor: Descriptor,
    pub status: UnitStatus,
    /// Bytes transferred so far (always 0 for directories).
    pub progress: u64,
    /// Path relative to the transfer root where this unit lives in the
    /// source tree ("" for root-level units).
    pub sub_directory: String,
    /// Same path as it will appear in the destination tree, after any
    /// ancestor directory was renamed to dodge a collision.
    pub renamed_sub_directory: String,
    /// Set once the parent directory exists at the destination. Units are
    /// not eligible to start until ready.
    pub ready: bool,
    /// Populated iff `status == Error`.
    pub error: Option<TransferError>,
}

impl TransferUnit {
    pub(super) fn new(descriptor: Descriptor, sub_directory: String) -> Self {
        let ready = sub_directory.is_empty();
        Self {
            descriptor,
            status: UnitStatus::Queued,
            progress: 0,
            renamed_sub_directory: sub_directory.clone(),
            sub_directory,
            ready,
            error: None,
        }
    }

    /// Source-tree path of this unit itself (sub directory + name).
    pub(super) fn source_key(&self) -> String {
        if self.sub_directory.is_empty() {
            self.descriptor.name.clone()
        } else {
            format!("{}/{}", self.sub_directory, self.descriptor.name)
        }
    }
}

// ============================================================================
// Error taxonomy
// ============================================================================

/// Errors recorded on units or surfaced when creating a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransferError {
    /// Destination path is not a directory at session-add time.
    NoDestination { path: String },
    /// Source path vanished or a subtree could not be listed.
    NotFound { path: String },
    /// Permission denied
    PermissionDenied { path: String, message: String },
    /// Destination name collision that renaming could not resolve.
    NameExhausted { path: String },
    /// The streamed copy failed mid-flight.
    StreamFailed { path: String, message: String },
    /// The unit was aborted by session cancellation.
    Cancelled { message: String },
    /// Generic I/O error
    Io { path: String, message: String },
}

impl TransferError {
    /// Returns a user-friendly error message for the failure toast/detail UI.
    pub fn user_message(&self) -> String {
        match self {
            Self::NoDestination { path } => {
                format!("\"{}\" is not a folder, so nothing can be copied there.", path)
            }
            Self::NotFound { path } => {
                format!("Cannot find \"{}\". It may have been moved or deleted.", path)
            }
            Self::PermissionDenied { path, .. } => {
                format!("Cannot access \"{}\": permission denied.", path)
            }
            Self::NameExhausted { path } => {
                format!("Could not find a free name for \"{}\" at the destination.", path)
            }
            Self::StreamFailed { path, message } => {
                format!("Copying \"{}\" failed: {}", path, message)
            }
            Self::Cancelled { .. } => "Transfer was cancelled.".to_string(),
            Self::Io { path, message } => {
                if path.is_empty() {
                    format!("An error occurred: {}", message)
                } else {
                    format!("Error with \"{}\": {}", path, message)
                }
            }
        }
    }

    /// Attaches a path to errors that arrived without one.
    pub(super) fn with_path(self, path: &str) -> Self {
        match self {
            Self::PermissionDenied { message, path: p } if p.is_empty() => Self::PermissionDenied {
                path: path.to_string(),
                message,
            },
            Self::Io { message, path: p } if p.is_empty() => Self::Io {
                path: path.to_string(),
                message,
            },
            other => other,
        }
    }
}

impl std::fmt::Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.user_message())
    }
}

impl std::error::Error for TransferError {}

impl From<BackendError> for TransferError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::NotFound(path) => Self::NotFound { path },
            BackendError::PermissionDenied(message) => Self::PermissionDenied {
                path: String::new(),
                message,
            },
            BackendError::AlreadyExists(path) => Self::Io {
                path,
                message: "Already exists".to_string(),
            },
            BackendError::NotSupported => Self::Io {
                path: String::new(),
                message: "Operation not supported by this backend".to_string(),
            },
            BackendError::Io(message) => Self::Io {
                path: String::new(),
                message,
            },
        }
    }
}

// ============================================================================
// Aggregate verdict
// ============================================================================

/// The one pass/fail verdict a caller gets once every unit is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransferFailure {
    /// Total number of units in the session.
    pub files: usize,
    /// Units that ended in error or were cancelled by an error cascade.
    pub errors: usize,
}

impl std::fmt::Display for TransferFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} of {} units failed", self.errors, self.files)
    }
}

impl std::error::Error for TransferFailure {}

// ============================================================================
// Session options
// ============================================================================

/// Inputs for [`super::TransferRegistry::add_session`].
pub struct SessionOptions {
    /// Top-level entries to transfer, as listed in the source directory.
    pub files: Vec<Descriptor>,
    pub source: Arc<dyn Backend>,
    /// Directory on the source backend the entries live in.
    pub source_path: String,
    pub dest: Arc<dyn Backend>,
    /// Existing directory on the destination backend to copy into.
    pub dest_path: String,
    /// Destination display name, carried for the UI ("Local", "Zip: a.zip").
    pub dest_name: String,
}
