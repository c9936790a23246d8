//! Streaming file transfer engine for multi-backend file managers.
//!
//! The engine copies file trees between two filesystem backends (local disk,
//! in-memory virtual FS, archives, remote mounts) that implement the
//! [`fs::Backend`] adapter trait. A [`transfer::TransferRegistry`] owns the
//! active [`transfer::TransferSession`]s; each session expands its sources
//! into a flat unit list, then streams units with bounded parallelism,
//! per-unit failure containment, collision renaming, and cooperative
//! cancellation.
//!
//! The engine itself is an inert state machine: observation happens through
//! the subscriber bus in [`transfer::events`], which the UI layer attaches
//! to. No UI concern lives in this crate.

pub mod fs;
pub mod transfer;

pub use fs::{Backend, BackendError, Descriptor, ReadStream};
pub use transfer::{
    SessionOptions, SessionStatus, TransferError, TransferFailure, TransferRegistry,
    TransferSession, TransferUnit, UnitStatus,
};
