//! Copy orchestration across filesystem backends, with streaming progress.
//!
//! A transfer runs as a session: `prepare` expands the selected entries
//! into a flat unit list, `start` pumps the units through the bounded
//! scheduler, `cancel` aborts cooperatively. Sessions live in a
//! [`TransferRegistry`] owned by the host application.
//!
//! Behavior highlights:
//! - At most `MAX_CONCURRENT_TRANSFERS` units stream at a time per session
//! - A unit never starts before its parent directory exists at the destination
//! - Name collisions resolve to `_1`, `_2`, … suffixes; directory collisions
//!   with existing directories merge instead
//! - Failures stay contained to their unit (or subtree, for directories);
//!   the caller gets one aggregate verdict once every unit is terminal
//! - Excessive failures trip a circuit breaker that cancels the remaining
//!   queued units

mod builder;
mod naming;
mod registry;
mod scheduler;
mod session;
mod types;

pub mod events;

pub use registry::TransferRegistry;
pub use session::TransferSession;
pub use types::{
    MAX_CONCURRENT_TRANSFERS, MAX_TRANSFER_ERRORS, REFRESH_DELAY, SessionOptions, SessionStatus,
    TransferError, TransferFailure, TransferUnit, UnitStatus,
};
