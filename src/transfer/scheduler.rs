//! Bounded-parallelism transfer scheduler.
//!
//! Pumps a session's unit list to completion: at most
//! `MAX_CONCURRENT_TRANSFERS` units run at a time, each as an independent
//! blocking task. Unit selection is deterministic first-match-in-list-order
//! over units that are ready (parent directory resolved at the destination)
//! and still queued. Every finished unit frees its slot and signals the
//! session loop, which backfills.
//!
//! Failure containment:
//! - a directory that cannot be created cancels its whole subtree, siblings
//!   proceed;
//! - stream failures are recorded per unit and feed the
//!   `MAX_TRANSFER_ERRORS` circuit breaker, which cancels all remaining
//!   queued units once tripped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc::UnboundedSender;

use super::events::TransferEvent;
use super::naming::{self, DirOutcome};
use super::session::TransferSession;
use super::types::{
    MAX_CONCURRENT_TRANSFERS, MAX_TRANSFER_ERRORS, SessionStatus, TransferError, UnitStatus,
};
use crate::fs::{BackendError, Descriptor, ReadStream};

/// Fills free slots with the next eligible units, in list order.
pub(super) fn queue_next_transfers(session: &Arc<TransferSession>, done_tx: &UnboundedSender<()>) {
    let mut to_start = Vec::new();
    {
        let mut guard = session.state.lock().unwrap();
        let st = &mut *guard;
        let budget = MAX_CONCURRENT_TRANSFERS.min(st.slots);
        for _ in 0..budget {
            let Some(idx) = st
                .units
                .iter()
                .position(|u| u.ready && u.status == UnitStatus::Queued)
            else {
                break;
            };
            st.units[idx].status = UnitStatus::Started;
            st.slots -= 1;
            to_start.push(idx);
        }
    }
    for idx in to_start {
        let session = Arc::clone(session);
        let done_tx = done_tx.clone();
        tokio::task::spawn_blocking(move || {
            start_transfer(&session, idx);
            let _ = done_tx.send(());
        });
    }
}

/// Runs one unit to a terminal state. Blocking.
fn start_transfer(session: &Arc<TransferSession>, idx: usize) {
    let (descriptor, sub_directory, renamed_parent) = {
        let st = session.state.lock().unwrap();
        let unit = &st.units[idx];
        (
            unit.descriptor.clone(),
            unit.sub_directory.clone(),
            unit.renamed_sub_directory.clone(),
        )
    };

    if descriptor.is_dir {
        transfer_directory(session, idx, &descriptor, &renamed_parent);
    } else if descriptor.is_symlink {
        transfer_symlink(session, idx, &descriptor, &renamed_parent);
    } else {
        transfer_file(session, idx, &descriptor, &sub_directory, &renamed_parent);
    }

    session.state.lock().unwrap().slots += 1;
}

// ============================================================================
// Directories
// ============================================================================

fn transfer_directory(
    session: &Arc<TransferSession>,
    idx: usize,
    descriptor: &Descriptor,
    renamed_parent: &str,
) {
    let dest = session.dest.as_ref();
    let parent_path = dest.join(&[&session.dest_path, renamed_parent]);
    match naming::ensure_directory(dest, &parent_path, &descriptor.name) {
        Ok(outcome) => {
            let final_name = match outcome {
                DirOutcome::Created(name) => name,
                DirOutcome::Merged => descriptor.name.clone(),
            };
            finish_directory(session, idx, &final_name);
        }
        Err(error) => {
            log::warn!(
                "transfer {}: cannot create directory {} under {}: {}",
                session.id,
                descriptor.name,
                parent_path,
                error
            );
            fail_directory(session, idx, error);
        }
    }
}

/// Marks a directory unit done and wakes its subtree: direct children become
/// ready, and every descendant's destination path is rewritten under the
/// directory's final (possibly suffixed) name.
fn finish_directory(session: &Arc<TransferSession>, idx: usize, final_name: &str) {
    let mut guard = session.state.lock().unwrap();
    let st = &mut *guard;
    let dir_key = st.units[idx].source_key();
    let renamed_key = {
        let parent = &st.units[idx].renamed_sub_directory;
        if parent.is_empty() {
            final_name.to_string()
        } else {
            format!("{}/{}", parent, final_name)
        }
    };
    st.units[idx].status = UnitStatus::Done;
    let prefix = format!("{}/", dir_key);
    for unit in st.units.iter_mut() {
        if unit.sub_directory == dir_key {
            unit.ready = true;
            unit.renamed_sub_directory = renamed_key.clone();
        } else if let Some(rest) = unit.sub_directory.strip_prefix(&prefix) {
            unit.renamed_sub_directory = format!("{}/{}", renamed_key, rest);
        }
    }
}

/// Records the directory failure and cancels every unit inside the subtree —
/// without a parent directory they can never be transferred.
fn fail_directory(session: &Arc<TransferSession>, idx: usize, error: TransferError) {
    let name = {
        let mut guard = session.state.lock().unwrap();
        let st = &mut *guard;
        let dir_key = st.units[idx].source_key();
        st.units[idx].status = UnitStatus::Error;
        st.units[idx].error = Some(error.clone());
        st.error_count += 1;
        let prefix = format!("{}/", dir_key);
        for unit in st.units.iter_mut() {
            if (unit.sub_directory == dir_key || unit.sub_directory.starts_with(&prefix))
                && unit.status == UnitStatus::Queued
            {
                unit.status = UnitStatus::Cancelled;
                st.error_count += 1;
            }
        }
        st.units[idx].descriptor.name.clone()
    };
    session.events.emit(TransferEvent::UnitFailed {
        session_id: session.id,
        name,
        error,
    });
}

// ============================================================================
// Symlinks
// ============================================================================

fn transfer_symlink(
    session: &Arc<TransferSession>,
    idx: usize,
    descriptor: &Descriptor,
    renamed_parent: &str,
) {
    let dest = session.dest.as_ref();
    let dest_dir = dest.join(&[&session.dest_path, renamed_parent]);
    let result = (|| -> Result<(), TransferError> {
        let target = descriptor
            .link_target
            .clone()
            .ok_or_else(|| TransferError::Io {
                path: descriptor.name.clone(),
                message: "symlink without a target".to_string(),
            })?;
        let name = naming::next_free_name(dest, &dest_dir, &descriptor.name)?;
        let link_path = dest.join(&[&dest_dir, &name]);
        dest.make_symlink(&target, &link_path)
            .map_err(|e| TransferError::from(e).with_path(&link_path))
    })();
    match result {
        Ok(()) => finish_unit(session, idx),
        Err(error) => fail_unit(session, idx, error, false),
    }
}

// ============================================================================
// Regular files
// ============================================================================

fn transfer_file(
    session: &Arc<TransferSession>,
    idx: usize,
    descriptor: &Descriptor,
    sub_directory: &str,
    renamed_parent: &str,
) {
    let source = session.source.as_ref();
    let dest = session.dest.as_ref();
    let dest_dir = dest.join(&[&session.dest_path, renamed_parent]);

    let final_name = match naming::next_free_name(dest, &dest_dir, &descriptor.name) {
        Ok(name) => name,
        Err(error) => return fail_unit(session, idx, error, false),
    };
    let dest_file = dest.join(&[&dest_dir, &final_name]);
    let source_dir = source.join(&[&session.source_path, sub_directory]);

    let stream = match source.open_read_stream(&source_dir, &descriptor.name) {
        Ok(stream) => stream,
        Err(e) => {
            let path = source.join(&[&source_dir, &descriptor.name]);
            return fail_unit(session, idx, TransferError::from(e).with_path(&path), true);
        }
    };

    // Register the stream so cancel() can destroy it mid-flight.
    let abort = Arc::new(AtomicBool::new(false));
    {
        let mut st = session.state.lock().unwrap();
        if st.status == SessionStatus::Cancelled {
            abort.store(true, Ordering::Relaxed);
        }
        st.open_streams.insert(idx, Arc::clone(&abort));
    }

    let guarded = AbortableStream {
        inner: stream,
        abort: Arc::clone(&abort),
    };
    let mut on_progress = |cumulative: u64| session.record_progress(idx, cumulative);
    let result = dest.write_stream(&dest_file, Box::new(guarded), &mut on_progress);

    session.state.lock().unwrap().open_streams.remove(&idx);

    match result {
        Ok(_) => {
            // Backends report progress per chunk; make sure the final byte
            // count landed even for zero-chunk (empty) files.
            session.record_progress(idx, descriptor.length);
            finish_unit(session, idx);
        }
        Err(e) => {
            let error = if abort.load(Ordering::Relaxed) {
                TransferError::Cancelled {
                    message: "source stream destroyed".to_string(),
                }
            } else {
                TransferError::StreamFailed {
                    path: dest_file,
                    message: e.to_string(),
                }
            };
            // Cancellation-induced failures don't feed the circuit breaker.
            let tripwire = !abort.load(Ordering::Relaxed);
            fail_unit(session, idx, error, tripwire);
        }
    }
}

// ============================================================================
// Unit outcomes
// ============================================================================

fn finish_unit(session: &Arc<TransferSession>, idx: usize) {
    let mut st = session.state.lock().unwrap();
    st.units[idx].status = UnitStatus::Done;
}

/// Records a per-unit failure. When `tripwire` is set the failure counts
/// toward the circuit breaker: past `MAX_TRANSFER_ERRORS` the session goes
/// to error and all remaining queued units are cancelled, so mass-failure
/// scenarios (full or disconnected destination) stop queuing doomed work.
fn fail_unit(session: &Arc<TransferSession>, idx: usize, error: TransferError, tripwire: bool) {
    let (name, tripped) = {
        let mut guard = session.state.lock().unwrap();
        let st = &mut *guard;
        st.units[idx].status = UnitStatus::Error;
        st.units[idx].error = Some(error.clone());
        st.error_count += 1;
        let mut tripped = false;
        if tripwire && st.error_count > MAX_TRANSFER_ERRORS && st.status == SessionStatus::Started {
            st.status = SessionStatus::Error;
            for unit in st.units.iter_mut() {
                if unit.status == UnitStatus::Queued {
                    unit.status = UnitStatus::Cancelled;
                    st.error_count += 1;
                }
            }
            tripped = true;
        }
        (st.units[idx].descriptor.name.clone(), tripped)
    };
    session.events.emit(TransferEvent::UnitFailed {
        session_id: session.id,
        name,
        error,
    });
    if tripped {
        log::warn!(
            "transfer {}: error limit exceeded, cancelling remaining units",
            session.id
        );
        session.events.emit(TransferEvent::StatusChanged {
            session_id: session.id,
            status: SessionStatus::Error,
        });
    }
}

// ============================================================================
// Stream abort wrapper
// ============================================================================

/// Read stream that starts failing once its abort flag flips, so an
/// in-flight `write_stream` sees the error between chunks and cleans up.
struct AbortableStream {
    inner: Box<dyn ReadStream>,
    abort: Arc<AtomicBool>,
}

impl ReadStream for AbortableStream {
    fn next_chunk(&mut self) -> Option<Result<Vec<u8>, BackendError>> {
        if self.abort.load(Ordering::Relaxed) {
            return Some(Err(BackendError::Io("stream destroyed".to_string())));
        }
        self.inner.next_chunk()
    }

    fn total_size(&self) -> u64 {
        self.inner.total_size()
    }

    fn bytes_read(&self) -> u64 {
        self.inner.bytes_read()
    }
}
