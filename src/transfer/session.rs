//! Transfer session aggregate.
//!
//! One session is one copy operation: a root-level file list on a source
//! backend going into a single destination directory. The session owns the
//! unit list, the byte accounting, the status lifecycle, and the set of
//! open source streams; the scheduler drives the units through it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use super::builder;
use super::events::{EventBus, TransferEvent};
use super::scheduler;
use super::types::{
    MAX_CONCURRENT_TRANSFERS, PROGRESS_INTERVAL, SessionStatus, TransferError, TransferFailure,
    TransferUnit, UnitStatus,
};
use crate::fs::{Backend, Descriptor};

/// One copy operation between two backends.
pub struct TransferSession {
    pub(super) id: u64,
    pub(super) source: Arc<dyn Backend>,
    pub(super) dest: Arc<dyn Backend>,
    pub(super) source_path: String,
    pub(super) dest_path: String,
    dest_name: String,
    pub(super) events: EventBus,
    pub(super) state: Mutex<SessionState>,
}

/// Mutable session state, always behind the session mutex.
pub(super) struct SessionState {
    pub status: SessionStatus,
    pub units: Vec<TransferUnit>,
    pub total_size: u64,
    pub transferred: u64,
    pub error_count: usize,
    /// Free entries of the concurrent-transfer budget.
    pub slots: usize,
    pub started_at: Option<Instant>,
    /// Abort flags of currently open source streams, by unit index.
    pub open_streams: HashMap<usize, Arc<AtomicBool>>,
    pub last_progress_emit: Option<Instant>,
}

impl TransferSession {
    #[allow(clippy::too_many_arguments, reason = "Constructor mirrors the session options")]
    pub(super) fn new(
        id: u64,
        source: Arc<dyn Backend>,
        source_path: String,
        dest: Arc<dyn Backend>,
        dest_path: String,
        dest_name: String,
        events: EventBus,
    ) -> Self {
        Self {
            id,
            source,
            dest,
            source_path,
            dest_path,
            dest_name,
            events,
            state: Mutex::new(SessionState {
                status: SessionStatus::Calculating,
                units: Vec::new(),
                total_size: 0,
                transferred: 0,
                error_count: 0,
                slots: MAX_CONCURRENT_TRANSFERS,
                started_at: None,
                open_streams: HashMap::new(),
                last_progress_emit: None,
            }),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Expands the top-level descriptors into the unit list and totals sizes.
    ///
    /// Partial failures (an unreadable subtree) are recorded on the affected
    /// units and never fail the call; only a dead build task does.
    pub async fn prepare(self: &Arc<Self>, descriptors: Vec<Descriptor>) -> Result<(), TransferError> {
        self.set_status(SessionStatus::Calculating);

        let this = Arc::clone(self);
        let units = tokio::task::spawn_blocking(move || {
            builder::build_unit_list(this.source.as_ref(), &this.source_path, descriptors)
        })
        .await
        .map_err(|e| TransferError::Io {
            path: String::new(),
            message: format!("unit list build failed: {}", e),
        })?;

        let queued = {
            let mut guard = self.state.lock().unwrap();
            let st = &mut *guard;
            st.total_size = units
                .iter()
                .filter(|u| !u.descriptor.is_dir)
                .map(|u| u.descriptor.length)
                .sum();
            st.error_count = units.iter().filter(|u| u.status == UnitStatus::Error).count();
            st.units = units;
            // a cancel may have raced in while the builder ran
            if st.status == SessionStatus::Calculating {
                st.status = SessionStatus::Queued;
                true
            } else {
                false
            }
        };
        log::debug!(
            "transfer {}: prepared, {} units, {} bytes",
            self.id,
            self.elements().len(),
            self.size()
        );
        if queued {
            self.events.emit(TransferEvent::StatusChanged {
                session_id: self.id,
                status: SessionStatus::Queued,
            });
        }
        Ok(())
    }

    /// Runs the session to completion.
    ///
    /// Resolves once every unit is terminal: `Ok(())` when nothing failed,
    /// otherwise the aggregate [`TransferFailure`] verdict. Calling it on a
    /// session that is not queued is a no-op.
    pub async fn start(self: &Arc<Self>) -> Result<(), TransferFailure> {
        {
            let mut st = self.state.lock().unwrap();
            if st.status != SessionStatus::Queued {
                return Ok(());
            }
            st.slots = MAX_CONCURRENT_TRANSFERS;
            st.status = SessionStatus::Started;
            st.started_at = Some(Instant::now());
        }
        log::info!(
            "transfer {}: started, {} -> {}",
            self.id,
            self.source.name(),
            self.dest.name()
        );
        self.events.emit(TransferEvent::StatusChanged {
            session_id: self.id,
            status: SessionStatus::Started,
        });

        // Each finished unit pings back so a freed slot is refilled.
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<()>();
        scheduler::queue_next_transfers(self, &done_tx);
        loop {
            if self.all_units_terminal() {
                break;
            }
            if done_rx.recv().await.is_none() {
                break;
            }
            scheduler::queue_next_transfers(self, &done_tx);
        }

        let (files, errors, status, status_changed) = {
            let mut st = self.state.lock().unwrap();
            let files = st.units.len();
            let errors = st.error_count;
            let changed = if st.status.is_terminal() {
                false
            } else {
                st.status = if errors > 0 {
                    SessionStatus::Error
                } else {
                    SessionStatus::Done
                };
                true
            };
            (files, errors, st.status, changed)
        };
        log::info!(
            "transfer {}: finished with status {:?}, {} units, {} errors",
            self.id,
            status,
            files,
            errors
        );
        if status_changed {
            self.events.emit(TransferEvent::StatusChanged {
                session_id: self.id,
                status,
            });
        }
        self.events.emit(TransferEvent::Completed {
            session_id: self.id,
            files,
            errors,
        });

        if errors > 0 {
            Err(TransferFailure { files, errors })
        } else {
            Ok(())
        }
    }

    /// Cancels the session: queued units are marked cancelled and every open
    /// source stream is destroyed. In-flight writes observe the destroyed
    /// stream and clean up their partial destination file. No-op once done.
    pub fn cancel(&self) {
        {
            let mut guard = self.state.lock().unwrap();
            let st = &mut *guard;
            if st.status == SessionStatus::Done {
                return;
            }
            st.status = SessionStatus::Cancelled;
            for unit in st.units.iter_mut() {
                if unit.status == UnitStatus::Queued {
                    unit.status = UnitStatus::Cancelled;
                    st.error_count += 1;
                }
            }
            for abort in st.open_streams.values() {
                abort.store(true, Ordering::Relaxed);
            }
        }
        log::info!("transfer {}: cancelled", self.id);
        self.events.emit(TransferEvent::StatusChanged {
            session_id: self.id,
            status: SessionStatus::Cancelled,
        });
    }

    // ========================================================================
    // Observable snapshots
    // ========================================================================

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.state.lock().unwrap().status
    }

    /// Bytes transferred so far.
    pub fn progress(&self) -> u64 {
        self.state.lock().unwrap().transferred
    }

    /// Total bytes this session will move (directories contribute 0).
    pub fn size(&self) -> u64 {
        self.state.lock().unwrap().total_size
    }

    pub fn error_count(&self) -> usize {
        self.state.lock().unwrap().error_count
    }

    /// Per-unit detail for list views.
    pub fn elements(&self) -> Vec<TransferUnit> {
        self.state.lock().unwrap().units.clone()
    }

    /// Time since the session entered `Started`, if it has.
    pub fn elapsed(&self) -> Option<Duration> {
        self.state.lock().unwrap().started_at.map(|t| t.elapsed())
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn dest_path(&self) -> &str {
        &self.dest_path
    }

    pub fn dest_name(&self) -> &str {
        &self.dest_name
    }

    // ========================================================================
    // Scheduler support
    // ========================================================================

    pub(super) fn all_units_terminal(&self) -> bool {
        self.state
            .lock()
            .unwrap()
            .units
            .iter()
            .all(|u| u.status.is_terminal())
    }

    /// Folds a cumulative per-unit byte count into the session totals and
    /// emits a throttled progress event.
    pub(super) fn record_progress(&self, idx: usize, cumulative: u64) {
        let emit = {
            let mut guard = self.state.lock().unwrap();
            let st = &mut *guard;
            let unit = &mut st.units[idx];
            let delta = cumulative.saturating_sub(unit.progress);
            unit.progress = unit.progress.max(cumulative);
            st.transferred += delta;
            let now = Instant::now();
            let due = st
                .last_progress_emit
                .is_none_or(|last| now.duration_since(last) >= PROGRESS_INTERVAL);
            if due {
                st.last_progress_emit = Some(now);
                Some((st.transferred, st.total_size))
            } else {
                None
            }
        };
        if let Some((transferred, total)) = emit {
            self.events.emit(TransferEvent::Progress {
                session_id: self.id,
                transferred,
                total,
            });
        }
    }

    fn set_status(&self, status: SessionStatus) {
        {
            let mut st = self.state.lock().unwrap();
            if st.status.is_terminal() {
                return;
            }
            st.status = status;
        }
        self.events.emit(TransferEvent::StatusChanged {
            session_id: self.id,
            status,
        });
    }
}
