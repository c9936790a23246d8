//! Registry of transfer sessions.
//!
//! The registry is an explicit context object owned by whatever initiates
//! transfers (the application state), so the engine stays testable in
//! isolation. It hands out monotonically increasing session ids, keeps the
//! session list most-recent-first, and tracks which sessions feed the
//! aggregate progress indicator.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::events::{EventBus, TransferEvent};
use super::session::TransferSession;
use super::types::{REFRESH_DELAY, SessionOptions, SessionStatus, TransferError};

pub struct TransferRegistry {
    next_id: AtomicU64,
    events: EventBus,
    inner: Mutex<RegistryState>,
}

struct RegistryState {
    /// Most-recent-first.
    sessions: Vec<Arc<TransferSession>>,
    /// Ids of the sessions shown by the aggregate progress indicator.
    active: Vec<u64>,
}

impl TransferRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            events: EventBus::new(),
            inner: Mutex::new(RegistryState {
                sessions: Vec::new(),
                active: Vec::new(),
            }),
        }
    }

    /// Registers a callback for every engine event.
    pub fn subscribe(&self, f: impl Fn(&TransferEvent) + Send + Sync + 'static) {
        self.events.subscribe(f);
    }

    /// Creates and prepares a session for the given options.
    ///
    /// The destination must be an existing directory, otherwise no session
    /// is created and `NoDestination` is returned. The returned session is
    /// queued; the caller still drives it with [`TransferSession::start`].
    pub async fn add_session(
        &self,
        options: SessionOptions,
    ) -> Result<Arc<TransferSession>, TransferError> {
        let dest = Arc::clone(&options.dest);
        let dest_path = options.dest_path.clone();
        let is_dir = tokio::task::spawn_blocking(move || dest.is_dir(&dest_path)).await;
        if !matches!(is_dir, Ok(Ok(true))) {
            log::warn!(
                "add_session: destination {} is not a directory",
                options.dest_path
            );
            return Err(TransferError::NoDestination {
                path: options.dest_path,
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let SessionOptions {
            files,
            source,
            source_path,
            dest,
            dest_path,
            dest_name,
        } = options;
        let session = Arc::new(TransferSession::new(
            id,
            source,
            source_path,
            dest,
            dest_path,
            dest_name,
            self.events.clone(),
        ));
        self.inner
            .lock()
            .unwrap()
            .sessions
            .insert(0, Arc::clone(&session));

        if let Err(e) = session.prepare(files).await {
            // the session never got usable; drop it again
            self.inner.lock().unwrap().sessions.retain(|s| s.id() != id);
            return Err(e);
        }

        {
            let mut st = self.inner.lock().unwrap();
            // Takeover: a single visible session hands its progress slot to
            // the newcomer; with several running, the newcomer joins them.
            if st.active.len() == 1 {
                st.active.clear();
            }
            st.active.push(id);
        }
        Ok(session)
    }

    /// Cancels the session and forgets it.
    pub fn remove_session(&self, id: u64) {
        let found = self
            .inner
            .lock()
            .unwrap()
            .sessions
            .iter()
            .find(|s| s.id() == id)
            .cloned();
        if let Some(session) = found {
            session.cancel();
            let mut st = self.inner.lock().unwrap();
            st.sessions.retain(|s| s.id() != id);
            st.active.retain(|a| *a != id);
        }
    }

    /// Snapshot of all sessions, most-recent-first.
    pub fn sessions(&self) -> Vec<Arc<TransferSession>> {
        self.inner.lock().unwrap().sessions.clone()
    }

    pub fn session(&self, id: u64) -> Option<Arc<TransferSession>> {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .iter()
            .find(|s| s.id() == id)
            .cloned()
    }

    /// Combined progress of the active sessions, as a 0..=1 fraction.
    pub fn total_transfer_progress(&self) -> f64 {
        let st = self.inner.lock().unwrap();
        let mut total = 0u64;
        let mut transferred = 0u64;
        for session in st.sessions.iter().filter(|s| st.active.contains(&s.id())) {
            total += session.size();
            transferred += session.progress();
        }
        if total == 0 {
            0.0
        } else {
            transferred as f64 / total as f64
        }
    }

    /// Sessions worth showing a progress indicator for: started, moving
    /// bytes, and running longer than the refresh delay — near-instant
    /// transfers never flash the UI.
    pub fn pending_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .iter()
            .filter(|s| {
                s.status() == SessionStatus::Started
                    && s.progress() > 0
                    && s.elapsed().is_some_and(|e| e > REFRESH_DELAY)
            })
            .count()
    }

    /// Ids of the sessions feeding the aggregate indicator.
    pub fn active_session_ids(&self) -> Vec<u64> {
        self.inner.lock().unwrap().active.clone()
    }
}

impl Default for TransferRegistry {
    fn default() -> Self {
        Self::new()
    }
}
