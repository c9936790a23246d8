//! State-change notifications for the UI layer.
//!
//! The engine core mutates inert state; everything observable leaves through
//! this bus as serializable payloads. Subscribers run on whichever thread
//! produced the event, so they must stay cheap — the host app forwards the
//! payload to its own channel.

use serde::Serialize;
use std::sync::{Arc, RwLock};

use super::types::{SessionStatus, TransferError};

/// Everything the engine reports while sessions run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TransferEvent {
    /// A session moved along its lifecycle.
    #[serde(rename_all = "camelCase")]
    StatusChanged {
        session_id: u64,
        status: SessionStatus,
    },
    /// Byte-level progress, throttled to `PROGRESS_INTERVAL`.
    #[serde(rename_all = "camelCase")]
    Progress {
        session_id: u64,
        transferred: u64,
        total: u64,
    },
    /// One unit recorded an error; the session keeps going.
    #[serde(rename_all = "camelCase")]
    UnitFailed {
        session_id: u64,
        name: String,
        error: TransferError,
    },
    /// Every unit is terminal; the session verdict is in.
    #[serde(rename_all = "camelCase")]
    Completed {
        session_id: u64,
        files: usize,
        errors: usize,
    },
}

type Subscriber = Box<dyn Fn(&TransferEvent) + Send + Sync>;

/// Fan-out registry of event subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback invoked for every engine event.
    pub fn subscribe(&self, f: impl Fn(&TransferEvent) + Send + Sync + 'static) {
        if let Ok(mut subscribers) = self.subscribers.write() {
            subscribers.push(Box::new(f));
        }
    }

    pub(super) fn emit(&self, event: TransferEvent) {
        if let Ok(subscribers) = self.subscribers.read() {
            for subscriber in subscribers.iter() {
                subscriber(&event);
            }
        }
    }
}
