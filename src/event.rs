//! Structured lock events.
//!
//! The protocol never performs I/O itself. Everything worth narrating is handed
//! to an [`EventSink`] as an [`Event`]; [`TracingSink`] forwards to `tracing`,
//! [`Recorder`] keeps the sequence so tests can assert on it.

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::rwlock::{ResourceId, Snapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A worker started acquiring both of its resources.
    LockingAllAttempt { worker: String },
    LockAcquired { worker: String, resource: ResourceId },
    /// A timed wait elapsed without a signal.
    PotentialDeadlock { worker: String, resource: ResourceId },
    /// What a reader saw while holding both read locks.
    Snapshot {
        worker: String,
        first: Snapshot,
        second: Snapshot,
    },
    OperationComplete { worker: String, operation: usize },
    WorkerDone { worker: String },
}

impl Event {
    pub fn worker(&self) -> &str {
        match self {
            Event::LockingAllAttempt { worker }
            | Event::LockAcquired { worker, .. }
            | Event::PotentialDeadlock { worker, .. }
            | Event::Snapshot { worker, .. }
            | Event::OperationComplete { worker, .. }
            | Event::WorkerDone { worker } => worker,
        }
    }
}

pub trait EventSink: Send + Sync {
    fn record(&self, event: Event);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: Event) {}
}

/// Narrates events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: Event) {
        match event {
            Event::LockingAllAttempt { worker } => debug!(%worker, "locking all"),
            Event::LockAcquired { worker, resource } => {
                debug!(%worker, %resource, "acquired")
            }
            Event::PotentialDeadlock { worker, resource } => {
                warn!(%worker, %resource, "potential deadlock")
            }
            Event::Snapshot {
                worker,
                first,
                second,
            } => info!(%worker, "({first}, {second})"),
            Event::OperationComplete { worker, operation } => {
                debug!(%worker, operation, "operation complete")
            }
            Event::WorkerDone { worker } => info!(%worker, "done"),
        }
    }
}

/// Keeps every event in arrival order.
#[derive(Debug, Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }

    /// Events emitted by a single worker, in order.
    pub fn of(&self, worker: &str) -> Vec<Event> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.worker() == worker)
            .cloned()
            .collect()
    }
}

impl EventSink for Recorder {
    fn record(&self, event: Event) {
        self.events.lock().push(event);
    }
}
