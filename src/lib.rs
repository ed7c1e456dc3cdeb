//! Two-resource reader-writer locking with timed waits and randomized backoff.
//!
//! Every [`ResourceLock`] carries its own reader-writer lock. A [`Worker`] locks two
//! of them with the two-phase [`MultiLockAcquirer`], in whatever order it was
//! configured with. Workers that disagree on that order can stall each other; the
//! stall surfaces as [`Event::PotentialDeadlock`] and is broken, eventually, by
//! random timing rather than by lock ordering.

pub mod backoff;
pub mod config;
pub mod error;
pub mod event;
pub mod interrupt;
pub mod multi;
pub mod mutex;
pub mod rwlock;
pub mod worker;

pub use config::Config;
pub use error::{Error, Result};
pub use event::{Event, EventSink, NullSink, Recorder, TracingSink};
pub use multi::{AcquireStats, MultiLockAcquirer};
pub use rwlock::{ReadGuard, ResourceId, ResourceLock, Snapshot, WriteGuard, WRITE_LOCKED};
pub use worker::{run, spawn, Role, Worker, WorkerHandle, WorkerReport};
