//! Two-phase acquisition of a pair of [`ResourceLock`]s.
//!
//! The pair is locked in the order the caller gives, with no global ordering
//! across callers. If the second lock cannot be had, the first is released and the
//! caller backs off for a randomly growing delay before starting over. A failure on
//! the *first* lock is retried immediately, without any backoff.
//!
//! Two callers asking for the same pair in opposite orders can each hold one lock
//! and time out on the other. Nothing here prevents that; randomized timing is what
//! eventually lets one of them through.

use core::time::Duration;

use crate::{
    backoff::Backoff,
    error::Result,
    event::{Event, EventSink},
    rwlock::{ReadGuard, ResourceLock, WriteGuard},
};

/// Retry counters accumulated across calls.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AcquireStats {
    /// Failed attempts on the first lock. These never back off.
    pub first_failures: u64,
    /// Failed attempts on the second lock, each followed by a backoff.
    pub second_failures: u64,
}

pub struct MultiLockAcquirer<'a> {
    first: &'a ResourceLock,
    second: &'a ResourceLock,
    worker: &'a str,
    sink: &'a dyn EventSink,
    backoff_unit: Duration,
    stats: AcquireStats,
}

impl<'a> MultiLockAcquirer<'a> {
    /// `first` and `second` must be distinct resources; write-locking the same
    /// resource twice never succeeds.
    pub fn new(
        first: &'a ResourceLock,
        second: &'a ResourceLock,
        worker: &'a str,
        sink: &'a dyn EventSink,
        backoff_unit: Duration,
    ) -> Self {
        Self {
            first,
            second,
            worker,
            sink,
            backoff_unit,
            stats: AcquireStats::default(),
        }
    }

    pub fn stats(&self) -> AcquireStats {
        self.stats
    }

    /// Read-lock both resources. Returns the guards in acquisition order.
    pub fn read_lock_all(&mut self) -> Result<(ReadGuard<'a>, ReadGuard<'a>)> {
        self.lock_all(ResourceLock::try_read)
    }

    /// Write-lock both resources. Returns the guards in acquisition order.
    pub fn write_lock_all(&mut self) -> Result<(WriteGuard<'a>, WriteGuard<'a>)> {
        self.lock_all(ResourceLock::try_write)
    }

    fn lock_all<G>(
        &mut self,
        try_lock: impl Fn(&'a ResourceLock) -> Result<Option<G>>,
    ) -> Result<(G, G)> {
        self.emit(Event::LockingAllAttempt {
            worker: self.worker.to_owned(),
        });

        let mut backoff = Backoff::new(self.backoff_unit);
        loop {
            let Some(first) = try_lock(self.first)? else {
                self.stats.first_failures += 1;
                self.potential_deadlock(self.first);
                continue;
            };
            self.acquired(self.first);

            // an error here drops `first`, releasing it
            let Some(second) = try_lock(self.second)? else {
                self.stats.second_failures += 1;
                self.potential_deadlock(self.second);
                drop(first);
                backoff.snooze();
                continue;
            };
            self.acquired(self.second);

            return Ok((first, second));
        }
    }

    fn acquired(&self, lock: &ResourceLock) {
        self.emit(Event::LockAcquired {
            worker: self.worker.to_owned(),
            resource: lock.id(),
        });
    }

    fn potential_deadlock(&self, lock: &ResourceLock) {
        self.emit(Event::PotentialDeadlock {
            worker: self.worker.to_owned(),
            resource: lock.id(),
        });
    }

    fn emit(&self, event: Event) {
        self.sink.record(event);
    }
}
