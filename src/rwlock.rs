use core::{
    fmt,
    sync::atomic::{AtomicU64, Ordering as IdOrdering},
    time::Duration,
};

#[cfg(not(loom))]
use core::sync::atomic::{AtomicI64, Ordering};

#[cfg(loom)]
use loom::sync::atomic::{AtomicI64, Ordering};

use tracing::trace;

use crate::{
    backoff,
    config::Config,
    error::{Error, Result},
    interrupt,
    mutex::{Condvar, LockGuard, Mutex},
};

/// Reader count while a writer holds the lock.
pub const WRITE_LOCKED: isize = -1;

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of a [`ResourceLock`], unique and increasing in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(u64);

impl ResourceId {
    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, IdOrdering::Relaxed))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A shared payload bundled with its own reader-writer lock.
///
/// The reader count lives under an internal mutex and uses [`WRITE_LOCKED`] as the
/// writer sentinel. Contended acquisitions wait on a condition variable for a
/// random slice of `wait_time_unit`; if that wait elapses without a signal the
/// acquisition gives up and reports a potential deadlock by returning `None`.
///
/// The payload elements are updated one at a time. They stay equal to each other
/// only because writers are mutually exclusive with everyone else.
pub struct ResourceLock {
    id: ResourceId,
    readers: Mutex<isize>,
    read_phase: Condvar,
    write_phase: Condvar,
    payload: Box<[AtomicI64]>,
    wait_time_unit: Duration,
}

impl Default for ResourceLock {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ResourceLock {
    pub fn new(payload_len: usize, wait_time_unit: Duration) -> Self {
        Self {
            id: ResourceId::next(),
            readers: Mutex::new(0),
            read_phase: Condvar::new(),
            write_phase: Condvar::new(),
            payload: (0..payload_len).map(|_| AtomicI64::new(0)).collect(),
            wait_time_unit,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.payload_len, config.wait_time_unit)
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Current reader count: `0` unlocked, `k > 0` readers, [`WRITE_LOCKED`] writer.
    pub fn reader_count(&self) -> isize {
        *self.readers.lock()
    }

    /// Copy of the payload. Only meaningful while holding a lock or when quiescent.
    pub fn values(&self) -> Vec<i64> {
        self.payload
            .iter()
            .map(|v| v.load(Ordering::Relaxed))
            .collect()
    }

    /// Try to acquire a read lock.
    ///
    /// `Ok(None)` means a timed wait elapsed while a writer held the lock.
    pub fn try_read(&self) -> Result<Option<ReadGuard<'_>>> {
        Ok(self.try_read_lock()?.then(|| ReadGuard { lock: self }))
    }

    /// Try to acquire the write lock.
    ///
    /// `Ok(None)` means a timed wait elapsed while readers or a writer held the lock.
    pub fn try_write(&self) -> Result<Option<WriteGuard<'_>>> {
        Ok(self.try_write_lock()?.then(|| WriteGuard { lock: self }))
    }

    /// Diagnostic snapshot, see [`Snapshot`].
    pub fn describe(&self) -> Snapshot {
        let values = self.values();
        let same = values.windows(2).all(|w| w[0] == w[1]);
        let mean = if values.is_empty() {
            0
        } else {
            let sum: i128 = values.iter().map(|&v| i128::from(v)).sum();
            (sum / values.len() as i128) as i64
        };

        Snapshot {
            id: self.id,
            mean,
            same,
            readers: self.reader_count(),
        }
    }

    fn try_read_lock(&self) -> Result<bool> {
        let mut readers = self.readers.lock();
        while *readers == WRITE_LOCKED {
            if !self.timed_wait(&self.read_phase, &mut readers)? {
                return Ok(false);
            }
        }
        *readers += 1;
        Ok(true)
    }

    fn read_unlock(&self) {
        let mut readers = self.readers.lock();
        *readers -= 1;
        if *readers == 0 {
            self.write_phase.notify_one();
        }
    }

    fn try_write_lock(&self) -> Result<bool> {
        let mut readers = self.readers.lock();
        while *readers != 0 {
            if !self.timed_wait(&self.write_phase, &mut readers)? {
                return Ok(false);
            }
        }
        *readers = WRITE_LOCKED;
        Ok(true)
    }

    fn write_unlock(&self) {
        let mut readers = self.readers.lock();
        *readers = 0;
        self.read_phase.notify_all();
        self.write_phase.notify_one();
    }

    /// Wait on `phase` for a random slice of the wait unit.
    ///
    /// Returns `false` if the wait elapsed without a signal. Dropping the guard on
    /// the error path releases the mutex.
    fn timed_wait(&self, phase: &Condvar, readers: &mut LockGuard<'_, isize>) -> Result<bool> {
        if interrupt::take() {
            return Err(Error::Interrupted { resource: self.id });
        }

        let timeout = backoff::jitter(self.wait_time_unit);
        trace!(resource = %self.id, readers = **readers, ?timeout, "about to wait");
        let timed_out = phase.wait_for(readers, timeout);

        if interrupt::take() {
            return Err(Error::Interrupted { resource: self.id });
        }
        if timed_out {
            trace!(resource = %self.id, "wait elapsed without signal");
        }
        Ok(!timed_out)
    }
}

/// Point-in-time view of a resource.
///
/// Formats as `<id>: [<mean>, <same>, <readers>]`. `same` must always be `true`
/// when observed under a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub id: ResourceId,
    pub mean: i64,
    pub same: bool,
    pub readers: isize,
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: [{}, {}, {}]",
            self.id, self.mean, self.same, self.readers
        )
    }
}

pub struct ReadGuard<'a> {
    lock: &'a ResourceLock,
}

impl<'a> ReadGuard<'a> {
    /// unlock read lock
    pub fn unlock(self) {}

    pub fn resource(&self) -> &'a ResourceLock {
        self.lock
    }

    pub fn describe(&self) -> Snapshot {
        self.lock.describe()
    }
}

pub struct WriteGuard<'a> {
    lock: &'a ResourceLock,
}

impl<'a> WriteGuard<'a> {
    /// unlock write lock
    pub fn unlock(self) {}

    pub fn resource(&self) -> &'a ResourceLock {
        self.lock
    }

    pub fn describe(&self) -> Snapshot {
        self.lock.describe()
    }

    /// Increment every payload element by one.
    ///
    /// Each element is a plain load followed by a store. Two overlapping writers
    /// would lose updates; only the write lock keeps the counts exact.
    pub fn perform_write(&mut self) {
        for v in self.lock.payload.iter() {
            v.store(v.load(Ordering::Relaxed) + 1, Ordering::Relaxed);
        }
    }
}

/// release read lock
impl Drop for ReadGuard<'_> {
    #[inline(always)]
    fn drop(&mut self) {
        self.lock.read_unlock();
    }
}

/// release write lock
impl Drop for WriteGuard<'_> {
    #[inline(always)]
    fn drop(&mut self) {
        self.lock.write_unlock();
    }
}
