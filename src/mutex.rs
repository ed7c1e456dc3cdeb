//! # Mutex and Condvar Types
//!
//! The monitor primitive each [`ResourceLock`](crate::rwlock::ResourceLock) embeds.
//! Normal builds use `parking_lot::Mutex` and `parking_lot::Condvar`.
//! When built with `--cfg loom`, it falls back to `loom::sync` so the model checker
//! can explore the interleavings of the lock protocol.

use core::time::Duration;

#[cfg(loom)]
use core::ops::{Deref, DerefMut};

#[cfg(not(loom))]
type Lock<T> = parking_lot::Mutex<T>;

#[cfg(loom)]
type Lock<T> = loom::sync::Mutex<T>;

#[cfg(not(loom))]
type Cond = parking_lot::Condvar;

#[cfg(loom)]
type Cond = loom::sync::Condvar;

#[cfg(not(loom))]
pub type LockGuard<'a, T> = parking_lot::MutexGuard<'a, T>;

/// loom's condition variable consumes the guard, so it is parked in an `Option`
/// for the duration of a wait.
#[cfg(loom)]
pub struct LockGuard<'a, T> {
    inner: Option<loom::sync::MutexGuard<'a, T>>,
}

/// A mutual exclusion primitive protecting a small piece of lock state.
///
/// Critical sections under this mutex are expected to be O(1): check or update a
/// counter, then signal a [`Condvar`].
pub struct Mutex<T> {
    mutex: Lock<T>,
}

impl<T> Mutex<T> {
    #[cfg(not(loom))]
    pub const fn new(v: T) -> Self {
        Self {
            mutex: Lock::new(v),
        }
    }

    #[cfg(loom)]
    pub fn new(v: T) -> Self {
        Self {
            mutex: Lock::new(v),
        }
    }

    #[cfg(not(loom))]
    #[inline(always)]
    pub fn lock(&self) -> LockGuard<'_, T> {
        self.mutex.lock()
    }

    #[cfg(loom)]
    pub fn lock(&self) -> LockGuard<'_, T> {
        let inner = self
            .mutex
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        LockGuard { inner: Some(inner) }
    }
}

/// A condition variable bound to a [`Mutex`] by usage.
pub struct Condvar {
    cond: Cond,
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

impl Condvar {
    #[cfg(not(loom))]
    pub const fn new() -> Self {
        Self { cond: Cond::new() }
    }

    #[cfg(loom)]
    pub fn new() -> Self {
        Self { cond: Cond::new() }
    }

    /// Block until notified or until `timeout` elapses.
    ///
    /// Returns `true` if the wait timed out. A spurious wakeup reports `false`,
    /// so callers must re-check their predicate.
    #[cfg(not(loom))]
    #[inline(always)]
    pub fn wait_for<T>(&self, guard: &mut LockGuard<'_, T>, timeout: Duration) -> bool {
        self.cond.wait_for(guard, timeout).timed_out()
    }

    /// loom does not model time: a timed wait only returns once notified.
    #[cfg(loom)]
    pub fn wait_for<T>(&self, guard: &mut LockGuard<'_, T>, timeout: Duration) -> bool {
        let Some(inner) = guard.inner.take() else {
            return true;
        };
        let (inner, result) = self
            .cond
            .wait_timeout(inner, timeout)
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.inner = Some(inner);
        result.timed_out()
    }

    #[inline(always)]
    pub fn notify_one(&self) {
        self.cond.notify_one();
    }

    #[inline(always)]
    pub fn notify_all(&self) {
        self.cond.notify_all();
    }
}

#[cfg(loom)]
impl<T> Deref for LockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.inner.as_deref().expect("guard is only vacated during a wait")
    }
}

#[cfg(loom)]
impl<T> DerefMut for LockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.inner
            .as_deref_mut()
            .expect("guard is only vacated during a wait")
    }
}
