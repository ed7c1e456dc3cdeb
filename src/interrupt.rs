//! Per-thread interruption.
//!
//! An [`Interrupt`] is a shareable flag. Installing it on a thread (see
//! [`InterruptGuard`]) makes every timed wait performed by that thread check the
//! flag before and after waiting. A set flag is consumed by the wait and turned
//! into [`Error::Interrupted`](crate::Error::Interrupted).

use std::{
    cell::RefCell,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

thread_local! {
    static CURRENT: RefCell<Option<Interrupt>> = const { RefCell::new(None) };
}

/// Handle used to interrupt the thread it is installed on.
#[derive(Clone, Default, Debug)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request interruption. Observed at the next timed wait of the owning thread.
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Install this handle on the current thread until the guard is dropped.
    pub fn install(&self) -> InterruptGuard {
        let previous = CURRENT.with(|current| current.replace(Some(self.clone())));
        InterruptGuard { previous }
    }
}

/// Keeps an [`Interrupt`] installed and automatically restores the previous one.
///
/// ```
/// use rwhazard::interrupt::Interrupt;
///
/// let interrupt = Interrupt::new();
/// {
///     let _guard = interrupt.install();
///     // timed waits on this thread observe `interrupt`.
/// }
/// // The previous handle (if any) is restored here.
/// ```
pub struct InterruptGuard {
    previous: Option<Interrupt>,
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|current| *current.borrow_mut() = previous);
    }
}

/// Consume a pending interruption of the current thread.
pub(crate) fn take() -> bool {
    CURRENT.with(|current| {
        current
            .borrow()
            .as_ref()
            .is_some_and(|interrupt| interrupt.flag.swap(false, Ordering::AcqRel))
    })
}
