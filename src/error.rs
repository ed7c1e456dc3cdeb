//! Error types for rwhazard

use thiserror::Error;

use crate::rwlock::ResourceId;

/// Result type alias using the crate's [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

/// Fatal conditions.
///
/// An expired timed wait is not in here: it is the expected potential-deadlock
/// signal and is reported as `Ok(false)` / `Ok(None)` by the lock API.
#[derive(Error, Debug)]
pub enum Error {
    #[error("interrupted while waiting on resource {resource}")]
    Interrupted { resource: ResourceId },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("worker {0} panicked")]
    WorkerPanicked(String),
}
