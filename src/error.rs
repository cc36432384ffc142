use std::sync::Arc;
use thiserror::Error;

/// Errors related to FairQueue operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is empty")]
    Empty,
}

/// Errors related to Future publication and retrieval.
#[derive(Error, Debug, Clone)]
pub enum FutureError {
    #[error("future is already set")]
    AlreadySet,
    #[error("producer failed: {0}")]
    Producer(Arc<anyhow::Error>),
}

impl FutureError {
    /// The producer's original error, when this is a `Producer` wrapper.
    pub fn inner(&self) -> Option<&anyhow::Error> {
        match self {
            FutureError::Producer(inner) => Some(inner),
            _ => None,
        }
    }
}

/// Errors related to FairPool sizing and worker spawning.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("invalid thread count: {0} (must be at least 1)")]
    InvalidThreadCount(usize),
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Errors related to Actor continuation registration.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorError {
    #[error("actor already has a pending continuation")]
    AlreadySuspended,
}
