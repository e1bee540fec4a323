//! Queue error types

use thiserror::Error;

use crate::id::CorrelationId;

/// Errors surfaced by a shared queue implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("Queue unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown correlation id: {0}")]
    UnknownIdentifier(CorrelationId),

    #[error("Correlation id already in flight: {0}")]
    DuplicateIdentifier(CorrelationId),

    #[error("Result for {0} is still pending")]
    StillPending(CorrelationId),

    #[error("Mux side full (capacity {capacity})")]
    Full { capacity: usize },
}

impl QueueError {
    /// True when the queue itself is broken or shut down
    pub fn is_unavailable(&self) -> bool {
        matches!(self, QueueError::Unavailable(_))
    }
}

/// Errors from a downstream batch processor
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Downstream rejected batch: {0}")]
    Rejected(String),

    #[error("Downstream unreachable: {0}")]
    Unreachable(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
