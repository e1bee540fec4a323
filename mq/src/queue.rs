//! Shared queue interface
//!
//! Dispatchers and waiters only ever talk to the queue through this trait.
//! They hold correlation ids, never references into the queue's bookkeeping.

use crate::error::QueueError;
use crate::id::CorrelationId;
use crate::item::{Item, Response};

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// A shared mux/demux queue
///
/// Implementations must support many concurrently in-flight ids from many
/// producers and waiters. Operations on distinct ids must not serialize
/// behind a single global lock.
pub trait MuxDemuxQueue: Send + Sync {
    /// Hand an item to the mux side and start tracking its id as pending
    ///
    /// Fails with `DuplicateIdentifier` if the id is already in flight.
    fn enqueue_outgoing(&self, item: Item) -> QueueResult<()>;

    /// True until a result or a permanent-absence marker is recorded
    ///
    /// Fails with `UnknownIdentifier` when the queue has no record of `id`.
    fn is_pending(&self, id: &CorrelationId) -> QueueResult<bool>;

    /// Take the recorded result and release every bit of bookkeeping for `id`
    ///
    /// `Ok(None)` means the id resolved with no value. A second call for the
    /// same id fails with `UnknownIdentifier`.
    fn consume_result(&self, id: &CorrelationId) -> QueueResult<Option<Response>>;

    /// Demux write side: record the outcome of a processed item
    fn record_result(&self, id: &CorrelationId, response: Option<Response>) -> QueueResult<()>;

    /// Forget `id` regardless of its state. Returns whether it was tracked.
    fn drop_interest(&self, id: &CorrelationId) -> QueueResult<bool>;
}
