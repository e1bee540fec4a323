//! Items carried by the queue

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::id::CorrelationId;

/// Result payload recorded on the demux side
pub type Response = Map<String, Value>;

/// Unit handed to the mux side
///
/// Owned by the queue from `enqueue_outgoing` until the batching worker
/// takes it; the matching demux entry lives on under the same `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: CorrelationId,
    pub content: Map<String, Value>,
    /// Routing key, e.g. the target index name
    pub destination: String,
}

impl Item {
    pub fn new(id: CorrelationId, content: Map<String, Value>, destination: impl Into<String>) -> Self {
        Self {
            id,
            content,
            destination: destination.into(),
        }
    }

    /// Approximate serialized size, used for logging batch volume
    pub fn approximate_size(&self) -> usize {
        serde_json::to_vec(&self.content).map(|v| v.len()).unwrap_or(0) + self.destination.len()
    }
}
