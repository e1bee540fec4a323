//! Dispatcher - mux side of the correlation layer

use std::sync::Arc;

use muxqueue::{CorrelationId, Item, MuxDemuxQueue, QueueError};
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::events::{AgentMetadata, DomainEvent};
use crate::payload::build_content;

/// Attempts at finding an id the queue does not already track
const MAX_ID_ATTEMPTS: usize = 3;

/// Shapes events into queue items and submits them
///
/// Cheap to clone; every clone submits to the same queue.
#[derive(Clone)]
pub struct Dispatcher {
    queue: Arc<dyn MuxDemuxQueue>,
}

impl Dispatcher {
    pub fn new(queue: Arc<dyn MuxDemuxQueue>) -> Self {
        Self { queue }
    }

    /// Shape and enqueue an event, returning the id to wait on
    ///
    /// Never waits for delivery. Malformed input is rejected before anything
    /// is enqueued; queue failures propagate as they happen.
    pub fn submit(&self, agent: &AgentMetadata, event: &DomainEvent) -> Result<CorrelationId, ClientError> {
        debug!(agent_id = %agent.id, module = %event.module(), "Dispatcher::submit: called");
        let content = build_content(agent, event)?;
        let destination = event.index_name();

        let mut attempt = 1;
        loop {
            let id = CorrelationId::generate();
            match self.queue.enqueue_outgoing(Item::new(id, content.clone(), destination)) {
                Ok(()) => {
                    debug!(%id, %destination, "Dispatcher::submit: enqueued");
                    return Ok(id);
                }
                Err(QueueError::DuplicateIdentifier(dup)) if attempt < MAX_ID_ATTEMPTS => {
                    warn!(%dup, attempt, "Correlation id collided with an in-flight id, regenerating");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
