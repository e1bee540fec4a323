//! Waiter - demux side of the correlation layer
//!
//! Polls the queue for one correlation id at a fixed cadence, sleeping
//! between polls so other tasks keep running, and consumes the result once.

use std::sync::Arc;
use std::time::Duration;

use muxqueue::{CorrelationId, MuxDemuxQueue, Response};
use tracing::{debug, warn};

use crate::error::ClientError;

/// Default polling cadence
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Releases an id's queue bookkeeping unless the wait ran to completion
///
/// Covers every way a wait can be abandoned: deadline, `select!`, task abort.
struct Interest<'a> {
    queue: &'a dyn MuxDemuxQueue,
    id: CorrelationId,
    armed: bool,
}

impl<'a> Interest<'a> {
    fn new(queue: &'a dyn MuxDemuxQueue, id: CorrelationId) -> Self {
        Self { queue, id, armed: true }
    }

    fn release(&mut self) {
        self.armed = false;
    }
}

impl Drop for Interest<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.queue.drop_interest(&self.id) {
            Ok(true) => debug!(id = %self.id, "Interest::drop: abandoned wait released its id"),
            Ok(false) => {}
            Err(e) => debug!(id = %self.id, error = %e, "Interest::drop: could not release id"),
        }
    }
}

/// Resolves correlation ids to results
#[derive(Clone)]
pub struct Waiter {
    queue: Arc<dyn MuxDemuxQueue>,
    poll_interval: Duration,
}

impl Waiter {
    pub fn new(queue: Arc<dyn MuxDemuxQueue>, poll_interval: Duration) -> Self {
        debug!(?poll_interval, "Waiter::new: called");
        Self { queue, poll_interval }
    }

    pub fn with_default_interval(queue: Arc<dyn MuxDemuxQueue>) -> Self {
        Self::new(queue, DEFAULT_POLL_INTERVAL)
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Wait until `id` resolves, then consume its result
    ///
    /// Has no deadline of its own. `Ok(None)` means the id resolved without a
    /// value. Queue failures surface at the poll that observes them.
    pub async fn await_result(&self, id: &CorrelationId) -> Result<Option<Response>, ClientError> {
        debug!(%id, "Waiter::await_result: called");
        let mut interest = Interest::new(self.queue.as_ref(), *id);
        let mut polls: u64 = 0;

        loop {
            polls += 1;
            if !self.queue.is_pending(id)? {
                let result = self.queue.consume_result(id)?;
                interest.release();
                debug!(%id, polls, has_value = result.is_some(), "Waiter::await_result: resolved");
                return Ok(result);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Like [`Waiter::await_result`] but gives up after `deadline`
    ///
    /// On timeout the id's bookkeeping is released and a late result is
    /// discarded by the queue.
    pub async fn await_result_within(
        &self,
        id: &CorrelationId,
        deadline: Duration,
    ) -> Result<Option<Response>, ClientError> {
        match tokio::time::timeout(deadline, self.await_result(id)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(%id, ?deadline, "Gave up waiting for result");
                Err(ClientError::Timeout { id: *id, after: deadline })
            }
        }
    }
}
