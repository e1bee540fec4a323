//! Batching worker
//!
//! Drains the mux side in batches, hands each batch to a downstream
//! processor, and records one outcome per item on the demux side.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::BatcherConfig;
use crate::error::{ProcessError, QueueError};
use crate::id::CorrelationId;
use crate::item::{Item, Response};
use crate::memory::MuxReceiver;
use crate::queue::MuxDemuxQueue;

/// Downstream consumer of item batches
///
/// Items missing from the returned map resolve as permanently absent.
#[async_trait]
pub trait BatchProcessor: Send + Sync {
    async fn process(&self, batch: &[Item]) -> Result<HashMap<CorrelationId, Response>, ProcessError>;
}

/// Counters for one worker run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatcherStats {
    pub batches: u64,
    pub items: u64,
    pub delivered: u64,
    pub absent: u64,
    pub failed_batches: u64,
    /// Results dropped because the waiter lost interest first
    pub orphaned: u64,
}

/// Worker moving items from the mux side through a processor to the demux side
pub struct Batcher {
    config: BatcherConfig,
}

impl Batcher {
    pub fn new(config: BatcherConfig) -> Self {
        debug!(?config, "Batcher::new: called");
        Self { config }
    }

    /// Run until the mux side is closed and drained
    pub async fn run(
        self,
        mut rx: MuxReceiver,
        queue: Arc<dyn MuxDemuxQueue>,
        processor: Arc<dyn BatchProcessor>,
    ) -> BatcherStats {
        let mut stats = BatcherStats::default();
        info!(
            max_elements = self.config.max_elements,
            max_time_ms = self.config.max_time_ms,
            "Batcher started"
        );

        loop {
            let batch = rx.recv_batch(self.config.max_elements, self.config.max_time()).await;
            if batch.is_empty() {
                break;
            }

            let bytes: usize = batch.iter().map(Item::approximate_size).sum();
            debug!(batch_len = batch.len(), bytes, "Batcher::run: processing batch");
            stats.batches += 1;
            stats.items += batch.len() as u64;

            let mut responses = match processor.process(&batch).await {
                Ok(responses) => responses,
                Err(e) => {
                    warn!(error = %e, batch_len = batch.len(), "Batch processing failed, resolving batch as absent");
                    stats.failed_batches += 1;
                    HashMap::new()
                }
            };

            for item in &batch {
                let response = responses.remove(&item.id);
                let delivered = response.is_some();

                match queue.record_result(&item.id, response) {
                    Ok(()) if delivered => stats.delivered += 1,
                    Ok(()) => stats.absent += 1,
                    Err(QueueError::UnknownIdentifier(id)) => {
                        debug!(%id, "Batcher::run: no one waiting for result, dropping");
                        stats.orphaned += 1;
                    }
                    Err(e) if e.is_unavailable() => {
                        warn!(error = %e, "Queue unavailable, batcher stopping");
                        return stats;
                    }
                    Err(e) => warn!(id = %item.id, error = %e, "Failed to record result"),
                }
            }
        }

        info!(batches = stats.batches, items = stats.items, "Batcher stopped");
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueConfig;
    use crate::memory::MemoryQueue;
    use serde_json::{Map, json};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Answers every item with its destination and remembers batch sizes
    #[derive(Default)]
    struct Recorder {
        sizes: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl BatchProcessor for Recorder {
        async fn process(&self, batch: &[Item]) -> Result<HashMap<CorrelationId, Response>, ProcessError> {
            self.sizes.lock().unwrap().push(batch.len());
            Ok(batch
                .iter()
                .map(|item| {
                    let mut response = Map::new();
                    response.insert("_index".to_string(), json!(item.destination));
                    (item.id, response)
                })
                .collect())
        }
    }

    struct Failing;

    #[async_trait]
    impl BatchProcessor for Failing {
        async fn process(&self, _batch: &[Item]) -> Result<HashMap<CorrelationId, Response>, ProcessError> {
            Err(ProcessError::Unreachable("connection refused".to_string()))
        }
    }

    fn item(destination: &str) -> Item {
        Item::new(CorrelationId::generate(), Map::new(), destination)
    }

    #[tokio::test]
    async fn test_batches_by_max_elements() {
        let (queue, rx) = MemoryQueue::new(QueueConfig::default());
        let queue = Arc::new(queue);
        let items: Vec<Item> = (0..5).map(|_| item("wazuh-states-fim")).collect();
        for item in &items {
            queue.enqueue_outgoing(item.clone()).unwrap();
        }
        queue.seal();

        let recorder = Arc::new(Recorder::default());
        let batcher = Batcher::new(BatcherConfig {
            max_elements: 2,
            max_time_ms: 1000,
        });
        let stats = batcher.run(rx, queue.clone(), recorder.clone()).await;

        assert_eq!(*recorder.sizes.lock().unwrap(), vec![2, 2, 1]);
        assert_eq!(stats.batches, 3);
        assert_eq!(stats.items, 5);
    }

    #[tokio::test]
    async fn test_results_land_on_demux_side() {
        let (queue, rx) = MemoryQueue::new(QueueConfig::default());
        let queue = Arc::new(queue);
        let worker = tokio::spawn(Batcher::new(BatcherConfig::default()).run(
            rx,
            queue.clone(),
            Arc::new(Recorder::default()),
        ));

        let item = item("wazuh-states-sca");
        queue.enqueue_outgoing(item.clone()).unwrap();

        while queue.is_pending(&item.id).unwrap() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let response = queue.consume_result(&item.id).unwrap().unwrap();
        assert_eq!(response["_index"], json!("wazuh-states-sca"));

        queue.close();
        let stats = worker.await.unwrap();
        assert_eq!(stats.delivered, 1);
    }

    #[tokio::test]
    async fn test_processor_failure_resolves_batch_as_absent() {
        let (queue, rx) = MemoryQueue::new(QueueConfig::default());
        let queue = Arc::new(queue);
        let a = item("wazuh-states-fim");
        let b = item("wazuh-states-fim");
        queue.enqueue_outgoing(a.clone()).unwrap();
        queue.enqueue_outgoing(b.clone()).unwrap();

        let worker = tokio::spawn(Batcher::new(BatcherConfig::default()).run(rx, queue.clone(), Arc::new(Failing)));

        while queue.is_pending(&a.id).unwrap() || queue.is_pending(&b.id).unwrap() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(queue.consume_result(&a.id).unwrap(), None);
        assert_eq!(queue.consume_result(&b.id).unwrap(), None);

        queue.close();
        let stats = worker.await.unwrap();
        assert_eq!(stats.failed_batches, 1);
        assert_eq!(stats.absent, 2);
    }

    #[tokio::test]
    async fn test_dropped_interest_counts_as_orphaned() {
        let (queue, rx) = MemoryQueue::new(QueueConfig::default());
        let queue = Arc::new(queue);
        let item = item("wazuh-states-fim");
        queue.enqueue_outgoing(item.clone()).unwrap();
        queue.drop_interest(&item.id).unwrap();
        queue.seal();

        let stats = Batcher::new(BatcherConfig::default())
            .run(rx, queue.clone(), Arc::new(Recorder::default()))
            .await;

        assert_eq!(stats.orphaned, 1);
        assert_eq!(stats.delivered, 0);
    }
}
