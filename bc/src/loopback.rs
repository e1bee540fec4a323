//! In-process stand-in for the indexer bulk endpoint

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use muxqueue::{BatchProcessor, CorrelationId, Item, ProcessError, Response};
use serde_json::{Map, json};
use tracing::debug;

/// Answers every item with a bulk-style `created` result
#[derive(Debug, Default)]
pub struct LoopbackIndexer {
    indexed: AtomicU64,
}

impl LoopbackIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Items answered so far
    pub fn indexed(&self) -> u64 {
        self.indexed.load(Ordering::Relaxed)
    }

    fn bulk_result(item: &Item) -> Response {
        let mut result = Map::new();
        result.insert("_index".to_string(), json!(item.destination));
        result.insert("_id".to_string(), json!(item.id.to_string()));
        result.insert("result".to_string(), json!("created"));
        result.insert("status".to_string(), json!(201));
        result
    }
}

#[async_trait]
impl BatchProcessor for LoopbackIndexer {
    async fn process(&self, batch: &[Item]) -> Result<HashMap<CorrelationId, Response>, ProcessError> {
        debug!(batch_len = batch.len(), "LoopbackIndexer::process: called");
        let responses: HashMap<CorrelationId, Response> =
            batch.iter().map(|item| (item.id, Self::bulk_result(item))).collect();
        self.indexed.fetch_add(responses.len() as u64, Ordering::Relaxed);
        Ok(responses)
    }
}
