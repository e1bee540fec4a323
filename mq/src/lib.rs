//! MuxQueue - shared mux/demux queue with correlation bookkeeping
//!
//! Producers hand [`Item`]s to the mux side; a [`Batcher`] drains them in
//! batches through a [`BatchProcessor`] and records one outcome per item on
//! the demux side; waiters poll by [`CorrelationId`] and consume the result
//! exactly once.
//!
//! # Architecture
//!
//! ```text
//!  enqueue_outgoing ──► mux channel ──► Batcher ──► BatchProcessor
//!                                          │
//!  is_pending / consume_result ◄── demux map ◄── record_result
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use muxqueue::{Batcher, BatcherConfig, MemoryQueue, QueueConfig};
//!
//! let (queue, rx) = MemoryQueue::new(QueueConfig::default());
//! let queue = Arc::new(queue);
//! tokio::spawn(Batcher::new(BatcherConfig::default()).run(rx, queue.clone(), processor));
//! ```

mod batcher;
pub mod config;
mod error;
mod id;
mod item;
mod memory;
mod queue;

pub use batcher::{BatchProcessor, Batcher, BatcherStats};
pub use config::{BatcherConfig, QueueConfig};
pub use error::{ProcessError, QueueError};
pub use id::CorrelationId;
pub use item::{Item, Response};
pub use memory::{MemoryQueue, MuxReceiver, PurgeStats, QueueMetrics};
pub use queue::{MuxDemuxQueue, QueueResult};
