//! In-memory shared queue
//!
//! The mux side is a bounded tokio channel drained by the batching worker.
//! The demux side is a sharded concurrent map keyed by correlation id, so
//! waiters polling distinct ids never queue up behind one lock.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::id::CorrelationId;
use crate::item::{Item, Response};
use crate::queue::{MuxDemuxQueue, QueueResult};

enum Slot {
    Pending,
    Resolved(Option<Response>),
}

/// Demux-side bookkeeping for one correlation id
struct Entry {
    slot: Slot,
    /// When the entry last changed state (enqueued or resolved)
    since: Instant,
}

impl Entry {
    fn pending() -> Self {
        Self {
            slot: Slot::Pending,
            since: Instant::now(),
        }
    }

    fn is_pending(&self) -> bool {
        matches!(self.slot, Slot::Pending)
    }

    fn into_response(self) -> Option<Response> {
        match self.slot {
            Slot::Resolved(response) => response,
            Slot::Pending => None,
        }
    }
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    resolved: AtomicU64,
    consumed: AtomicU64,
    expired: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time queue metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueMetrics {
    /// Ids waiting for a result
    pub pending: usize,
    /// Ids resolved but not yet consumed
    pub resolved: usize,
    pub enqueued_total: u64,
    pub resolved_total: u64,
    pub consumed_total: u64,
    pub expired_total: u64,
    pub dropped_total: u64,
}

/// Outcome of one expiry sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeStats {
    /// Stale pending entries resolved as permanently absent
    pub expired: usize,
    /// Stale resolved entries nobody consumed, removed
    pub evicted: usize,
}

/// Receiving end of the mux side, owned by the batching worker
pub struct MuxReceiver {
    rx: mpsc::Receiver<Item>,
}

impl MuxReceiver {
    /// Receive a single item. `None` once the queue is closed and drained.
    pub async fn recv(&mut self) -> Option<Item> {
        self.rx.recv().await
    }

    /// Wait for one item, then keep collecting until `max_elements` items are
    /// gathered or `max_wait` has passed since the first one arrived.
    ///
    /// Returns an empty batch only when the queue is closed and drained.
    pub async fn recv_batch(&mut self, max_elements: usize, max_wait: Duration) -> Vec<Item> {
        let max_elements = max_elements.max(1);
        let mut batch = Vec::with_capacity(max_elements);

        let Some(first) = self.rx.recv().await else {
            debug!("MuxReceiver::recv_batch: channel closed");
            return batch;
        };
        batch.push(first);

        let deadline = Instant::now() + max_wait;
        while batch.len() < max_elements {
            match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                Ok(Some(item)) => batch.push(item),
                Ok(None) | Err(_) => break,
            }
        }

        debug!(batch_len = batch.len(), "MuxReceiver::recv_batch: collected");
        batch
    }
}

/// In-process shared queue
pub struct MemoryQueue {
    config: QueueConfig,
    entries: DashMap<CorrelationId, Entry>,
    /// Taken on close so the receiver sees end-of-stream
    mux_tx: RwLock<Option<mpsc::Sender<Item>>>,
    closed: AtomicBool,
    counters: Counters,
}

impl MemoryQueue {
    /// Create a queue and the receiver for its mux side
    pub fn new(config: QueueConfig) -> (Self, MuxReceiver) {
        debug!(?config, "MemoryQueue::new: called");
        let (tx, rx) = mpsc::channel(config.mux_capacity.max(1));
        let queue = Self {
            config,
            entries: DashMap::new(),
            mux_tx: RwLock::new(Some(tx)),
            closed: AtomicBool::new(false),
            counters: Counters::default(),
        };
        (queue, MuxReceiver { rx })
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop accepting new items while keeping the demux side working
    ///
    /// The mux receiver drains what is buffered and then ends, so the batching
    /// worker finishes in-flight items and exits. Waiters still get results.
    pub fn seal(&self) {
        let sender = match self.mux_tx.write() {
            Ok(mut tx) => tx.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if sender.is_some() {
            info!("MemoryQueue sealed, no longer accepting items");
        }
    }

    /// Shut the queue down
    ///
    /// Every later call fails with `Unavailable`, all bookkeeping is released,
    /// and the mux receiver drains what is buffered and then ends.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.seal();
        let released = self.entries.len();
        self.entries.clear();
        info!(released, "MemoryQueue closed");
    }

    /// Run one expiry sweep against the configured TTLs
    pub fn purge_expired(&self) -> PurgeStats {
        let now = Instant::now();
        let pending_ttl = self.config.pending_ttl();
        let result_ttl = self.config.result_ttl();
        let mut stats = PurgeStats::default();

        self.entries.retain(|id, entry| {
            let age = now.saturating_duration_since(entry.since);
            if entry.is_pending() {
                if age >= pending_ttl {
                    debug!(%id, ?age, "MemoryQueue::purge_expired: pending entry expired");
                    entry.slot = Slot::Resolved(None);
                    entry.since = now;
                    stats.expired += 1;
                }
                true
            } else if age >= result_ttl {
                debug!(%id, ?age, "MemoryQueue::purge_expired: unconsumed result evicted");
                stats.evicted += 1;
                false
            } else {
                true
            }
        });

        self.counters.expired.fetch_add(stats.expired as u64, Ordering::Relaxed);
        self.counters.dropped.fetch_add(stats.evicted as u64, Ordering::Relaxed);
        stats
    }

    /// Spawn a background task sweeping expired entries every `reaper-interval`
    ///
    /// The task holds only a weak reference and exits once the queue is
    /// closed or dropped.
    pub fn spawn_reaper(self: &Arc<Self>) -> JoinHandle<()> {
        let interval = self.config.reaper_interval().max(Duration::from_millis(1));
        debug!(?interval, "MemoryQueue::spawn_reaper: called");
        let queue = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(queue) = queue.upgrade() else {
                    break;
                };
                if queue.is_closed() {
                    break;
                }
                let stats = queue.purge_expired();
                if stats.expired > 0 || stats.evicted > 0 {
                    info!(expired = stats.expired, evicted = stats.evicted, "Reaper swept stale entries");
                }
            }

            debug!("MemoryQueue reaper exiting");
        })
    }

    pub fn metrics(&self) -> QueueMetrics {
        let mut metrics = QueueMetrics {
            enqueued_total: self.counters.enqueued.load(Ordering::Relaxed),
            resolved_total: self.counters.resolved.load(Ordering::Relaxed),
            consumed_total: self.counters.consumed.load(Ordering::Relaxed),
            expired_total: self.counters.expired.load(Ordering::Relaxed),
            dropped_total: self.counters.dropped.load(Ordering::Relaxed),
            ..Default::default()
        };
        for entry in self.entries.iter() {
            if entry.is_pending() {
                metrics.pending += 1;
            } else {
                metrics.resolved += 1;
            }
        }
        metrics
    }

    fn ensure_open(&self) -> QueueResult<()> {
        if self.is_closed() {
            return Err(QueueError::Unavailable("queue closed".to_string()));
        }
        Ok(())
    }

    fn send_to_mux(&self, item: Item) -> QueueResult<()> {
        let guard = self
            .mux_tx
            .read()
            .map_err(|_| QueueError::Unavailable("mux sender lock poisoned".to_string()))?;
        let tx = guard
            .as_ref()
            .ok_or_else(|| QueueError::Unavailable("mux side sealed".to_string()))?;

        tx.try_send(item).map_err(|e| match e {
            TrySendError::Full(_) => QueueError::Full {
                capacity: self.config.mux_capacity,
            },
            TrySendError::Closed(_) => QueueError::Unavailable("mux receiver dropped".to_string()),
        })
    }
}

impl MuxDemuxQueue for MemoryQueue {
    fn enqueue_outgoing(&self, item: Item) -> QueueResult<()> {
        debug!(id = %item.id, destination = %item.destination, "MemoryQueue::enqueue_outgoing: called");
        self.ensure_open()?;
        let id = item.id;

        // Track the id before it becomes visible to the worker so a fast
        // result never arrives for an unknown id.
        match self.entries.entry(id) {
            MapEntry::Occupied(_) => return Err(QueueError::DuplicateIdentifier(id)),
            MapEntry::Vacant(slot) => {
                slot.insert(Entry::pending());
            }
        }

        if let Err(e) = self.send_to_mux(item) {
            warn!(%id, error = %e, "Failed to hand item to mux side");
            self.entries.remove(&id);
            return Err(e);
        }

        self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn is_pending(&self, id: &CorrelationId) -> QueueResult<bool> {
        self.ensure_open()?;
        match self.entries.get(id) {
            Some(entry) => Ok(entry.is_pending()),
            None => Err(QueueError::UnknownIdentifier(*id)),
        }
    }

    fn consume_result(&self, id: &CorrelationId) -> QueueResult<Option<Response>> {
        debug!(%id, "MemoryQueue::consume_result: called");
        self.ensure_open()?;
        match self.entries.remove_if(id, |_, entry| !entry.is_pending()) {
            Some((_, entry)) => {
                self.counters.consumed.fetch_add(1, Ordering::Relaxed);
                Ok(entry.into_response())
            }
            None if self.entries.contains_key(id) => Err(QueueError::StillPending(*id)),
            None => Err(QueueError::UnknownIdentifier(*id)),
        }
    }

    fn record_result(&self, id: &CorrelationId, response: Option<Response>) -> QueueResult<()> {
        debug!(%id, has_value = response.is_some(), "MemoryQueue::record_result: called");
        self.ensure_open()?;
        let mut entry = self
            .entries
            .get_mut(id)
            .ok_or(QueueError::UnknownIdentifier(*id))?;

        if !entry.is_pending() {
            warn!(%id, "Result already recorded, keeping the first one");
            return Ok(());
        }

        entry.slot = Slot::Resolved(response);
        entry.since = Instant::now();
        self.counters.resolved.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn drop_interest(&self, id: &CorrelationId) -> QueueResult<bool> {
        let removed = self.entries.remove(id).is_some();
        if removed {
            debug!(%id, "MemoryQueue::drop_interest: released");
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        }
        Ok(removed)
    }
}
