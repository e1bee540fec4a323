//! Queue and batching worker configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Shared queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Max items buffered on the mux side before `enqueue_outgoing` fails
    #[serde(rename = "mux-capacity", default = "default_mux_capacity")]
    pub mux_capacity: usize,

    /// Pending entries older than this are resolved as permanently absent
    #[serde(rename = "pending-ttl-secs", default = "default_pending_ttl_secs")]
    pub pending_ttl_secs: u64,

    /// Resolved entries nobody consumed are dropped after this long
    #[serde(rename = "result-ttl-secs", default = "default_result_ttl_secs")]
    pub result_ttl_secs: u64,

    /// How often the reaper sweeps for expired entries
    #[serde(rename = "reaper-interval-ms", default = "default_reaper_interval_ms")]
    pub reaper_interval_ms: u64,
}

fn default_mux_capacity() -> usize {
    debug!("default_mux_capacity: called");
    1000
}

fn default_pending_ttl_secs() -> u64 {
    debug!("default_pending_ttl_secs: called");
    300
}

fn default_result_ttl_secs() -> u64 {
    debug!("default_result_ttl_secs: called");
    60
}

fn default_reaper_interval_ms() -> u64 {
    debug!("default_reaper_interval_ms: called");
    1000
}

impl Default for QueueConfig {
    fn default() -> Self {
        debug!("QueueConfig::default: called");
        Self {
            mux_capacity: default_mux_capacity(),
            pending_ttl_secs: default_pending_ttl_secs(),
            result_ttl_secs: default_result_ttl_secs(),
            reaper_interval_ms: default_reaper_interval_ms(),
        }
    }
}

impl QueueConfig {
    pub fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl_secs)
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_secs)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_millis(self.reaper_interval_ms)
    }
}

/// Batching worker configuration
///
/// A batch is flushed when it reaches `max_elements` or when `max_time_ms`
/// has passed since its first item arrived, whichever comes first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatcherConfig {
    #[serde(rename = "max-elements", default = "default_max_elements")]
    pub max_elements: usize,

    #[serde(rename = "max-time-ms", default = "default_max_time_ms")]
    pub max_time_ms: u64,
}

fn default_max_elements() -> usize {
    debug!("default_max_elements: called");
    5
}

fn default_max_time_ms() -> u64 {
    debug!("default_max_time_ms: called");
    500
}

impl Default for BatcherConfig {
    fn default() -> Self {
        debug!("BatcherConfig::default: called");
        Self {
            max_elements: default_max_elements(),
            max_time_ms: default_max_time_ms(),
        }
    }
}

impl BatcherConfig {
    pub fn max_time(&self) -> Duration {
        Duration::from_millis(self.max_time_ms)
    }
}
