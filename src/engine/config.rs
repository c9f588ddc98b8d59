use serde::{Deserialize, Serialize};

/// Configuration for the threaded batching engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatcherConfig {
    /// Worker threads decoding batches (0 = one per available core)
    pub num_worker_threads: usize,

    /// Maximum sessions decoded together in one batch
    pub max_batch_size: usize,

    /// Maximum sessions with an open channel; opening more blocks
    pub num_channels: usize,

    /// Per-session pending chunk limit before `push` blocks
    pub max_pending_chunks: usize,
}

impl BatcherConfig {
    pub fn worker_threads(&self) -> usize {
        if self.num_worker_threads > 0 {
            self.num_worker_threads
        } else {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        }
    }
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            num_worker_threads: 0,
            max_batch_size: 32,
            num_channels: 600,
            max_pending_chunks: 16,
        }
    }
}
