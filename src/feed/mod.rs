//! Async helpers for driving sessions from tokio tasks
//!
//! The multiplexer itself is synchronous. `AudioFeeder` paces audio into a
//! session, backing off while the engine reports a backlog, and
//! `ResultCollector` polls a session's queue until it is complete.

use crate::audio::{AudioChunk, AudioFile};
use crate::engine::SessionId;
use crate::mux::SessionMultiplexer;
use crate::transcript::Transcript;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Sample rate the engine's features are configured for
    pub sample_rate: u32,

    /// Samples per pushed chunk
    pub chunk_samples: usize,

    /// Engine backlog at which the feeder stops pushing and waits
    pub max_pending_chunks: usize,

    /// How long to wait before re-checking the backlog
    pub backoff: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            chunk_samples: 3200, // 200ms at 16kHz
            max_pending_chunks: 8,
            backoff: Duration::from_millis(10),
        }
    }
}

/// Summary of one fed session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedReport {
    pub id: SessionId,
    pub chunks: usize,
    pub samples: usize,
}

pub struct AudioFeeder {
    mux: Arc<SessionMultiplexer>,
    config: FeedConfig,
}

impl AudioFeeder {
    pub fn new(mux: Arc<SessionMultiplexer>, config: FeedConfig) -> Self {
        Self { mux, config }
    }

    /// Push `samples` as one session in fixed-size chunks, then finish it.
    pub async fn feed_samples(&self, id: SessionId, samples: &[i16]) -> Result<FeedReport> {
        let chunk_samples = self.config.chunk_samples.max(1);
        let mut chunks = 0;

        for piece in samples.chunks(chunk_samples) {
            self.wait_for_capacity(id).await;
            self.push(id, AudioChunk::new(piece.to_vec())).await?;
            chunks += 1;
        }

        // A session with no audio still needs opening so that finishing it
        // has something to flush.
        if chunks == 0 {
            self.push(id, AudioChunk::empty()).await?;
        }

        let mux = Arc::clone(&self.mux);
        tokio::task::spawn_blocking(move || mux.finish_session(id))
            .await
            .context("Finish task panicked")?
            .with_context(|| format!("Failed to finish session {}", id))?;

        debug!("Fed session {}: {} chunks, {} samples", id, chunks, samples.len());

        Ok(FeedReport {
            id,
            chunks,
            samples: samples.len(),
        })
    }

    /// Stream a WAV file as one session.
    pub async fn feed_wav(&self, id: SessionId, path: impl AsRef<Path>) -> Result<FeedReport> {
        let path = path.as_ref().to_path_buf();
        let sample_rate = self.config.sample_rate;

        let samples = tokio::task::spawn_blocking(move || {
            AudioFile::open(&path)?.mono_samples(sample_rate)
        })
        .await
        .context("WAV loading task panicked")??;

        info!("Feeding {} samples into session {}", samples.len(), id);
        self.feed_samples(id, &samples).await
    }

    async fn wait_for_capacity(&self, id: SessionId) {
        while self.mux.pending_chunk_count(id) >= self.config.max_pending_chunks {
            sleep(self.config.backoff).await;
        }
    }

    // The engine may still block briefly on a full buffer, so pushes run on
    // the blocking pool.
    async fn push(&self, id: SessionId, chunk: AudioChunk) -> Result<()> {
        let mux = Arc::clone(&self.mux);
        tokio::task::spawn_blocking(move || mux.accept_audio(id, chunk))
            .await
            .context("Push task panicked")?
            .with_context(|| format!("Failed to push audio for session {}", id))
    }
}

/// Drains a session's results as they arrive
pub struct ResultCollector {
    mux: Arc<SessionMultiplexer>,
    poll_interval: Duration,
}

impl ResultCollector {
    pub fn new(mux: Arc<SessionMultiplexer>, poll_interval: Duration) -> Self {
        Self { mux, poll_interval }
    }

    /// Take every result currently queued for `id`, oldest first.
    pub fn drain(&self, id: SessionId) -> Vec<Transcript> {
        std::iter::from_fn(|| self.mux.consume_result(id)).collect()
    }

    /// Collect results for `id` until the session is complete.
    ///
    /// Call after the session has been started; an id the multiplexer has
    /// never seen is already complete. Wrap in `tokio::time::timeout` if the
    /// engine might never flush.
    pub async fn collect(&self, id: SessionId) -> Vec<Transcript> {
        let mut results = Vec::new();
        loop {
            results.extend(self.drain(id));
            if self.mux.is_complete(id) {
                return results;
            }
            sleep(self.poll_interval).await;
        }
    }
}
