use super::error::MuxError;
use super::queue::{QueueMap, ResultQueue, SealOnDrop};
use super::registry::{Begin, Finish, SessionRegistry};
use super::stats::{SessionState, SessionStats};
use crate::audio::AudioChunk;
use crate::engine::{DecodingEngine, FinalizeCallback, SegmentResult, SessionId};
use crate::transcript::{Transcript, TranscriptBuilder};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Front-end multiplexing many audio sessions onto one batched engine.
///
/// All operations are synchronous and return once the engine has taken the
/// chunk; decoding happens on the engine's workers, which report finished
/// segments through a per-session callback into that session's result
/// queue. Callers poll results at any time.
///
/// Operations are safe to call concurrently for different session ids. For
/// one id, calls should come from one thread at a time; that thread may race
/// the engine's callback thread freely.
///
/// Call [`SessionMultiplexer::wait_for_completion`] before dropping the
/// multiplexer or the engine while sessions are in flight. Until it returns
/// the engine may still invoke callbacks for those sessions.
pub struct SessionMultiplexer {
    engine: Arc<dyn DecodingEngine>,
    builder: Arc<TranscriptBuilder>,
    registry: SessionRegistry,
    queues: QueueMap,
}

impl SessionMultiplexer {
    pub fn new(engine: Arc<dyn DecodingEngine>, builder: Arc<TranscriptBuilder>) -> Self {
        Self {
            engine,
            builder,
            registry: SessionRegistry::new(),
            queues: QueueMap::default(),
        }
    }

    /// Forward a chunk of audio for `id`, opening the session on first use.
    pub fn accept_audio(&self, id: SessionId, chunk: AudioChunk) -> Result<(), MuxError> {
        match self.registry.begin(id, chunk.len())? {
            Begin::First => {
                let queue = self.queues.create(id);
                self.engine
                    .set_finalize_callback(id, self.finalize_callback(id, queue));
                if let Err(e) = self.engine.push(id, true, false, chunk) {
                    // The engine never opened the session; leave the id free.
                    self.registry.discard(id);
                    self.queues.remove(id);
                    warn!("Session {} could not start: {}", id, e);
                    return Err(e.into());
                }
                info!("Session {} started", id);
            }
            Begin::Continue => {
                self.engine.push(id, false, false, chunk)?;
            }
        }
        Ok(())
    }

    /// [`accept_audio`](Self::accept_audio) for little-endian 16-bit PCM bytes
    pub fn accept_waveform(&self, id: SessionId, pcm: &[u8]) -> Result<(), MuxError> {
        self.accept_audio(id, AudioChunk::from_le_bytes(pcm))
    }

    /// Flush `id` through the engine and stop accepting audio for it.
    ///
    /// Results already queued, and those the flush produces, stay
    /// retrievable until consumed. Finishing twice is a no-op.
    pub fn finish_session(&self, id: SessionId) -> Result<(), MuxError> {
        match self.registry.finish(id)? {
            Finish::Finished => {
                self.engine.push(id, false, true, AudioChunk::empty())?;
                info!("Session {} finished", id);
            }
            Finish::AlreadyFinished => {
                debug!("Session {} already finished", id);
            }
        }
        Ok(())
    }

    /// Oldest undelivered transcript for `id`, left in place.
    ///
    /// `None` means nothing is ready; a silent segment is `Some` with empty
    /// text.
    pub fn poll_result(&self, id: SessionId) -> Option<Transcript> {
        self.queues.get(id).and_then(|q| q.front())
    }

    /// Drop the oldest undelivered transcript for `id`, if any.
    pub fn consume_result(&self, id: SessionId) -> Option<Transcript> {
        let queue = self.queues.get(id)?;
        let popped = queue.pop();
        self.release_if_drained(id, &queue);
        popped
    }

    /// JSON of the oldest undelivered transcript, or `""` if none is ready.
    ///
    /// Callers of this form cannot tell "not ready" from a silent segment
    /// (which serializes as `{"text":""}`, not `""`); prefer
    /// [`poll_result`](Self::poll_result).
    pub fn front_result(&self, id: SessionId) -> String {
        self.poll_result(id)
            .map(|t| t.to_json())
            .unwrap_or_default()
    }

    /// Engine-side backlog for `id`, for caller flow control
    pub fn pending_chunk_count(&self, id: SessionId) -> usize {
        self.engine.pending_chunks(id)
    }

    /// Block until the engine has drained all sessions.
    ///
    /// No callback fires after this returns for sessions finished before the
    /// call. Finished sessions whose results are all consumed are released,
    /// making their ids reusable.
    pub fn wait_for_completion(&self) {
        self.engine.wait_for_completion();

        for id in self.registry.ids_in_state(SessionState::Finished) {
            match self.queues.get(id) {
                Some(queue) => self.release_if_drained(id, &queue),
                None => {
                    self.registry.release(id);
                }
            }
        }
    }

    pub fn session_state(&self, id: SessionId) -> SessionState {
        self.registry.state(id)
    }

    /// True once `id` is finished, the engine has delivered its last result
    /// and every result has been consumed. Ids never seen also count.
    pub fn is_complete(&self, id: SessionId) -> bool {
        match self.registry.state(id) {
            SessionState::NotStarted => true,
            SessionState::Active => false,
            SessionState::Finished => self
                .queues
                .get(id)
                .map_or(true, |q| q.is_sealed() && q.is_empty()),
        }
    }

    pub fn active_sessions(&self) -> Vec<SessionId> {
        self.registry.ids_in_state(SessionState::Active)
    }

    pub fn session_stats(&self, id: SessionId) -> Option<SessionStats> {
        let entry = self.registry.entry(id)?;
        let queue = self.queues.get(id);

        Some(SessionStats {
            id,
            state: entry.state,
            started_at: entry.started_at,
            chunks_accepted: entry.chunks_accepted,
            samples_accepted: entry.samples_accepted,
            results_produced: queue.as_ref().map_or(0, |q| q.produced()),
            results_pending: queue.as_ref().map_or(0, |q| q.len()),
            engine_pending_chunks: self.engine.pending_chunks(id),
        })
    }

    fn release_if_drained(&self, id: SessionId, queue: &Arc<ResultQueue>) {
        if queue.is_sealed() && queue.is_empty() && self.registry.release(id) {
            self.queues.remove(id);
            debug!("Released session {}", id);
        }
    }

    fn finalize_callback(&self, id: SessionId, queue: Arc<ResultQueue>) -> FinalizeCallback {
        let builder = Arc::clone(&self.builder);
        let sink = SealOnDrop(queue);

        Arc::new(move |segment: SegmentResult| match builder.build(segment) {
            Ok(transcript) => {
                debug!("Session {} result: {:?}", id, transcript.text);
                sink.0.push(transcript);
            }
            Err(e) => warn!("Dropping result for session {}: {}", id, e),
        })
    }
}
