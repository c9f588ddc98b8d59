//! Batched decoding engine interface
//!
//! The engine is a long-lived shared resource: it owns the acoustic search,
//! batches work across sessions and reports finalized segments through a
//! per-session callback. `ThreadedBatcher` is the in-process implementation;
//! anything implementing [`DecodingEngine`] can be plugged into the
//! multiplexer instead.

mod batcher;
mod config;
mod recognizer;

pub use batcher::ThreadedBatcher;
pub use config::BatcherConfig;
pub use recognizer::{BatchItem, Recognizer, StreamDecoder};

use crate::audio::AudioChunk;
use crate::lattice::Lattice;
use std::sync::Arc;
use thiserror::Error;

/// Caller-supplied identifier of one audio stream
pub type SessionId = u64;

/// One finalized segment of a session
#[derive(Debug, Clone, Default)]
pub struct SegmentResult {
    /// `None` when the decoder produced nothing usable for the segment
    pub lattice: Option<Lattice>,

    /// Position of the segment start within the stream, in seconds
    pub time_offset: f32,
}

/// Invoked by the engine once per finalized segment of a session.
///
/// Calls for one session are serialized and arrive in temporal order. Calls
/// for different sessions may run concurrently on engine worker threads, so
/// the body must be short and must not block on I/O.
pub type FinalizeCallback = Arc<dyn Fn(SegmentResult) + Send + Sync>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("session {0} pushed audio without first opening a channel")]
    UnknownChannel(SessionId),

    #[error("session {0} already has an open channel")]
    ChannelAlreadyOpen(SessionId),

    #[error("session {0} was already closed with a final chunk")]
    ChannelClosed(SessionId),

    #[error("engine is shutting down")]
    ShutDown,
}

pub trait DecodingEngine: Send + Sync {
    /// Queue a chunk for `id`.
    ///
    /// `is_first` opens the session's channel, `is_last` flushes and closes
    /// it. May block while the session's pending buffer is full.
    fn push(
        &self,
        id: SessionId,
        is_first: bool,
        is_last: bool,
        chunk: AudioChunk,
    ) -> Result<(), EngineError>;

    /// Register the finalize callback for `id`, replacing any previous one.
    ///
    /// The engine drops the callback after the session's last chunk has been
    /// decoded and its final results delivered; no call happens after that.
    fn set_finalize_callback(&self, id: SessionId, callback: FinalizeCallback);

    /// Block until every queued chunk has been decoded and every callback
    /// has returned.
    fn wait_for_completion(&self);

    /// Chunks accepted for `id` but not yet taken by a decoding batch
    fn pending_chunks(&self, id: SessionId) -> usize;
}
