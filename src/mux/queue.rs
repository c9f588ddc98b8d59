use crate::engine::SessionId;
use crate::transcript::Transcript;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// FIFO of finalized transcripts for one session.
///
/// The engine's callback thread pushes while a caller thread reads the head,
/// so every operation takes the queue's own lock. Sessions never share a
/// queue lock.
#[derive(Debug, Default)]
pub struct ResultQueue {
    items: Mutex<VecDeque<Transcript>>,
    produced: AtomicUsize,
    sealed: AtomicBool,
}

impl ResultQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, transcript: Transcript) {
        self.items.lock().push_back(transcript);
        self.produced.fetch_add(1, Ordering::SeqCst);
    }

    /// Clone of the oldest undelivered transcript
    pub fn front(&self) -> Option<Transcript> {
        self.items.lock().front().cloned()
    }

    pub fn pop(&self) -> Option<Transcript> {
        self.items.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Transcripts ever pushed, including those already consumed
    pub fn produced(&self) -> usize {
        self.produced.load(Ordering::SeqCst)
    }

    /// Mark that no further transcripts will be pushed
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::SeqCst);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }
}

/// Seals the queue when dropped.
///
/// Captured by a session's finalize callback: the engine drops the callback
/// after the session's last result, which seals the queue.
pub(crate) struct SealOnDrop(pub(crate) Arc<ResultQueue>);

impl Drop for SealOnDrop {
    fn drop(&mut self) {
        self.0.seal();
    }
}

/// Session id → queue. Queues are created on first chunk; lookups of an
/// unknown id see nothing rather than creating one.
#[derive(Debug, Default)]
pub(crate) struct QueueMap {
    queues: Mutex<HashMap<SessionId, Arc<ResultQueue>>>,
}

impl QueueMap {
    /// Fresh queue for a new session, replacing any drained leftover
    pub fn create(&self, id: SessionId) -> Arc<ResultQueue> {
        let queue = Arc::new(ResultQueue::new());
        self.queues.lock().insert(id, Arc::clone(&queue));
        queue
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<ResultQueue>> {
        self.queues.lock().get(&id).cloned()
    }

    pub fn remove(&self, id: SessionId) -> Option<Arc<ResultQueue>> {
        self.queues.lock().remove(&id)
    }
}
