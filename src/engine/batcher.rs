use super::{
    BatchItem, BatcherConfig, DecodingEngine, EngineError, FinalizeCallback, Recognizer,
    SessionId, StreamDecoder,
};
use crate::audio::AudioChunk;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

struct Work {
    samples: Vec<f32>,
    is_last: bool,
}

struct Channel {
    /// `None` while the channel is checked out into a batch
    stream: Option<Box<dyn StreamDecoder>>,
    pending: VecDeque<Work>,
    /// In the ready queue or in flight
    scheduled: bool,
    /// Final chunk queued; no more pushes accepted
    closing: bool,
}

#[derive(Default)]
struct State {
    channels: HashMap<SessionId, Channel>,
    callbacks: HashMap<SessionId, FinalizeCallback>,
    ready: VecDeque<SessionId>,
    in_flight: usize,
    shutdown: bool,
}

impl State {
    fn is_idle(&self) -> bool {
        self.ready.is_empty() && self.in_flight == 0
    }
}

struct Shared {
    config: BatcherConfig,
    recognizer: Arc<dyn Recognizer>,
    state: Mutex<State>,
    /// Signalled when sessions enter the ready queue
    work_ready: Condvar,
    /// Signalled when pending buffers shrink or channels close
    space: Condvar,
    /// Signalled when no work is queued or in flight
    idle: Condvar,
}

/// In-process batching engine.
///
/// A pool of worker threads pulls ready sessions into batches of at most
/// `max_batch_size`, one chunk per session per batch. A session is never in
/// two batches at once, so its chunks are decoded in push order and its
/// callbacks run serialized on whichever worker holds it.
pub struct ThreadedBatcher {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadedBatcher {
    pub fn new(config: BatcherConfig, recognizer: Arc<dyn Recognizer>) -> std::io::Result<Self> {
        let threads = config.worker_threads();
        info!(
            "Starting batcher: {} workers, batch size {}, {} channels",
            threads, config.max_batch_size, config.num_channels
        );

        let shared = Arc::new(Shared {
            config,
            recognizer,
            state: Mutex::new(State::default()),
            work_ready: Condvar::new(),
            space: Condvar::new(),
            idle: Condvar::new(),
        });

        let workers = (0..threads)
            .map(|n| {
                let shared = Arc::clone(&shared);
                std::thread::Builder::new()
                    .name(format!("batcher-{}", n))
                    .spawn(move || shared.run_worker())
            })
            .collect::<std::io::Result<Vec<_>>>()?;

        Ok(Self { shared, workers })
    }

    /// Sessions currently holding a channel
    pub fn open_channels(&self) -> usize {
        self.shared.state.lock().channels.len()
    }
}

impl DecodingEngine for ThreadedBatcher {
    fn push(
        &self,
        id: SessionId,
        is_first: bool,
        is_last: bool,
        chunk: AudioChunk,
    ) -> Result<(), EngineError> {
        let shared = &self.shared;
        let samples = chunk.to_f32();
        let max_pending = shared.config.max_pending_chunks.max(1);

        let mut state = shared.state.lock();
        if state.shutdown {
            return Err(EngineError::ShutDown);
        }

        if is_first {
            if state.channels.contains_key(&id) {
                return Err(EngineError::ChannelAlreadyOpen(id));
            }
            while state.channels.len() >= shared.config.num_channels.max(1) && !state.shutdown {
                debug!("All channels busy, session {} waiting", id);
                shared.space.wait(&mut state);
            }
            if state.shutdown {
                return Err(EngineError::ShutDown);
            }
            if state.channels.contains_key(&id) {
                return Err(EngineError::ChannelAlreadyOpen(id));
            }

            let stream = shared.recognizer.open_stream(id);
            state.channels.insert(
                id,
                Channel {
                    stream: Some(stream),
                    pending: VecDeque::new(),
                    scheduled: false,
                    closing: false,
                },
            );
            debug!("Opened channel for session {} ({} open)", id, state.channels.len());
        }

        loop {
            let channel = state
                .channels
                .get(&id)
                .ok_or(EngineError::UnknownChannel(id))?;
            if channel.closing {
                return Err(EngineError::ChannelClosed(id));
            }
            if channel.pending.len() < max_pending {
                break;
            }
            if state.shutdown {
                return Err(EngineError::ShutDown);
            }
            shared.space.wait(&mut state);
        }

        let state = &mut *state;
        let channel = state
            .channels
            .get_mut(&id)
            .ok_or(EngineError::UnknownChannel(id))?;
        channel.pending.push_back(Work { samples, is_last });
        if is_last {
            channel.closing = true;
        }
        if !channel.scheduled {
            channel.scheduled = true;
            state.ready.push_back(id);
            shared.work_ready.notify_one();
        }

        Ok(())
    }

    fn set_finalize_callback(&self, id: SessionId, callback: FinalizeCallback) {
        self.shared.state.lock().callbacks.insert(id, callback);
    }

    fn wait_for_completion(&self) {
        let mut state = self.shared.state.lock();
        while !state.is_idle() {
            self.shared.idle.wait(&mut state);
        }
    }

    fn pending_chunks(&self, id: SessionId) -> usize {
        self.shared
            .state
            .lock()
            .channels
            .get(&id)
            .map_or(0, |c| c.pending.len())
    }
}

impl Drop for ThreadedBatcher {
    fn drop(&mut self) {
        self.shared.state.lock().shutdown = true;
        self.shared.work_ready.notify_all();
        self.shared.space.notify_all();

        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("Batcher worker panicked");
            }
        }
        info!("Batcher stopped");
    }
}

impl Shared {
    fn run_worker(&self) {
        loop {
            let mut batch = {
                let mut state = self.state.lock();
                while state.ready.is_empty() && !state.shutdown {
                    self.work_ready.wait(&mut state);
                }
                // Shutdown still drains whatever is queued.
                if state.ready.is_empty() {
                    return;
                }
                self.take_batch(&mut state)
            };
            self.space.notify_all();

            if batch.is_empty() {
                continue;
            }

            debug!("Decoding batch of {} sessions", batch.len());
            let decoded =
                catch_unwind(AssertUnwindSafe(|| self.recognizer.decode_batch(&mut batch)));
            if decoded.is_err() {
                // Streams in this batch may be half-updated; close them so
                // their owners see the end of the session.
                error!(
                    "Recognizer panicked decoding batch of {} sessions, closing them",
                    batch.len()
                );
                for item in batch.iter_mut() {
                    item.is_last = true;
                }
            }
            self.deliver(&mut batch);
            self.return_batch(batch);
        }
    }

    fn take_batch(&self, state: &mut State) -> Vec<BatchItem> {
        let limit = self.config.max_batch_size.max(1);
        let mut batch = Vec::with_capacity(limit.min(state.ready.len()));

        while batch.len() < limit {
            let Some(id) = state.ready.pop_front() else {
                break;
            };
            let Some(channel) = state.channels.get_mut(&id) else {
                continue;
            };
            let Some(stream) = channel.stream.take() else {
                warn!("Session {} scheduled while already in flight", id);
                continue;
            };
            let Some(work) = channel.pending.pop_front() else {
                channel.stream = Some(stream);
                channel.scheduled = false;
                continue;
            };

            batch.push(BatchItem {
                id,
                stream,
                samples: work.samples,
                is_last: work.is_last,
                results: Vec::new(),
            });
        }

        state.in_flight += batch.len();
        batch
    }

    fn deliver(&self, batch: &mut [BatchItem]) {
        for item in batch.iter_mut() {
            if item.results.is_empty() {
                continue;
            }

            let callback = self.state.lock().callbacks.get(&item.id).cloned();
            let Some(callback) = callback else {
                warn!(
                    "Dropping {} results for session {}: no finalize callback",
                    item.results.len(),
                    item.id
                );
                item.results.clear();
                continue;
            };

            for result in item.results.drain(..) {
                if catch_unwind(AssertUnwindSafe(|| callback(result))).is_err() {
                    error!("Finalize callback for session {} panicked", item.id);
                }
            }
        }
    }

    fn return_batch(&self, batch: Vec<BatchItem>) {
        let returned = batch.len();
        let mut released = Vec::new();
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;

            for item in batch {
                if item.is_last {
                    state.channels.remove(&item.id);
                    if let Some(callback) = state.callbacks.remove(&item.id) {
                        released.push(callback);
                    }
                    debug!("Closed channel for session {}", item.id);
                    continue;
                }

                if let Some(channel) = state.channels.get_mut(&item.id) {
                    channel.stream = Some(item.stream);
                    if channel.pending.is_empty() {
                        channel.scheduled = false;
                    } else {
                        state.ready.push_back(item.id);
                    }
                }
            }
        }

        // Dropping a callback tells its owner the session will see no
        // further results, so it happens before the batch stops counting as
        // in flight.
        drop(released);

        let (has_work, idle) = {
            let mut state = self.state.lock();
            state.in_flight -= returned;
            (!state.ready.is_empty(), state.is_idle())
        };

        self.space.notify_all();
        if has_work {
            self.work_ready.notify_all();
        }
        if idle {
            self.idle.notify_all();
        }
    }
}
