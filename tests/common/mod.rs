// Shared test doubles: a recording engine stub and a scripted recognizer
// for the threaded batcher.

#![allow(dead_code)]

use loqa_batch::{
    AudioChunk, DecodingEngine, EngineError, FinalizeCallback, Lattice, LatticeArc, Recognizer,
    SegmentResult, SessionId, SessionMultiplexer, StreamDecoder, SymbolTable, TranscriptBuilder,
    TranscriptConfig,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const HELLO: u32 = 1;
pub const WORLD: u32 = 2;
pub const ONE: u32 = 3;
pub const TWO: u32 = 4;
pub const THREE: u32 = 5;

/// Words 1..=5 plus `s<n>` for session-tagged words starting at 100
pub fn symbols() -> Arc<SymbolTable> {
    let mut words: Vec<(u32, String)> = vec![
        (0, "<eps>".to_string()),
        (HELLO, "hello".to_string()),
        (WORLD, "world".to_string()),
        (ONE, "one".to_string()),
        (TWO, "two".to_string()),
        (THREE, "three".to_string()),
    ];
    words.extend((0..100).map(|n| (100 + n, format!("s{}", n))));
    Arc::new(words.into_iter().collect())
}

pub fn builder() -> Arc<TranscriptBuilder> {
    Arc::new(TranscriptBuilder::new(symbols(), TranscriptConfig::default()))
}

/// Single-path lattice of `(word, start_frame, end_frame)` arcs
pub fn linear_lattice(words: &[(u32, u32, u32)]) -> Lattice {
    Lattice {
        num_states: words.len() + 1,
        start: 0,
        finals: vec![(words.len(), 0.0)],
        arcs: words
            .iter()
            .enumerate()
            .map(|(i, &(word, start_frame, end_frame))| LatticeArc {
                from: i,
                to: i + 1,
                word,
                graph_cost: 1.0,
                acoustic_cost: 2.0,
                start_frame,
                end_frame,
            })
            .collect(),
    }
}

pub fn segment(words: &[(u32, u32, u32)], time_offset: f32) -> SegmentResult {
    SegmentResult {
        lattice: Some(linear_lattice(words)),
        time_offset,
    }
}

pub fn silence_segment(time_offset: f32) -> SegmentResult {
    segment(&[(0, 0, 30)], time_offset)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Push {
    pub id: SessionId,
    pub is_first: bool,
    pub is_last: bool,
    pub samples: usize,
}

/// Engine double: records pushes and registrations, and lets the test fire
/// callbacks by hand.
#[derive(Default)]
pub struct StubEngine {
    pushes: Mutex<Vec<Push>>,
    callbacks: Mutex<HashMap<SessionId, FinalizeCallback>>,
    registrations: Mutex<HashMap<SessionId, usize>>,
    pending: Mutex<HashMap<SessionId, usize>>,
    failure: Mutex<Option<EngineError>>,
    waits: AtomicUsize,
}

impl StubEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn pushes(&self) -> Vec<Push> {
        self.pushes.lock().clone()
    }

    pub fn pushes_for(&self, id: SessionId) -> Vec<Push> {
        self.pushes().into_iter().filter(|p| p.id == id).collect()
    }

    pub fn registrations(&self, id: SessionId) -> usize {
        self.registrations.lock().get(&id).copied().unwrap_or(0)
    }

    /// Invoke `id`'s callback; false if none is registered
    pub fn fire(&self, id: SessionId, result: SegmentResult) -> bool {
        let callback = self.callbacks.lock().get(&id).cloned();
        match callback {
            Some(callback) => {
                callback(result);
                true
            }
            None => false,
        }
    }

    /// Drop `id`'s callback, as an engine does after the final segment
    pub fn close(&self, id: SessionId) {
        self.callbacks.lock().remove(&id);
    }

    /// Make every following push fail with `err`
    pub fn fail_pushes(&self, err: EngineError) {
        *self.failure.lock() = Some(err);
    }

    pub fn recover(&self) {
        *self.failure.lock() = None;
    }

    pub fn set_pending(&self, id: SessionId, chunks: usize) {
        self.pending.lock().insert(id, chunks);
    }

    pub fn waits(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }
}

impl DecodingEngine for StubEngine {
    fn push(
        &self,
        id: SessionId,
        is_first: bool,
        is_last: bool,
        chunk: AudioChunk,
    ) -> Result<(), EngineError> {
        if let Some(err) = self.failure.lock().clone() {
            return Err(err);
        }
        self.pushes.lock().push(Push {
            id,
            is_first,
            is_last,
            samples: chunk.len(),
        });
        Ok(())
    }

    fn set_finalize_callback(&self, id: SessionId, callback: FinalizeCallback) {
        *self.registrations.lock().entry(id).or_default() += 1;
        self.callbacks.lock().insert(id, callback);
    }

    fn wait_for_completion(&self) {
        self.waits.fetch_add(1, Ordering::SeqCst);
    }

    fn pending_chunks(&self, id: SessionId) -> usize {
        self.pending.lock().get(&id).copied().unwrap_or(0)
    }
}

pub fn stub_mux() -> (Arc<StubEngine>, SessionMultiplexer) {
    let engine = StubEngine::new();
    let mux = SessionMultiplexer::new(engine.clone(), builder());
    (engine, mux)
}

/// Recognizer that finalizes a segment every `segment_samples` samples.
///
/// Each segment is a one-word lattice whose word is `s<session id>`, so
/// results show which session produced them; the time offset encodes the
/// segment's position in the stream.
pub struct ScriptedRecognizer {
    pub segment_samples: usize,
    pub sample_rate: f32,
}

impl ScriptedRecognizer {
    pub fn new(segment_samples: usize) -> Arc<Self> {
        Arc::new(Self {
            segment_samples,
            sample_rate: 16000.0,
        })
    }
}

struct ScriptedStream {
    word: u32,
    segment_samples: usize,
    sample_rate: f32,
    buffered: usize,
    consumed: usize,
}

impl ScriptedStream {
    fn emit(&mut self, samples: usize) -> SegmentResult {
        let offset = self.consumed as f32 / self.sample_rate;
        self.consumed += samples;
        segment(&[(self.word, 0, 10)], offset)
    }
}

impl StreamDecoder for ScriptedStream {
    fn accept(&mut self, samples: &[f32]) -> Vec<SegmentResult> {
        self.buffered += samples.len();
        let mut results = Vec::new();
        while self.buffered >= self.segment_samples {
            self.buffered -= self.segment_samples;
            results.push(self.emit(self.segment_samples));
        }
        results
    }

    fn finish(&mut self) -> Vec<SegmentResult> {
        if self.buffered == 0 {
            return Vec::new();
        }
        let rest = std::mem::take(&mut self.buffered);
        vec![self.emit(rest)]
    }
}

impl Recognizer for ScriptedRecognizer {
    fn open_stream(&self, id: SessionId) -> Box<dyn StreamDecoder> {
        Box::new(ScriptedStream {
            word: 100 + (id % 100) as u32,
            segment_samples: self.segment_samples,
            sample_rate: self.sample_rate,
            buffered: 0,
            consumed: 0,
        })
    }
}
