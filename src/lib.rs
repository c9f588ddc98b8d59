pub mod audio;
pub mod config;
pub mod engine;
pub mod feed;
pub mod lattice;
pub mod model;
pub mod mux;
pub mod transcript;

pub use audio::{AudioChunk, AudioFile};
pub use crate::config::Config;
pub use engine::{
    BatchItem, BatcherConfig, DecodingEngine, EngineError, FinalizeCallback, Recognizer,
    SegmentResult, SessionId, StreamDecoder, ThreadedBatcher,
};
pub use feed::{AudioFeeder, FeedConfig, FeedReport, ResultCollector};
pub use lattice::{Lattice, LatticeArc, LatticeError};
pub use model::{Model, ModelArtifacts, ModelError, SymbolTable};
pub use mux::{MuxError, ResultQueue, SessionMultiplexer, SessionState, SessionStats};
pub use transcript::{
    HypothesisExtractor, OneBest, PosteriorBestPath, Transcript, TranscriptBuilder,
    TranscriptConfig, TranscriptError, TranscriptWord, WordAligner,
};
