//! Lattice-to-transcript conversion
//!
//! - `Transcript` / `TranscriptWord`: the value delivered to consumers
//! - `TranscriptBuilder`: scaling, optional word alignment, best-path
//!   selection and frame-to-seconds conversion

mod builder;
mod config;
mod types;

pub use builder::{
    HypothesisExtractor, OneBest, PosteriorBestPath, TranscriptBuilder, TranscriptError,
    WordAligner,
};
pub use config::TranscriptConfig;
pub use types::{Transcript, TranscriptWord};
