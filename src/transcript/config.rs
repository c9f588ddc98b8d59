use serde::{Deserialize, Serialize};

/// Constants tying lattice output to the engine's configuration.
///
/// These must agree with the engine: `frame_subsampling_factor` is the
/// decoder's output frame rate relative to the feature frames, and
/// `lattice_scale` matches its acoustic/graph weight convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Graph cost scale applied before alignment
    pub lattice_scale: f32,

    /// Feature frame shift in seconds
    pub frame_shift_secs: f32,

    /// Decoder frames per feature frame
    pub frame_subsampling_factor: u32,
}

impl TranscriptConfig {
    /// Seconds per decoder frame
    pub fn frame_duration(&self) -> f32 {
        self.frame_shift_secs * self.frame_subsampling_factor as f32
    }
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            lattice_scale: 0.9,
            frame_shift_secs: 0.01,
            frame_subsampling_factor: 3,
        }
    }
}
