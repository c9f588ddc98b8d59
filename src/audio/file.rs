use anyhow::{Context, Result};
use hound::WavReader;
use std::path::Path;
use tracing::info;

/// A WAV file loaded fully into memory as interleaved i16 samples
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path)
            .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;

        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            anyhow::bail!(
                "Unsupported WAV encoding in {}: expected 16-bit PCM, got {}-bit {:?}",
                path.display(),
                spec.bits_per_sample,
                spec.sample_format
            );
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Mono samples at `sample_rate`, ready to be chunked into a session.
    ///
    /// Stereo input is downmixed by averaging. Resampling is not done here:
    /// the engine's feature pipeline is configured for one rate.
    pub fn mono_samples(&self, sample_rate: u32) -> Result<Vec<i16>> {
        if self.sample_rate != sample_rate {
            anyhow::bail!(
                "{} is {}Hz, engine expects {}Hz",
                self.path,
                self.sample_rate,
                sample_rate
            );
        }

        match self.channels {
            1 => Ok(self.samples.clone()),
            2 => Ok(self
                .samples
                .chunks_exact(2)
                .map(|lr| ((lr[0] as i32 + lr[1] as i32) / 2) as i16)
                .collect()),
            n => anyhow::bail!("{} has {} channels, only mono or stereo supported", self.path, n),
        }
    }
}
