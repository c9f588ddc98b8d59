use crate::engine::BatcherConfig;
use crate::feed::FeedConfig;
use crate::transcript::TranscriptConfig;
use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub engine: BatcherConfig,
    #[serde(default)]
    pub decoder: TranscriptConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct ModelConfig {
    /// Model directory; `~` is expanded
    pub dir: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sample_rate() -> u32 {
    16000
}

impl Config {
    /// Load from a config file (any format the `config` crate knows, by
    /// extension) with `LOQA_BATCH__SECTION__KEY` environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("LOQA_BATCH").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn model_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.model.dir).as_ref())
    }

    /// Feeder settings matching the model's sample rate. Chunks are 200ms
    /// and the feeder backs off before the engine's own per-session limit
    /// would block it.
    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            sample_rate: self.model.sample_rate,
            chunk_samples: (self.model.sample_rate / 5).max(1) as usize,
            max_pending_chunks: self.engine.max_pending_chunks.max(1),
            ..FeedConfig::default()
        }
    }
}
