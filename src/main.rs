use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use loqa_batch::{Config, Lattice, Model, TranscriptBuilder};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "loqa-batch")]
#[command(about = "Batched multi-session speech decoding front-end")]
struct Args {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/loqa-batch")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate the config and model directory
    Check,

    /// Convert a JSON lattice into a transcript with the configured model
    InspectLattice {
        /// JSON-encoded lattice
        file: PathBuf,

        /// Segment start within the stream, in seconds
        #[arg(long, default_value = "0.0")]
        offset: f32,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.service.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let model_dir = cfg.model_dir();
    let model = match Model::load(&model_dir) {
        Ok(model) => model,
        Err(e) => {
            error!("Cannot serve sessions: {}", e);
            return Err(e).context("Model loading failed");
        }
    };

    match args.command {
        Command::Check => {
            info!("Model directory: {}", model.artifacts.dir.display());
            info!("Word symbols: {}", model.symbols.len());
            info!(
                "Word alignment: {}",
                if model.artifacts.has_word_alignment() { "enabled" } else { "disabled" }
            );
            info!(
                "Lattice rescoring: {}",
                if model.artifacts.has_rescoring() { "enabled" } else { "disabled" }
            );
            info!(
                "Engine: {} workers, batch size {}, {} channels, {} pending chunks per session",
                cfg.engine.worker_threads(),
                cfg.engine.max_batch_size,
                cfg.engine.num_channels,
                cfg.engine.max_pending_chunks
            );
            let feed = cfg.feed_config();
            info!(
                "Feeder: {} Hz, {} samples per chunk",
                feed.sample_rate, feed.chunk_samples
            );
            info!(
                "Decoder: lattice scale {}, {:.3}s per frame",
                cfg.decoder.lattice_scale,
                cfg.decoder.frame_duration()
            );
        }

        Command::InspectLattice { file, offset } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let lattice: Lattice = serde_json::from_str(&json)
                .with_context(|| format!("Failed to parse lattice in {}", file.display()))?;

            let builder = TranscriptBuilder::new(Arc::clone(&model.symbols), cfg.decoder);
            let transcript = builder.build_from_lattice(lattice, offset)?;
            println!("{}", serde_json::to_string_pretty(&transcript)?);
        }
    }

    Ok(())
}
