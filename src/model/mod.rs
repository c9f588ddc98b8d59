//! Model directory handling
//!
//! Loading happens once at startup on a single thread. Everything produced
//! here is immutable afterwards and shared across sessions behind `Arc`.

mod artifacts;
mod symbols;

pub use artifacts::{
    ModelArtifacts, RescoreArtifacts, ACOUSTIC_MODEL, DECODING_GRAPH, RESCORE_CARPA,
    RESCORE_LM_FST, WORD_BOUNDARY, WORD_SYMBOLS,
};
pub use symbols::SymbolTable;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("missing mandatory model artifact {name} at {path}")]
    MissingArtifact { name: &'static str, path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("symbol table line {line}: {message}")]
    SymbolTable { line: usize, message: String },
}

/// Probed artifacts plus the loaded word symbols
#[derive(Debug, Clone)]
pub struct Model {
    pub artifacts: ModelArtifacts,
    pub symbols: Arc<SymbolTable>,
}

impl Model {
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ModelError> {
        let artifacts = ModelArtifacts::probe(dir)?;
        let symbols = Arc::new(SymbolTable::load(&artifacts.word_symbols)?);
        Ok(Self { artifacts, symbols })
    }
}
