use super::ModelError;
use std::path::{Path, PathBuf};
use tracing::info;

pub const ACOUSTIC_MODEL: &str = "am/final.mdl";
pub const DECODING_GRAPH: &str = "graph/HCLG.fst";
pub const WORD_SYMBOLS: &str = "graph/words.txt";
pub const WORD_BOUNDARY: &str = "graph/phones/word_boundary.int";
pub const RESCORE_LM_FST: &str = "rescore/G.fst";
pub const RESCORE_CARPA: &str = "rescore/G.carpa";

/// Language model pair used for lattice rescoring
#[derive(Debug, Clone, PartialEq)]
pub struct RescoreArtifacts {
    pub lm_fst: PathBuf,
    pub carpa: PathBuf,
}

/// Files found in a model directory.
///
/// The acoustic model, decoding graph and word symbols are mandatory. Word
/// boundary info and the rescoring pair are optional; when absent the
/// matching feature is disabled.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifacts {
    pub dir: PathBuf,
    pub acoustic_model: PathBuf,
    pub decoding_graph: PathBuf,
    pub word_symbols: PathBuf,
    pub word_boundary: Option<PathBuf>,
    pub rescore: Option<RescoreArtifacts>,
}

impl ModelArtifacts {
    pub fn probe(dir: impl AsRef<Path>) -> Result<Self, ModelError> {
        let dir = dir.as_ref().to_path_buf();
        info!("Probing model directory {}", dir.display());

        let acoustic_model = require(&dir, ACOUSTIC_MODEL)?;
        let decoding_graph = require(&dir, DECODING_GRAPH)?;
        let word_symbols = require(&dir, WORD_SYMBOLS)?;

        let word_boundary = optional(&dir, WORD_BOUNDARY);
        match &word_boundary {
            Some(path) => info!("Loading winfo {}", path.display()),
            None => info!("No word boundary info, word alignment disabled"),
        }

        // The CARPA model is what enables rescoring; G.fst alone is not enough.
        let rescore = match (optional(&dir, RESCORE_LM_FST), optional(&dir, RESCORE_CARPA)) {
            (Some(lm_fst), Some(carpa)) => {
                info!("Rescoring enabled with {} and {}", lm_fst.display(), carpa.display());
                Some(RescoreArtifacts { lm_fst, carpa })
            }
            _ => {
                info!("No rescoring model, lattice rescoring disabled");
                None
            }
        };

        Ok(Self {
            dir,
            acoustic_model,
            decoding_graph,
            word_symbols,
            word_boundary,
            rescore,
        })
    }

    pub fn has_word_alignment(&self) -> bool {
        self.word_boundary.is_some()
    }

    pub fn has_rescoring(&self) -> bool {
        self.rescore.is_some()
    }
}

fn require(dir: &Path, name: &'static str) -> Result<PathBuf, ModelError> {
    let path = dir.join(name);
    if path.is_file() {
        Ok(path)
    } else {
        Err(ModelError::MissingArtifact { name, path })
    }
}

fn optional(dir: &Path, name: &str) -> Option<PathBuf> {
    let path = dir.join(name);
    path.is_file().then_some(path)
}
