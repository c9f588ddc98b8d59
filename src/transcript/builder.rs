use super::{Transcript, TranscriptConfig, TranscriptWord};
use crate::engine::SegmentResult;
use crate::lattice::{Lattice, LatticeError};
use crate::model::SymbolTable;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

const UNKNOWN_WORD: &str = "<unk>";

#[derive(Error, Debug)]
pub enum TranscriptError {
    #[error("segment has no lattice")]
    EmptyLattice,

    #[error("invalid lattice: {0}")]
    InvalidLattice(#[from] LatticeError),

    #[error("word alignment failed: {0}")]
    Alignment(String),

    #[error("hypothesis has {words} words but {confidences} confidences and {times} time spans")]
    MismatchedHypothesis {
        words: usize,
        confidences: usize,
        times: usize,
    },
}

/// Best word sequence extracted from a lattice.
///
/// The three vectors are parallel; `times` are decoder-frame spans.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OneBest {
    pub words: Vec<u32>,
    pub confidences: Vec<f32>,
    pub times: Vec<(f32, f32)>,
}

/// Re-segments lattice arcs on word boundaries using the model's
/// word-boundary info. Only present when that artifact exists.
pub trait WordAligner: Send + Sync {
    fn align(&self, lattice: &Lattice) -> Result<Lattice, TranscriptError>;
}

/// Picks the transcript hypothesis from a (scaled, aligned) lattice
pub trait HypothesisExtractor: Send + Sync {
    fn one_best(&self, lattice: &Lattice) -> Result<OneBest, TranscriptError>;
}

/// Minimum-Bayes-risk style selection over arc posteriors.
///
/// Each word arc gets the posterior mass `p` of all same-word arcs that
/// overlap it in time, the probability the word is correct at that
/// position. Emitting it gains `p` expected correct words and risks `1 - p`
/// of an insertion, so the arc scores `2p - 1` and epsilon arcs score 0.
/// The chosen path maximises the summed score, which keeps a word only
/// where it is more likely than its absence.
#[derive(Debug, Clone, Default)]
pub struct PosteriorBestPath;

impl PosteriorBestPath {
    fn word_posteriors(lattice: &Lattice, arc_posteriors: &[f64]) -> Vec<f64> {
        let mut by_word: HashMap<u32, Vec<usize>> = HashMap::new();
        for (i, arc) in lattice.arcs.iter().enumerate() {
            if !arc.is_epsilon() {
                by_word.entry(arc.word).or_default().push(i);
            }
        }

        let mut scores = vec![0.0; lattice.arcs.len()];
        for group in by_word.values() {
            for &i in group {
                let a = &lattice.arcs[i];
                let mass: f64 = group
                    .iter()
                    .filter(|&&j| {
                        let b = &lattice.arcs[j];
                        a.start_frame.max(b.start_frame) < a.end_frame.min(b.end_frame)
                            || (a.start_frame == b.start_frame && a.end_frame == b.end_frame)
                    })
                    .map(|&j| arc_posteriors[j])
                    .sum();
                scores[i] = mass.min(1.0);
            }
        }
        scores
    }
}

impl HypothesisExtractor for PosteriorBestPath {
    fn one_best(&self, lattice: &Lattice) -> Result<OneBest, TranscriptError> {
        let arc_posteriors = lattice.posteriors()?;
        let scores = Self::word_posteriors(lattice, &arc_posteriors);
        let gains: Vec<f64> = lattice
            .arcs
            .iter()
            .zip(&scores)
            .map(|(arc, &p)| if arc.is_epsilon() { 0.0 } else { 2.0 * p - 1.0 })
            .collect();

        let mut order: Vec<usize> = (0..lattice.arcs.len()).collect();
        order.sort_by_key(|&i| lattice.arcs[i].from);

        // best[s] = (score, incoming arc) over paths from start to s
        let mut best: Vec<Option<(f64, Option<usize>)>> = vec![None; lattice.num_states];
        best[lattice.start] = Some((0.0, None));
        for &i in &order {
            let arc = &lattice.arcs[i];
            // Arcs with zero posterior lie on no successful path.
            if arc_posteriors[i] <= 0.0 {
                continue;
            }
            let Some((score, _)) = best[arc.from] else {
                continue;
            };
            let candidate = score + gains[i];
            if best[arc.to].map_or(true, |(current, _)| candidate > current) {
                best[arc.to] = Some((candidate, Some(i)));
            }
        }

        let end = lattice
            .finals
            .iter()
            .filter_map(|&(state, _)| best[state].map(|(score, _)| (state, score)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(state, _)| state)
            .ok_or(LatticeError::NoSuccessfulPath)?;

        let mut path = Vec::new();
        let mut state = end;
        while let Some((_, Some(arc_index))) = best[state] {
            path.push(arc_index);
            state = lattice.arcs[arc_index].from;
        }
        path.reverse();

        let mut one_best = OneBest::default();
        for i in path {
            let arc = &lattice.arcs[i];
            if arc.is_epsilon() {
                continue;
            }
            one_best.words.push(arc.word);
            one_best.confidences.push(scores[i] as f32);
            one_best
                .times
                .push((arc.start_frame as f32, arc.end_frame as f32));
        }

        Ok(one_best)
    }
}

/// Turns finalized decoding results into transcripts.
///
/// Shared by every session's finalize callback; holds only immutable state.
pub struct TranscriptBuilder {
    symbols: Arc<SymbolTable>,
    config: TranscriptConfig,
    aligner: Option<Arc<dyn WordAligner>>,
    extractor: Arc<dyn HypothesisExtractor>,
}

impl TranscriptBuilder {
    pub fn new(symbols: Arc<SymbolTable>, config: TranscriptConfig) -> Self {
        Self {
            symbols,
            config,
            aligner: None,
            extractor: Arc::new(PosteriorBestPath),
        }
    }

    pub fn with_aligner(mut self, aligner: Arc<dyn WordAligner>) -> Self {
        self.aligner = Some(aligner);
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn HypothesisExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &TranscriptConfig {
        &self.config
    }

    pub fn build(&self, segment: SegmentResult) -> Result<Transcript, TranscriptError> {
        let lattice = segment.lattice.ok_or(TranscriptError::EmptyLattice)?;
        self.build_from_lattice(lattice, segment.time_offset)
    }

    /// Scale, align, pick the best hypothesis and convert frames to
    /// absolute seconds (`time_offset` is where the segment starts in the
    /// stream).
    pub fn build_from_lattice(
        &self,
        mut lattice: Lattice,
        time_offset: f32,
    ) -> Result<Transcript, TranscriptError> {
        if lattice.is_empty() {
            return Err(TranscriptError::EmptyLattice);
        }
        lattice.validate()?;

        lattice.scale_graph_costs(self.config.lattice_scale);

        let aligned = match &self.aligner {
            Some(aligner) => aligner.align(&lattice)?,
            None => lattice,
        };

        let best = self.extractor.one_best(&aligned)?;
        if best.words.len() != best.confidences.len() || best.words.len() != best.times.len() {
            return Err(TranscriptError::MismatchedHypothesis {
                words: best.words.len(),
                confidences: best.confidences.len(),
                times: best.times.len(),
            });
        }

        let frame = self.config.frame_duration();
        let words = best
            .words
            .iter()
            .zip(&best.confidences)
            .zip(&best.times)
            .map(|((&id, &conf), &(start, end))| TranscriptWord {
                word: self.word_text(id),
                start: start.round() * frame + time_offset,
                end: end.round() * frame + time_offset,
                conf: conf.clamp(0.0, 1.0),
            })
            .collect();

        let transcript = Transcript::from_words(words);
        debug!("Built transcript: {:?}", transcript.text);
        Ok(transcript)
    }

    fn word_text(&self, id: u32) -> String {
        match self.symbols.find(id) {
            Some(word) => word.to_string(),
            None => {
                warn!("Word id {} not in symbol table", id);
                UNKNOWN_WORD.to_string()
            }
        }
    }
}
