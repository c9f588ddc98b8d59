use serde::{Deserialize, Serialize};

/// A recognized word with its absolute position in the stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptWord {
    pub word: String,

    /// Start time in seconds from the beginning of the session
    pub start: f32,

    /// End time in seconds from the beginning of the session
    pub end: f32,

    /// Confidence in [0, 1]
    pub conf: f32,
}

/// Structured result for one finalized segment.
///
/// Serializes as `{"text": ..., "result": [...]}`. `result` is omitted for
/// a segment with no words (silence).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub result: Vec<TranscriptWord>,
}

impl Transcript {
    pub fn from_words(words: Vec<TranscriptWord>) -> Self {
        let text = words
            .iter()
            .map(|w| w.word.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        Self { text, result: words }
    }

    pub fn words(&self) -> &[TranscriptWord] {
        &self.result
    }

    pub fn is_silence(&self) -> bool {
        self.result.is_empty()
    }

    pub fn to_json(&self) -> String {
        // Non-finite floats serialize as null, so this cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}
