use tracing::warn;

/// One bounded unit of mono 16-bit PCM audio for a session.
///
/// The sample rate is fixed by the engine's feature configuration; chunks
/// carry samples only. An empty chunk is valid and is what a session flush
/// pushes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioChunk {
    samples: Vec<i16>,
}

impl AudioChunk {
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    /// Chunk with no samples (end-of-stream marker)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Decode little-endian 16-bit PCM bytes.
    ///
    /// A trailing odd byte cannot form a sample and is dropped.
    pub fn from_le_bytes(bytes: &[u8]) -> Self {
        if bytes.len() % 2 != 0 {
            warn!(
                "PCM payload has odd length {}, dropping trailing byte",
                bytes.len()
            );
        }

        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        Self { samples }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    /// Samples widened to f32 without normalisation, the way feature
    /// extraction consumes raw PCM.
    pub fn to_f32(&self) -> Vec<f32> {
        self.samples.iter().map(|&s| s as f32).collect()
    }
}

impl From<Vec<i16>> for AudioChunk {
    fn from(samples: Vec<i16>) -> Self {
        Self::new(samples)
    }
}
