use super::{SegmentResult, SessionId};

/// Per-session decoding state inside the engine (feature pipeline, search
/// state, endpoint detection).
pub trait StreamDecoder: Send {
    /// Decode more audio. Returns segments finalized by endpoints found in
    /// this audio, oldest first.
    fn accept(&mut self, samples: &[f32]) -> Vec<SegmentResult>;

    /// Flush buffered audio at end of stream and return the remaining
    /// segments.
    fn finish(&mut self) -> Vec<SegmentResult>;
}

/// One session's share of a decoding batch
pub struct BatchItem {
    pub id: SessionId,
    pub stream: Box<dyn StreamDecoder>,
    pub samples: Vec<f32>,
    pub is_last: bool,
    /// Filled in by [`Recognizer::decode_batch`]
    pub results: Vec<SegmentResult>,
}

/// The acoustic model and search shared by every session.
///
/// Implementations are immutable after load; per-session state lives in the
/// `StreamDecoder`s they open.
pub trait Recognizer: Send + Sync {
    fn open_stream(&self, id: SessionId) -> Box<dyn StreamDecoder>;

    /// Decode one chunk for every item in the batch.
    ///
    /// The default runs the streams one after another; a GPU-backed
    /// recognizer overrides this to evaluate the batch in one pass.
    fn decode_batch(&self, batch: &mut [BatchItem]) {
        for item in batch.iter_mut() {
            let mut results = item.stream.accept(&item.samples);
            if item.is_last {
                results.extend(item.stream.finish());
            }
            item.results = results;
        }
    }
}
