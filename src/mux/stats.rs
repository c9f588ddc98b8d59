use crate::engine::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of one session id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotStarted,
    Active,
    Finished,
}

/// Snapshot of a session's progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub id: SessionId,

    pub state: SessionState,

    /// When the first chunk arrived
    pub started_at: DateTime<Utc>,

    pub chunks_accepted: usize,

    pub samples_accepted: usize,

    /// Transcripts produced so far, consumed or not
    pub results_produced: usize,

    /// Transcripts waiting to be consumed
    pub results_pending: usize,

    /// Chunks still queued inside the engine
    pub engine_pending_chunks: usize,
}
