use super::error::MuxError;
use super::stats::SessionState;
use crate::engine::SessionId;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Whether an accepted chunk opens its session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Begin {
    First,
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finish {
    Finished,
    AlreadyFinished,
}

#[derive(Debug, Clone)]
pub(crate) struct SessionEntry {
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub chunks_accepted: usize,
    pub samples_accepted: usize,
}

/// Active and finished session ids.
///
/// An absent id is `NotStarted`. Finished ids stay until released so that
/// late audio is rejected rather than opening a second session under the
/// same id while results are still pending.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a chunk of `samples` for `id`, opening the session if needed.
    pub fn begin(&self, id: SessionId, samples: usize) -> Result<Begin, MuxError> {
        let mut sessions = self.sessions.lock();
        match sessions.get_mut(&id) {
            Some(entry) if entry.state == SessionState::Finished => {
                Err(MuxError::InvalidSession(id))
            }
            Some(entry) => {
                entry.chunks_accepted += 1;
                entry.samples_accepted += samples;
                Ok(Begin::Continue)
            }
            None => {
                sessions.insert(
                    id,
                    SessionEntry {
                        state: SessionState::Active,
                        started_at: Utc::now(),
                        chunks_accepted: 1,
                        samples_accepted: samples,
                    },
                );
                Ok(Begin::First)
            }
        }
    }

    pub fn finish(&self, id: SessionId) -> Result<Finish, MuxError> {
        let mut sessions = self.sessions.lock();
        match sessions.get_mut(&id) {
            None => Err(MuxError::UnknownSession(id)),
            Some(entry) if entry.state == SessionState::Finished => Ok(Finish::AlreadyFinished),
            Some(entry) => {
                entry.state = SessionState::Finished;
                Ok(Finish::Finished)
            }
        }
    }

    /// Forget a finished id so it can be reused. Active ids are kept.
    pub fn release(&self, id: SessionId) -> bool {
        let mut sessions = self.sessions.lock();
        match sessions.get(&id) {
            Some(entry) if entry.state == SessionState::Finished => {
                sessions.remove(&id);
                true
            }
            _ => false,
        }
    }

    /// Forget `id` whatever its state, for a session the engine never opened
    pub fn discard(&self, id: SessionId) -> bool {
        self.sessions.lock().remove(&id).is_some()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.lock().contains_key(&id)
    }

    pub fn state(&self, id: SessionId) -> SessionState {
        self.sessions
            .lock()
            .get(&id)
            .map_or(SessionState::NotStarted, |e| e.state)
    }

    pub(crate) fn entry(&self, id: SessionId) -> Option<SessionEntry> {
        self.sessions.lock().get(&id).cloned()
    }

    pub fn ids_in_state(&self, state: SessionState) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self
            .sessions
            .lock()
            .iter()
            .filter(|(_, e)| e.state == state)
            .map(|(&id, _)| id)
            .collect();
        ids.sort_unstable();
        ids
    }
}
