use crate::engine::{EngineError, SessionId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MuxError {
    /// Audio for a session that has already been finished
    #[error("session {0} is finished and accepts no more audio")]
    InvalidSession(SessionId),

    #[error("session {0} was never started")]
    UnknownSession(SessionId),

    #[error("engine rejected chunk: {0}")]
    Engine(#[from] EngineError),
}
