//! Session multiplexing over the shared engine
//!
//! This module provides the `SessionMultiplexer` that manages:
//! - Session lifecycle (first chunk, continuation, finish)
//! - Routing engine callbacks into per-session result queues
//! - Result polling and consumption for external consumers

mod error;
mod multiplexer;
mod queue;
mod registry;
mod stats;

pub use error::MuxError;
pub use multiplexer::SessionMultiplexer;
pub use queue::ResultQueue;
pub use registry::{Begin, Finish, SessionRegistry};
pub use stats::{SessionState, SessionStats};
