//! Errors raised by host collaborators inside a classification run.
//!
//! Model-call failures live in [`crate::api::error`]; they never escape the
//! retry loop. The errors here are the ones the evaluator catches and turns
//! into a `success = false` result.

use thiserror::Error;

/// Failure reported by the memory / session service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("memory service error: {0}")]
pub struct MemoryError(pub String);

impl MemoryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors that abort a gated classification run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RiskError {
    /// The session summaries for the room could not be fetched.
    #[error("failed to fetch session summaries for room {room_id}: {source}")]
    HistoryFetch {
        room_id: String,
        #[source]
        source: MemoryError,
    },
}
