//! Conversation context for the classification prompt.
//!
//! With a memory service and a room id, the history is the room's prior
//! session summaries followed by the incoming message. Without either, it
//! degrades to a single user turn. Memory-service failures are returned to
//! the caller, not absorbed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::RiskError;
use crate::runtime::{AgentRuntime, MEMORY_SERVICE, SessionSummary};

/// Role assigned to the incoming message.
pub const USER_ROLE: &str = "user";

/// One turn of conversation context, oldest first.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HistoryTurn {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryTurn {
    pub fn user(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role: USER_ROLE.to_string(),
            content: content.into(),
            timestamp,
        }
    }

    /// Map a stored summary to a turn.
    ///
    /// Summaries without a timestamp take `fallback_ts` so the sequence
    /// stays renderable.
    pub fn from_summary(summary: &SessionSummary, fallback_ts: DateTime<Utc>) -> Self {
        Self {
            role: summary.role.clone(),
            content: summary_text(&summary.content),
            timestamp: summary.timestamp.unwrap_or(fallback_ts),
        }
    }
}

/// Best-effort text of a summary's content.
fn summary_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => match other.get("text").and_then(Value::as_str) {
            Some(text) => text.to_string(),
            None => other.to_string(),
        },
    }
}

/// Build the history for `message` in `room_id`.
pub async fn assemble_history(
    runtime: &AgentRuntime,
    room_id: Option<&str>,
    message: &str,
) -> Result<Vec<HistoryTurn>, RiskError> {
    let now = Utc::now();

    let (Some(memory), Some(room_id)) = (runtime.get_service(MEMORY_SERVICE), room_id) else {
        debug!("No memory service or room id; using single-turn history");
        return Ok(vec![HistoryTurn::user(message, now)]);
    };

    let summaries = memory
        .get_session_summaries(room_id)
        .await
        .map_err(|source| RiskError::HistoryFetch {
            room_id: room_id.to_string(),
            source,
        })?;

    let mut turns: Vec<HistoryTurn> = summaries
        .iter()
        .map(|s| HistoryTurn::from_summary(s, now))
        .collect();
    turns.push(HistoryTurn::user(message, now));

    debug!("Assembled {} history turn(s) for room {room_id}", turns.len());
    Ok(turns)
}
