//! Correlation ids for classification runs.
//!
//! Every gated run gets an execution id that doubles as the gate's
//! in-flight marker and prefixes the run's log lines. Ids read as
//! `rk-<utc timestamp>-<sequence>`, so log lines sort by start time and a
//! burst within one millisecond still gets distinct ids.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

const EXECUTION_PREFIX: &str = "rk";

static NEXT_EXECUTION: AtomicU64 = AtomicU64::new(1);

/// Generate a unique execution id.
pub fn generate_execution_id() -> String {
    let seq = NEXT_EXECUTION.fetch_add(1, Ordering::Relaxed);
    format_execution_id(Utc::now(), seq)
}

fn format_execution_id(started: DateTime<Utc>, seq: u64) -> String {
    format!(
        "{EXECUTION_PREFIX}-{}-{seq:04x}",
        started.format("%Y%m%dT%H%M%S%.3fZ")
    )
}
