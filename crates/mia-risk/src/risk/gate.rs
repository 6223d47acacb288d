//! Process-wide single-flight gate for classification runs.
//!
//! At most one classification executes at a time, across all messages,
//! rooms, and callers. Waiters are admitted in FIFO order (tokio's mutex is
//! fair). The gate is deliberately global rather than per key: it keeps the
//! throttler's single timestamp meaningful against a rate-limited provider.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

#[derive(Debug, Default)]
pub struct ConcurrencyGate {
    slot: AsyncMutex<()>,
    /// Id of the execution currently holding the gate.
    in_flight: Mutex<Option<String>>,
}

impl ConcurrencyGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` once no other execution is in flight.
    ///
    /// The in-flight marker is set to `execution_id` for the duration of the
    /// run and cleared on every exit path, including panics and drops.
    pub async fn run<F, T>(&self, execution_id: &str, work: F) -> T
    where
        F: Future<Output = T>,
    {
        let _slot = match self.slot.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!(
                    "{execution_id}: waiting for in-flight classification {}",
                    self.in_flight().unwrap_or_default()
                );
                self.slot.lock().await
            }
        };
        let _marker = InFlightMarker::set(&self.in_flight, execution_id);
        work.await
    }

    /// Id of the execution currently running, if any.
    pub fn in_flight(&self) -> Option<String> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether an execution currently holds the gate.
    pub fn is_busy(&self) -> bool {
        self.in_flight().is_some()
    }
}

/// Clears the in-flight marker when dropped.
struct InFlightMarker<'a> {
    slot: &'a Mutex<Option<String>>,
}

impl<'a> InFlightMarker<'a> {
    fn set(slot: &'a Mutex<Option<String>>, execution_id: &str) -> Self {
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(execution_id.to_string());
        Self { slot }
    }
}

impl Drop for InFlightMarker<'_> {
    fn drop(&mut self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
