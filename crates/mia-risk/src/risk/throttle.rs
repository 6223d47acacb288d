//! Minimum spacing between upstream model calls.
//!
//! One shared "last call" timestamp for the whole process. Before a
//! classification run calls the model, it waits until `min_spacing` has
//! passed since that timestamp; every invocation then records a fresh
//! timestamp immediately before it goes out.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use super::clock::Clock;

/// Default spacing between calls.
pub const MIN_CALL_SPACING: Duration = Duration::from_millis(2000);

#[derive(Debug)]
pub struct Throttler {
    min_spacing: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Throttler {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            min_spacing,
            last_call: Mutex::new(None),
        }
    }

    pub fn min_spacing(&self) -> Duration {
        self.min_spacing
    }

    /// Timestamp recorded before the most recent call.
    pub fn last_call(&self) -> Option<Instant> {
        *self.last_call.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// How long a call made at `now` would have to wait.
    pub fn required_wait(&self, now: Instant) -> Duration {
        match self.last_call() {
            Some(last) => self
                .min_spacing
                .saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    /// Suspend until the spacing since the last call has elapsed.
    ///
    /// Returns the time waited.
    pub async fn wait_for_slot(&self, clock: &dyn Clock) -> Duration {
        let wait = self.required_wait(clock.now());
        if !wait.is_zero() {
            debug!("Throttling model call for {}ms", wait.as_millis());
            clock.sleep(wait).await;
        }
        wait
    }

    /// Record that a call is about to go out.
    pub fn record_call(&self, clock: &dyn Clock) {
        *self.last_call.lock().unwrap_or_else(PoisonError::into_inner) = Some(clock.now());
    }
}

impl Default for Throttler {
    fn default() -> Self {
        Self::new(MIN_CALL_SPACING)
    }
}
