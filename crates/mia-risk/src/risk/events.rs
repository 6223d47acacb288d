//! Events and handlers for observing the [`RiskEvaluator`](super::evaluator::RiskEvaluator).
//!
//! The evaluator reports every step of a classification as an
//! [`EvaluatorEvent`]: cache hits, gate admission, throttle waits, failed
//! attempts, backoff, and the final outcome. Callers implement
//! [`EventHandler`] to log, count, or assert on them.
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or silent embedding |
//! | [`LoggingHandler`] | Structured logging via `tracing` (the default) |
//! | [`FnEventHandler`] | Quick closures, e.g. counting attempts |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |

use std::time::Duration;
use tracing::{debug, info, warn};

use super::tier::RiskTier;
use crate::api::error::ModelError;
use crate::error::RiskError;

/// Events emitted during a classification.
#[derive(Debug)]
pub enum EvaluatorEvent<'a> {
    /// The tier was served from the cache; no upstream call.
    CacheHit { text: &'a str, tier: RiskTier },
    /// This execution now holds the concurrency gate.
    GateAcquired { execution_id: &'a str },
    /// The throttler delayed the run before the first model call.
    Throttled { execution_id: &'a str, waited: Duration },
    /// Conversation history was assembled.
    HistoryAssembled { execution_id: &'a str, turns: usize },
    /// A model call failed.
    AttemptFailed {
        execution_id: &'a str,
        attempt: u32,
        max_attempts: u32,
        error: &'a ModelError,
        rate_limited: bool,
    },
    /// The retry loop is sleeping before the next attempt.
    BackingOff {
        execution_id: &'a str,
        attempt: u32,
        delay: Duration,
        hinted: bool,
    },
    /// A tier was obtained (possibly the fallback) and cached.
    Classified {
        execution_id: &'a str,
        tier: RiskTier,
        attempts: u32,
        fallback: bool,
    },
    /// The gated run failed; the result reports `success = false`.
    Failed {
        execution_id: &'a str,
        error: &'a RiskError,
    },
}

/// Handler for evaluator events.
///
/// # Example
///
/// ```ignore
/// struct AttemptCounter(AtomicU32);
///
/// impl EventHandler for AttemptCounter {
///     fn on_event(&self, event: &EvaluatorEvent<'_>) {
///         if let EvaluatorEvent::AttemptFailed { .. } = event {
///             self.0.fetch_add(1, Ordering::Relaxed);
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called for each event. The default implementation does nothing.
    fn on_event(&self, event: &EvaluatorEvent<'_>) {
        let _ = event;
    }
}

/// A no-op event handler.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// ```ignore
/// let handler = FnEventHandler::new(|event| {
///     if let EvaluatorEvent::Classified { tier, .. } = event {
///         println!("classified as {tier}");
///     }
/// });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&EvaluatorEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&EvaluatorEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&EvaluatorEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &EvaluatorEvent<'_>) {
        (self.0)(event)
    }
}

/// An event handler that delegates to multiple inner handlers, in
/// registration order.
///
/// ```ignore
/// let handler = CompositeEventHandler::new()
///     .with(LoggingHandler)
///     .with_if(verbose, progress_printer);
/// ```
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Add a handler to the chain.
    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Conditionally add a handler to the chain.
    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &EvaluatorEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// Logs every event through `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &EvaluatorEvent<'_>) {
        match event {
            EvaluatorEvent::CacheHit { text, tier } => {
                let preview: String = text.chars().take(60).collect();
                debug!("RISK_EVALUATOR: cache hit ({tier}) for \"{preview}\"");
            }
            EvaluatorEvent::GateAcquired { execution_id } => {
                debug!("{execution_id}: acquired classification gate");
            }
            EvaluatorEvent::Throttled {
                execution_id,
                waited,
            } => {
                debug!("{execution_id}: throttled for {}ms", waited.as_millis());
            }
            EvaluatorEvent::HistoryAssembled {
                execution_id,
                turns,
            } => {
                debug!("{execution_id}: {turns} history turn(s)");
            }
            EvaluatorEvent::AttemptFailed {
                execution_id,
                attempt,
                max_attempts,
                error,
                rate_limited,
            } => {
                if *rate_limited {
                    warn!("{execution_id}: rate limited on attempt {attempt}/{max_attempts}: {error}");
                } else {
                    warn!("{execution_id}: model call failed on attempt {attempt}/{max_attempts}, not retrying: {error}");
                }
            }
            EvaluatorEvent::BackingOff {
                execution_id,
                attempt,
                delay,
                hinted,
            } => {
                debug!(
                    "{execution_id}: backing off {}ms before attempt {} ({})",
                    delay.as_millis(),
                    attempt + 1,
                    if *hinted { "provider hint" } else { "linear" }
                );
            }
            EvaluatorEvent::Classified {
                execution_id,
                tier,
                attempts,
                fallback,
            } => {
                if *fallback {
                    warn!("{execution_id}: RISK_EVALUATOR: {tier} (fallback after {attempts} attempt(s))");
                } else {
                    info!("{execution_id}: RISK_EVALUATOR: {tier}");
                }
            }
            EvaluatorEvent::Failed {
                execution_id,
                error,
            } => {
                warn!("{execution_id}: RISK_EVALUATOR failed: {error}");
            }
        }
    }
}
