//! Bounded retry against provider rate limiting.
//!
//! Only rate-limit errors (HTTP 429, `RESOURCE_EXHAUSTED`, or a retry-info
//! hint) are retried. The delay before the next attempt is the provider's
//! hint when present, otherwise `attempt × backoff_step`. Any other error
//! ends the loop at once. The loop never fails: when it gives up, the
//! outcome's tier is the `medium` fallback.
//!
//! The loop is an explicit state machine over [`RetryContext`], so backoff
//! decisions ([`next_step`]) can be tested without a model or a clock.

use std::time::Duration;

use crate::api::error::ModelError;
use crate::risk::clock::Clock;
use crate::risk::events::{EvaluatorEvent, EventHandler};
use crate::risk::parser::parse_response;
use crate::risk::throttle::Throttler;
use crate::risk::tier::RiskTier;
use crate::runtime::{ModelKind, ModelParams, ModelService};

/// Default number of attempts per classification.
pub const MAX_ATTEMPTS: u32 = 3;

/// Default linear backoff step.
pub const BACKOFF_STEP: Duration = Duration::from_millis(2000);

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first (minimum 1).
    pub max_attempts: u32,
    /// Delay multiplied by the attempt number when the provider gives no hint.
    pub backoff_step: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            backoff_step: BACKOFF_STEP,
        }
    }
}

impl RetryConfig {
    /// Create a config with the given number of attempts.
    pub fn with_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            ..Default::default()
        }
    }

    /// Linear delay after the given failed attempt (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt)
    }

    /// Delay after a rate-limited attempt: the provider hint wins.
    pub fn delay_for(&self, attempt: u32, error: &ModelError) -> (Duration, bool) {
        match error.retry_hint() {
            Some(hint) => (hint, true),
            None => (self.delay_for_attempt(attempt), false),
        }
    }

    fn attempt_limit(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Per-invocation retry state.
#[derive(Debug, Clone, Default)]
pub struct RetryContext {
    /// Attempts made so far.
    pub attempt: u32,
    pub last_error: Option<ModelError>,
    /// Delay computed after the most recent rate-limited attempt.
    pub delay: Option<Duration>,
}

/// How an invocation sequence ended.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationOutcome {
    /// The model answered; the tier is the parsed answer.
    Classified { tier: RiskTier, attempts: u32 },
    /// Every attempt was rate limited.
    Exhausted { attempts: u32, last_error: ModelError },
    /// A non-rate-limit error stopped the loop early.
    Aborted { attempts: u32, error: ModelError },
}

impl InvocationOutcome {
    /// The tier to report; `medium` unless the model answered.
    pub fn tier(&self) -> RiskTier {
        match self {
            InvocationOutcome::Classified { tier, .. } => *tier,
            _ => RiskTier::FALLBACK,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            InvocationOutcome::Classified { attempts, .. }
            | InvocationOutcome::Exhausted { attempts, .. }
            | InvocationOutcome::Aborted { attempts, .. } => *attempts,
        }
    }

    /// Whether the tier is the fallback rather than a model answer.
    pub fn is_fallback(&self) -> bool {
        !matches!(self, InvocationOutcome::Classified { .. })
    }
}

/// What the loop does after a failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStep {
    /// Sleep, then try again.
    Backoff { delay: Duration, hinted: bool },
    /// Stop with this outcome.
    Stop(InvocationOutcome),
}

/// Decide the next step after `error` on attempt `ctx.attempt`.
pub fn next_step(ctx: &mut RetryContext, config: &RetryConfig, error: ModelError) -> RetryStep {
    let attempts = ctx.attempt;
    if !error.is_rate_limited() {
        ctx.last_error = Some(error.clone());
        return RetryStep::Stop(InvocationOutcome::Aborted { attempts, error });
    }
    if attempts >= config.attempt_limit() {
        ctx.last_error = Some(error.clone());
        return RetryStep::Stop(InvocationOutcome::Exhausted {
            attempts,
            last_error: error,
        });
    }
    let (delay, hinted) = config.delay_for(attempts, &error);
    ctx.delay = Some(delay);
    ctx.last_error = Some(error);
    RetryStep::Backoff { delay, hinted }
}

enum RetryState {
    Invoke,
    Backoff(Duration),
    Done(InvocationOutcome),
}

/// Calls the model with throttle bookkeeping and rate-limit retries.
pub struct RetryingInvoker<'a> {
    pub model: &'a dyn ModelService,
    pub clock: &'a dyn Clock,
    pub throttler: &'a Throttler,
    pub config: &'a RetryConfig,
    pub events: &'a dyn EventHandler,
    /// Correlation id used in events.
    pub execution_id: &'a str,
}

impl RetryingInvoker<'_> {
    /// Run the attempt loop for `prompt`. Never fails.
    pub async fn invoke(&self, kind: ModelKind, prompt: &str) -> InvocationOutcome {
        let mut ctx = RetryContext::default();
        let mut state = RetryState::Invoke;

        loop {
            state = match state {
                RetryState::Invoke => {
                    ctx.attempt += 1;
                    self.throttler.record_call(self.clock);
                    match self.model.use_model(kind, ModelParams::new(prompt)).await {
                        Ok(raw) => RetryState::Done(InvocationOutcome::Classified {
                            tier: parse_response(&raw),
                            attempts: ctx.attempt,
                        }),
                        Err(error) => self.after_failure(&mut ctx, error),
                    }
                }
                RetryState::Backoff(delay) => {
                    self.clock.sleep(delay).await;
                    RetryState::Invoke
                }
                RetryState::Done(outcome) => return outcome,
            };
        }
    }

    fn after_failure(&self, ctx: &mut RetryContext, error: ModelError) -> RetryState {
        self.events.on_event(&EvaluatorEvent::AttemptFailed {
            execution_id: self.execution_id,
            attempt: ctx.attempt,
            max_attempts: self.config.attempt_limit(),
            error: &error,
            rate_limited: error.is_rate_limited(),
        });
        match next_step(ctx, self.config, error) {
            RetryStep::Backoff { delay, hinted } => {
                self.events.on_event(&EvaluatorEvent::BackingOff {
                    execution_id: self.execution_id,
                    attempt: ctx.attempt,
                    delay,
                    hinted,
                });
                RetryState::Backoff(delay)
            }
            RetryStep::Stop(outcome) => RetryState::Done(outcome),
        }
    }
}
