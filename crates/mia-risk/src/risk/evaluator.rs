//! The risk evaluator: the capability the host runtime calls per message.
//!
//! [`RiskEvaluator::handler`] runs the full pipeline:
//!
//! 1. Cache lookup by exact message text. A hit returns immediately.
//! 2. On a miss, everything else runs under the process-wide gate.
//! 3. Inside the gate: throttle, assemble history, build the prompt, run
//!    the retrying model invocation, parse the answer, cache the tier.
//! 4. A collaborator failure inside the gate is caught and reported as
//!    `success = false` with the `medium` fallback. Retry exhaustion is not
//!    a failure: it reports `success = true, level = medium`.
//!
//! Clones of an evaluator share one [`RiskCoordinator`], so the cache, gate,
//! and throttle apply across every caller that holds a clone.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::clock::{Clock, TokioClock};
use super::config::EvaluatorConfig;
use super::coordinator::RiskCoordinator;
use super::events::{EvaluatorEvent, EventHandler, LoggingHandler};
use super::history::assemble_history;
use super::prompt::build_classification_prompt;
use super::tier::RiskTier;
use crate::api::retry::{InvocationOutcome, RetryingInvoker};
use crate::api::tracing::generate_execution_id;
use crate::error::RiskError;
use crate::runtime::{AgentRuntime, EvaluatorState, IncomingMessage};

/// Evaluator name as registered with the host.
pub const EVALUATOR_NAME: &str = "RISK_EVALUATOR";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RiskData {
    pub level: RiskTier,
}

/// Result returned to the host.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EvaluationResult {
    pub success: bool,
    pub data: RiskData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvaluationResult {
    pub fn classified(level: RiskTier) -> Self {
        Self {
            success: true,
            data: RiskData { level },
            error: None,
        }
    }

    /// A failed run. The fallback tier is still populated.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: RiskData {
                level: RiskTier::FALLBACK,
            },
            error: Some(error.into()),
        }
    }

    pub fn level(&self) -> RiskTier {
        self.data.level
    }
}

#[derive(Clone)]
pub struct RiskEvaluator {
    coordinator: Arc<RiskCoordinator>,
    config: EvaluatorConfig,
    events: Arc<dyn EventHandler>,
}

impl RiskEvaluator {
    /// Create an evaluator on the tokio clock.
    pub fn new(config: EvaluatorConfig) -> Self {
        Self::with_clock(config, Arc::new(TokioClock))
    }

    /// Create an evaluator on a custom clock.
    pub fn with_clock(config: EvaluatorConfig, clock: Arc<dyn Clock>) -> Self {
        let coordinator = Arc::new(RiskCoordinator::new(config.min_call_spacing, clock));
        Self {
            coordinator,
            config,
            events: Arc::new(LoggingHandler),
        }
    }

    /// Replace the event handler (default: [`LoggingHandler`]).
    pub fn with_event_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.events = Arc::new(handler);
        self
    }

    pub fn name(&self) -> &'static str {
        EVALUATOR_NAME
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &RiskCoordinator {
        &self.coordinator
    }

    /// Whether this evaluator applies to `message`: it must carry
    /// non-empty text.
    pub fn validate(&self, message: &IncomingMessage) -> bool {
        message.text_content().is_some()
    }

    /// Classify `message`.
    pub async fn handler(
        &self,
        runtime: &AgentRuntime,
        message: &IncomingMessage,
        state: &EvaluatorState,
    ) -> EvaluationResult {
        let text = message.content.text.as_deref().unwrap_or_default();

        if let Some(tier) = self.coordinator.cache().get(text) {
            self.events.on_event(&EvaluatorEvent::CacheHit { text, tier });
            return EvaluationResult::classified(tier);
        }

        let room_id = message.room_id.as_deref().or(state.room_id());
        let execution_id = generate_execution_id();

        let outcome = self
            .coordinator
            .gate()
            .run(&execution_id, self.classify(runtime, text, room_id, &execution_id))
            .await;

        match outcome {
            Ok(tier) => EvaluationResult::classified(tier),
            Err(error) => {
                self.events.on_event(&EvaluatorEvent::Failed {
                    execution_id: &execution_id,
                    error: &error,
                });
                EvaluationResult::failed(error.to_string())
            }
        }
    }

    /// The gated part of a classification.
    async fn classify(
        &self,
        runtime: &AgentRuntime,
        text: &str,
        room_id: Option<&str>,
        execution_id: &str,
    ) -> Result<RiskTier, RiskError> {
        self.events
            .on_event(&EvaluatorEvent::GateAcquired { execution_id });

        let coordinator = &self.coordinator;
        let waited = coordinator
            .throttler()
            .wait_for_slot(coordinator.clock())
            .await;
        if !waited.is_zero() {
            self.events.on_event(&EvaluatorEvent::Throttled {
                execution_id,
                waited,
            });
        }

        let history = assemble_history(runtime, room_id, text).await?;
        self.events.on_event(&EvaluatorEvent::HistoryAssembled {
            execution_id,
            turns: history.len(),
        });

        let prompt = build_classification_prompt(&history, text);
        let outcome: InvocationOutcome = RetryingInvoker {
            model: runtime.model(),
            clock: coordinator.clock(),
            throttler: coordinator.throttler(),
            config: &self.config.retry,
            events: self.events.as_ref(),
            execution_id,
        }
        .invoke(self.config.model_kind, &prompt)
        .await;

        let tier = coordinator.cache().insert(text, outcome.tier());
        self.events.on_event(&EvaluatorEvent::Classified {
            execution_id,
            tier,
            attempts: outcome.attempts(),
            fallback: outcome.is_fallback(),
        });
        Ok(tier)
    }
}
