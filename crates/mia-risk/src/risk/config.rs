//! Configuration for the [`RiskEvaluator`](super::evaluator::RiskEvaluator).
//!
//! Defaults match the provider limits the engine was tuned for: 2 s between
//! calls, 3 attempts, 2 s linear backoff step. Override with the builder
//! methods:
//!
//! ```ignore
//! let config = EvaluatorConfig::default()
//!     .with_min_call_spacing(Duration::from_millis(500))
//!     .with_max_attempts(5)
//!     .with_model_kind(ModelKind::TextLarge);
//! ```

use std::time::Duration;

use super::throttle::MIN_CALL_SPACING;
use crate::api::retry::RetryConfig;
use crate::runtime::ModelKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatorConfig {
    /// Minimum spacing between upstream model calls. Default: 2000 ms.
    pub min_call_spacing: Duration,
    /// Retry policy for rate-limited calls.
    pub retry: RetryConfig,
    /// Model class requested from the host. Default: `TextSmall`.
    pub model_kind: ModelKind,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            min_call_spacing: MIN_CALL_SPACING,
            retry: RetryConfig::default(),
            model_kind: ModelKind::TextSmall,
        }
    }
}

impl EvaluatorConfig {
    pub fn with_min_call_spacing(mut self, spacing: Duration) -> Self {
        self.min_call_spacing = spacing;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.retry.max_attempts = attempts;
        self
    }

    pub fn with_backoff_step(mut self, step: Duration) -> Self {
        self.retry.backoff_step = step;
        self
    }

    pub fn with_model_kind(mut self, kind: ModelKind) -> Self {
        self.model_kind = kind;
        self
    }
}
