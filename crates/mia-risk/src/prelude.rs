//! Convenience re-exports for common `mia-risk` types.
//!
//! ```ignore
//! use mia_risk::prelude::*;
//! ```
//!
//! Covers what a host needs to wire the evaluator in: the client, runtime
//! contracts, the evaluator with its config and event handlers, and the
//! result types. Coordination primitives (cache, gate, throttle) are left
//! out; import those from [`crate::risk`] when needed.

// ── Client ──────────────────────────────────────────────────────────
pub use crate::api::{ModelError, ModelRouting, RetryConfig};
pub use crate::{ChatRequest, Message, OpenRouterClient};

// ── Host runtime ────────────────────────────────────────────────────
pub use crate::error::{MemoryError, RiskError};
pub use crate::runtime::{
    AgentRuntime, EvaluatorState, IncomingMessage, MemoryService, ModelKind, ModelParams,
    ModelService, SessionSummary,
};

// ── Evaluator ───────────────────────────────────────────────────────
pub use crate::risk::{
    CompositeEventHandler, EvaluationResult, EvaluatorConfig, EvaluatorEvent, EventHandler,
    FnEventHandler, KeywordModel, KeywordScreen, LoggingHandler, NoopHandler, RiskEvaluator,
    RiskTier,
};
