//! The risk classification engine.
//!
//! - [`evaluator`] — the host-facing [`RiskEvaluator`] (`validate`, `handler`)
//! - [`coordinator`] — shared cache, gate, throttle, and clock
//! - [`cache`], [`gate`], [`throttle`] — the coordination primitives
//! - [`history`], [`prompt`], [`parser`] — building the request and reading the answer
//! - [`keywords`] — local keyword screen and the offline model
//! - [`events`] — observation hooks

pub mod cache;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod evaluator;
pub mod events;
pub mod gate;
pub mod history;
pub mod keywords;
pub mod parser;
pub mod prompt;
pub mod throttle;
pub mod tier;

pub use cache::RiskCache;
pub use clock::{Clock, ManualClock, TokioClock};
pub use config::EvaluatorConfig;
pub use coordinator::RiskCoordinator;
pub use evaluator::{EVALUATOR_NAME, EvaluationResult, RiskData, RiskEvaluator};
pub use events::{
    CompositeEventHandler, EvaluatorEvent, EventHandler, FnEventHandler, LoggingHandler,
    NoopHandler,
};
pub use gate::ConcurrencyGate;
pub use history::{HistoryTurn, assemble_history};
pub use keywords::{KeywordModel, KeywordScreen};
pub use parser::parse_response;
pub use prompt::build_classification_prompt;
pub use throttle::{MIN_CALL_SPACING, Throttler};
pub use tier::RiskTier;
