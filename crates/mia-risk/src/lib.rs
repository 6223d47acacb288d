//! Mental-health risk classification for a conversational support agent.
//!
//! `mia-risk` classifies every incoming user message as `low`, `medium`, or
//! `high` risk by asking a language model, and returns the tier to the host
//! agent runtime. The core abstraction is the
//! [`RiskEvaluator`](risk::evaluator::RiskEvaluator), which wraps the model
//! call in four safeguards:
//!
//! - a cache keyed by exact message text, so a repeated message never costs
//!   a second upstream call,
//! - a process-wide gate admitting one classification at a time,
//! - a throttle keeping upstream calls at least 2 s apart,
//! - a bounded retry on rate-limit errors that honors the provider's delay
//!   hint.
//!
//! The evaluator never fails toward "no risk": anything it cannot read
//! becomes `medium`.
//!
//! # Getting started
//!
//! ```ignore
//! use mia_risk::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     let api_key = std::env::var("OPENROUTER_KEY").map_err(|e| e.to_string())?;
//!     let client = OpenRouterClient::new(api_key)?;
//!     let runtime = AgentRuntime::new(Arc::new(client));
//!
//!     let evaluator = RiskEvaluator::new(EvaluatorConfig::default());
//!     let message = IncomingMessage::text("Eu me sinto muito sozinha");
//!     if evaluator.validate(&message) {
//!         let result = evaluator
//!             .handler(&runtime, &message, &EvaluatorState::default())
//!             .await;
//!         println!("{}", result.level());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`risk`] | [`RiskEvaluator`](risk::evaluator::RiskEvaluator), cache, gate, throttle, history, prompt, parser, keyword screen, events |
//! | [`api`] | [`ModelError`](api::error::ModelError), retry loop, model routing, execution ids |
//! | [`runtime`] | Host contracts: [`ModelService`](runtime::ModelService), [`MemoryService`](runtime::MemoryService), messages |
//! | [`error`] | [`RiskError`](error::RiskError) and collaborator errors |

pub mod api;
pub mod error;
pub mod prelude;
pub mod risk;
pub mod runtime;

use reqwest::header::RETRY_AFTER;
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use api::error::ModelError;
use api::router::ModelRouting;
use risk::history::USER_ROLE;
use runtime::{ModelFuture, ModelKind, ModelParams, ModelService};

// ── Constants ──────────────────────────────────────────────────────

pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default model for classification calls.
pub const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-001";

/// A one-word answer needs very few tokens.
pub const CLASSIFICATION_MAX_TOKENS: u32 = 8;

/// Classification should be deterministic.
pub const CLASSIFICATION_TEMPERATURE: f32 = 0.0;

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ChatRequest {
    /// A single-turn classification request for `prompt`.
    pub fn classification(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![Message::user(prompt)],
            max_tokens: CLASSIFICATION_MAX_TOKENS,
            temperature: CLASSIFICATION_TEMPERATURE,
        }
    }
}

// ── Message types ──────────────────────────────────────────────────

/// A single chat message. Classification requests only send user turns.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: &'static str,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: USER_ROLE,
            content: content.into(),
        }
    }
}

// ── Client ─────────────────────────────────────────────────────────

/// OpenRouter-backed [`ModelService`].
///
/// Returns the raw chat-completion body; the evaluator's parser reads the
/// answer out of `choices[0].message.content`.
pub struct OpenRouterClient {
    pub(crate) client: reqwest::Client,
    pub(crate) api_key: String,
    pub(crate) referer: String,
    pub(crate) title: String,
    routing: ModelRouting,
}

impl OpenRouterClient {
    /// Create a new client with the given API key and default headers.
    pub fn new(api_key: impl Into<String>) -> Result<Self, String> {
        Self::with_headers(api_key, "https://github.com/mia-risk", "mia-risk")
    }

    /// Create a new client with custom Referer and X-Title headers.
    pub fn with_headers(
        api_key: impl Into<String>,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent("mia-risk/0.1")
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            referer: referer.into(),
            title: title.into(),
            routing: ModelRouting::default(),
        })
    }

    /// Set the model routing (builder pattern).
    pub fn with_routing(mut self, routing: ModelRouting) -> Self {
        self.routing = routing;
        self
    }

    pub fn routing(&self) -> &ModelRouting {
        &self.routing
    }

    /// Send a chat completion request and return the raw response body.
    pub async fn complete_raw(&self, body: &ChatRequest) -> Result<Value, ModelError> {
        debug!(
            "LLM request: model={}, messages={}, max_tokens={}, temp={}",
            body.model,
            body.messages.len(),
            body.max_tokens,
            body.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(OPENROUTER_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(body)
            .send()
            .await
            .map_err(ModelError::transport)?;

        let status = resp.status().as_u16();
        let retry_after = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let text = resp
            .text()
            .await
            .map_err(|e| ModelError::new(format!("failed to read response: {e}")))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        read_response(status, &text, retry_after)
    }
}

impl ModelService for OpenRouterClient {
    fn use_model(&self, kind: ModelKind, params: ModelParams) -> ModelFuture<'_> {
        Box::pin(async move {
            let body = ChatRequest::classification(self.routing.model_for(kind), params.prompt);
            self.complete_raw(&body).await
        })
    }
}

/// `Retry-After` in delta-seconds form. HTTP dates are ignored.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Turn an HTTP status and body into the raw answer or a [`ModelError`].
///
/// OpenRouter sometimes reports upstream failures inside a 200 body as
/// `{"error": {"code": 429, ...}}`; the embedded code then wins.
fn read_response(
    status: u16,
    text: &str,
    retry_after: Option<Duration>,
) -> Result<Value, ModelError> {
    if !(200..300).contains(&status) {
        return Err(ModelError::from_http(status, text, retry_after));
    }

    let parsed: Value = serde_json::from_str(text)
        .map_err(|e| ModelError::new(format!("failed to parse response: {e}")).with_status(status))?;

    if let Some(err) = parsed.get("error").filter(|e| !e.is_null()) {
        let embedded = err
            .get("code")
            .and_then(Value::as_u64)
            .and_then(|c| u16::try_from(c).ok())
            .unwrap_or(status);
        return Err(ModelError::from_http(embedded, text, retry_after));
    }

    Ok(parsed)
}
