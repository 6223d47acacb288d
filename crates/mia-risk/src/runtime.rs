//! Contracts for the host runtime the evaluator plugs into.
//!
//! The host owns two collaborators the classifier depends on:
//!
//! - a [`ModelService`] that runs a prompt against a model and returns the
//!   provider's raw response, and
//! - an optional [`MemoryService`], looked up by name, that returns prior
//!   session summaries for a room.
//!
//! [`AgentRuntime`] bundles them. It is cheap to clone; clones share the
//! same services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::api::error::ModelError;
use crate::error::MemoryError;

/// Service name under which the memory collaborator is registered.
pub const MEMORY_SERVICE: &str = "memory";

/// Boxed future returned by [`ModelService::use_model`].
pub type ModelFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, ModelError>> + Send + 'a>>;

/// Boxed future returned by [`MemoryService::get_session_summaries`].
pub type SummaryFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<SessionSummary>, MemoryError>> + Send + 'a>>;

// ── Model service ──────────────────────────────────────────────────

/// Which class of model the host should route a request to.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    TextSmall,
    TextLarge,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::TextSmall => write!(f, "TEXT_SMALL"),
            ModelKind::TextLarge => write!(f, "TEXT_LARGE"),
        }
    }
}

/// Parameters of a single model call.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ModelParams {
    pub prompt: String,
}

impl ModelParams {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

/// A model invocation service.
///
/// The response is returned as raw JSON because providers differ: a bare
/// string, `{"text": ...}`, or a chat-completion body are all valid.
pub trait ModelService: Send + Sync {
    fn use_model(&self, kind: ModelKind, params: ModelParams) -> ModelFuture<'_>;
}

// ── Memory service ─────────────────────────────────────────────────

/// One prior conversation turn as stored by the memory service.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SessionSummary {
    pub role: String,
    /// Usually a string, sometimes an object with a `text` field.
    pub content: Value,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

pub trait MemoryService: Send + Sync {
    /// Prior session summaries for a room, oldest first.
    fn get_session_summaries(&self, room_id: &str) -> SummaryFuture<'_>;
}

// ── Runtime ────────────────────────────────────────────────────────

/// The host runtime handed to [`RiskEvaluator::handler`](crate::risk::evaluator::RiskEvaluator::handler).
#[derive(Clone)]
pub struct AgentRuntime {
    model: Arc<dyn ModelService>,
    services: HashMap<String, Arc<dyn MemoryService>>,
}

impl AgentRuntime {
    pub fn new(model: Arc<dyn ModelService>) -> Self {
        Self {
            model,
            services: HashMap::new(),
        }
    }

    /// Register a memory service under `name` (builder pattern).
    pub fn with_service(mut self, name: impl Into<String>, service: Arc<dyn MemoryService>) -> Self {
        self.services.insert(name.into(), service);
        self
    }

    /// Register the memory collaborator under [`MEMORY_SERVICE`].
    pub fn with_memory(self, service: Arc<dyn MemoryService>) -> Self {
        self.with_service(MEMORY_SERVICE, service)
    }

    pub fn model(&self) -> &dyn ModelService {
        self.model.as_ref()
    }

    /// Look up a registered service by name.
    pub fn get_service(&self, name: &str) -> Option<&dyn MemoryService> {
        self.services.get(name).map(|s| s.as_ref())
    }
}

impl fmt::Debug for AgentRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.services.keys().collect();
        names.sort();
        f.debug_struct("AgentRuntime")
            .field("services", &names)
            .finish_non_exhaustive()
    }
}

// ── Messages ───────────────────────────────────────────────────────

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageContent {
    #[serde(default)]
    pub text: Option<String>,
}

/// A message delivered by the host.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct IncomingMessage {
    #[serde(default)]
    pub content: MessageContent,
    #[serde(default, rename = "roomId", alias = "room_id")]
    pub room_id: Option<String>,
}

impl IncomingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: MessageContent {
                text: Some(text.into()),
            },
            room_id: None,
        }
    }

    pub fn with_room(mut self, room_id: impl Into<String>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }

    /// The text payload, if present and non-empty.
    pub fn text_content(&self) -> Option<&str> {
        self.content.text.as_deref().filter(|t| !t.is_empty())
    }
}

/// The room a host state refers to.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RoomRef {
    pub id: String,
}

/// Per-call state supplied by the host alongside the message.
///
/// Hosts send the room either flat (`roomId`) or nested (`room.id`).
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct EvaluatorState {
    #[serde(default, rename = "roomId", alias = "room_id", skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomRef>,
}

impl EvaluatorState {
    pub fn for_room(room_id: impl Into<String>) -> Self {
        Self {
            room_id: Some(room_id.into()),
            room: None,
        }
    }

    /// The room id, flat field first.
    pub fn room_id(&self) -> Option<&str> {
        self.room_id
            .as_deref()
            .or_else(|| self.room.as_ref().map(|room| room.id.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyMemory;

    impl MemoryService for EmptyMemory {
        fn get_session_summaries(&self, _room_id: &str) -> SummaryFuture<'_> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    struct EchoModel;

    impl ModelService for EchoModel {
        fn use_model(&self, _kind: ModelKind, params: ModelParams) -> ModelFuture<'_> {
            Box::pin(async move { Ok(Value::String(params.prompt)) })
        }
    }

    #[test]
    fn service_lookup_by_name() {
        let runtime = AgentRuntime::new(Arc::new(EchoModel)).with_memory(Arc::new(EmptyMemory));
        assert!(runtime.get_service(MEMORY_SERVICE).is_some());
        assert!(runtime.get_service("db").is_none());
    }

    #[test]
    fn text_content_rejects_empty() {
        assert_eq!(IncomingMessage::text("oi").text_content(), Some("oi"));
        assert_eq!(IncomingMessage::text("").text_content(), None);
        assert_eq!(IncomingMessage::default().text_content(), None);
    }

    #[test]
    fn message_deserializes_host_shape() {
        let msg: IncomingMessage =
            serde_json::from_str(r#"{"content":{"text":"Eu quero morrer"},"roomId":"r1"}"#)
                .unwrap();
        assert_eq!(msg.text_content(), Some("Eu quero morrer"));
        assert_eq!(msg.room_id.as_deref(), Some("r1"));
    }

    #[test]
    fn state_accepts_flat_and_nested_room() {
        let flat: EvaluatorState = serde_json::from_str(r#"{"roomId":"r1"}"#).unwrap();
        assert_eq!(flat.room_id(), Some("r1"));

        let nested: EvaluatorState =
            serde_json::from_str(r#"{"room":{"id":"test-room-id"}}"#).unwrap();
        assert_eq!(nested.room_id(), Some("test-room-id"));

        let empty: EvaluatorState = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.room_id(), None);
    }

    #[tokio::test]
    async fn model_service_is_object_safe() {
        let runtime = AgentRuntime::new(Arc::new(EchoModel));
        let out = runtime
            .model()
            .use_model(ModelKind::TextSmall, ModelParams::new("ping"))
            .await
            .unwrap();
        assert_eq!(out, Value::String("ping".into()));
    }
}
