//! Integration tests for the risk evaluator.
//!
//! These drive `RiskEvaluator::handler` end to end against scripted model
//! and memory services on a virtual clock, so backoff and throttle timing
//! are asserted without real delays.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mia_risk::api::error::{ErrorDetail, ModelError, RESOURCE_EXHAUSTED};
use mia_risk::prelude::*;
use mia_risk::risk::{Clock, ManualClock};
use mia_risk::runtime::{ModelFuture, SummaryFuture};
use serde_json::{Value, json};

/// Replays a script of responses and records when each call went out.
struct ScriptedModel {
    clock: Arc<ManualClock>,
    script: Mutex<VecDeque<Result<Value, ModelError>>>,
    calls: Mutex<Vec<(Instant, String)>>,
    active: AtomicU32,
    max_active: AtomicU32,
}

impl ScriptedModel {
    fn new(clock: Arc<ManualClock>, script: Vec<Result<Value, ModelError>>) -> Arc<Self> {
        Arc::new(Self {
            clock,
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
            active: AtomicU32::new(0),
            max_active: AtomicU32::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    fn prompts(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(_, p)| p.clone()).collect()
    }
}

impl ModelService for ScriptedModel {
    fn use_model(&self, _kind: ModelKind, params: ModelParams) -> ModelFuture<'_> {
        self.calls
            .lock()
            .unwrap()
            .push((self.clock.now(), params.prompt));
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(json!("low")));
        Box::pin(async move {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            next
        })
    }
}

struct FixedMemory(Result<Vec<SessionSummary>, MemoryError>);

impl MemoryService for FixedMemory {
    fn get_session_summaries(&self, _room_id: &str) -> SummaryFuture<'_> {
        let result = self.0.clone();
        Box::pin(async move { result })
    }
}

fn setup(script: Vec<Result<Value, ModelError>>) -> (RiskEvaluator, Arc<ScriptedModel>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let model = ScriptedModel::new(clock.clone(), script);
    let evaluator = RiskEvaluator::with_clock(EvaluatorConfig::default(), clock.clone())
        .with_event_handler(NoopHandler);
    (evaluator, model, clock)
}

fn retry_info_429(delay: &str) -> ModelError {
    let body = json!({
        "error": {
            "code": 429,
            "message": "Resource has been exhausted",
            "status": RESOURCE_EXHAUSTED,
            "details": [{
                "@type": "type.googleapis.com/google.rpc.RetryInfo",
                "retryDelay": delay
            }]
        }
    });
    ModelError::from_http(429, &body.to_string(), None)
}

// ── Classification ───────────────────────────────────────────────────

#[tokio::test]
async fn cached_message_skips_model() {
    let (evaluator, model, _clock) = setup(vec![Ok(json!("high"))]);
    let runtime = AgentRuntime::new(model.clone());
    let message = IncomingMessage::text("Eu quero morrer");
    let state = EvaluatorState::default();

    let first = evaluator.handler(&runtime, &message, &state).await;
    let second = evaluator.handler(&runtime, &message, &state).await;

    assert_eq!(first.level(), RiskTier::High);
    assert_eq!(second, first);
    assert_eq!(model.call_count(), 1);
}

#[tokio::test]
async fn padded_uppercase_answer_is_normalized() {
    let (evaluator, model, _clock) = setup(vec![Ok(json!(" HIGH "))]);
    let runtime = AgentRuntime::new(model.clone());

    let result = evaluator
        .handler(&runtime, &IncomingMessage::text("oi"), &EvaluatorState::default())
        .await;

    assert!(result.success);
    assert_eq!(result.level(), RiskTier::High);
}

#[tokio::test]
async fn chat_completion_body_is_read() {
    let body = json!({"choices": [{"message": {"role": "assistant", "content": "low"}}]});
    let (evaluator, model, _clock) = setup(vec![Ok(body)]);
    let runtime = AgentRuntime::new(model.clone());

    let result = evaluator
        .handler(&runtime, &IncomingMessage::text("bom dia"), &EvaluatorState::default())
        .await;

    assert_eq!(result.level(), RiskTier::Low);
}

#[tokio::test]
async fn unrecognized_answer_falls_back_to_medium() {
    let (evaluator, model, _clock) = setup(vec![Ok(json!("unsure"))]);
    let runtime = AgentRuntime::new(model.clone());

    let result = evaluator
        .handler(&runtime, &IncomingMessage::text("hmm"), &EvaluatorState::default())
        .await;

    assert!(result.success);
    assert_eq!(result.level(), RiskTier::Medium);
    assert_eq!(model.call_count(), 1);
}

// ── Retry ────────────────────────────────────────────────────────────

#[tokio::test]
async fn retry_info_delay_is_honored() {
    let (evaluator, model, clock) =
        setup(vec![Err(retry_info_429("1s")), Ok(json!("high"))]);
    let runtime = AgentRuntime::new(model.clone());

    let result = evaluator
        .handler(
            &runtime,
            &IncomingMessage::text("Eu quero morrer"),
            &EvaluatorState::for_room("test-room"),
        )
        .await;

    assert!(result.success);
    assert_eq!(result.level(), RiskTier::High);
    assert_eq!(model.call_count(), 2);
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(1)]);
}

#[tokio::test]
async fn exhausted_retries_report_medium_success() {
    let (evaluator, model, clock) = setup(vec![
        Err(ModelError::rate_limited("a")),
        Err(ModelError::rate_limited("b")),
        Err(ModelError::rate_limited("c")),
    ]);
    let runtime = AgentRuntime::new(model.clone());
    let message = IncomingMessage::text("teste");

    let result = evaluator
        .handler(&runtime, &message, &EvaluatorState::default())
        .await;

    assert_eq!(result, EvaluationResult::classified(RiskTier::Medium));
    assert_eq!(model.call_count(), 3);
    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_secs(2), Duration::from_secs(4)]
    );

    // The fallback is cached like any other tier.
    evaluator
        .handler(&runtime, &message, &EvaluatorState::default())
        .await;
    assert_eq!(model.call_count(), 3);
}

#[tokio::test]
async fn oversized_retry_hint_falls_back_to_linear_backoff() {
    let (evaluator, model, clock) = setup(vec![
        Err(retry_info_429("1e30s")),
        Err(retry_info_429("1e30s")),
        Err(retry_info_429("1e30s")),
    ]);
    let runtime = AgentRuntime::new(model.clone());

    let result = evaluator
        .handler(&runtime, &IncomingMessage::text("oi"), &EvaluatorState::default())
        .await;

    assert_eq!(result, EvaluationResult::classified(RiskTier::Medium));
    assert_eq!(model.call_count(), 3);
    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_secs(2), Duration::from_secs(4)]
    );
    assert!(!evaluator.coordinator().gate().is_busy());
}

#[tokio::test]
async fn non_rate_limit_error_is_not_retried() {
    let (evaluator, model, clock) = setup(vec![
        Err(ModelError::new("bad gateway").with_status(502)),
        Ok(json!("low")),
    ]);
    let runtime = AgentRuntime::new(model.clone());

    let result = evaluator
        .handler(&runtime, &IncomingMessage::text("oi"), &EvaluatorState::default())
        .await;

    assert!(result.success);
    assert_eq!(result.level(), RiskTier::Medium);
    assert_eq!(model.call_count(), 1);
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn failed_attempts_are_reported_as_events() {
    let clock = Arc::new(ManualClock::new());
    let model = ScriptedModel::new(
        clock.clone(),
        vec![Err(ModelError::rate_limited("slow down")), Ok(json!("low"))],
    );
    let failures = Arc::new(AtomicU32::new(0));
    let counter = failures.clone();
    let evaluator = RiskEvaluator::with_clock(EvaluatorConfig::default(), clock.clone())
        .with_event_handler(FnEventHandler::new(move |event| {
            if let EvaluatorEvent::AttemptFailed { rate_limited, .. } = event {
                assert!(*rate_limited);
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));
    let runtime = AgentRuntime::new(model.clone());

    evaluator
        .handler(&runtime, &IncomingMessage::text("oi"), &EvaluatorState::default())
        .await;

    assert_eq!(failures.load(Ordering::SeqCst), 1);
}

// ── Coordination ─────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_messages_are_serialized_and_spaced() {
    let (evaluator, model, _clock) = setup(vec![Ok(json!("low")), Ok(json!("medium"))]);
    let runtime = AgentRuntime::new(model.clone());
    let state = EvaluatorState::default();
    let a = IncomingMessage::text("primeira mensagem");
    let b = IncomingMessage::text("segunda mensagem");

    let (ra, rb) = futures::join!(
        evaluator.handler(&runtime, &a, &state),
        evaluator.handler(&runtime, &b, &state)
    );

    assert!(ra.success && rb.success);
    assert_eq!(model.call_count(), 2);
    assert_eq!(model.max_active.load(Ordering::SeqCst), 1);

    let times = model.call_times();
    assert!(times[1].duration_since(times[0]) >= Duration::from_millis(2000));
    assert!(!evaluator.coordinator().gate().is_busy());
}

#[tokio::test]
async fn concurrent_identical_messages_both_reach_the_model() {
    let (evaluator, model, _clock) = setup(vec![Ok(json!("high")), Ok(json!("low"))]);
    let runtime = AgentRuntime::new(model.clone());
    let state = EvaluatorState::default();
    let message = IncomingMessage::text("ninguém gosta de mim");

    let (first, second) = futures::join!(
        evaluator.handler(&runtime, &message, &state),
        evaluator.handler(&runtime, &message, &state)
    );

    // Both miss the cache before either takes the gate; the first write wins.
    assert_eq!(model.call_count(), 2);
    assert_eq!(first, EvaluationResult::classified(RiskTier::High));
    assert_eq!(second, EvaluationResult::classified(RiskTier::High));
    assert_eq!(evaluator.coordinator().cache().len(), 1);
}

#[tokio::test]
async fn clones_share_cache_and_gate() {
    let (evaluator, model, _clock) = setup(vec![Ok(json!("high"))]);
    let other = evaluator.clone();
    let runtime = AgentRuntime::new(model.clone());
    let message = IncomingMessage::text("quero me machucar");

    evaluator
        .handler(&runtime, &message, &EvaluatorState::default())
        .await;
    let result = other
        .handler(&runtime, &message, &EvaluatorState::default())
        .await;

    assert_eq!(result.level(), RiskTier::High);
    assert_eq!(model.call_count(), 1);
}

// ── History ──────────────────────────────────────────────────────────

#[tokio::test]
async fn room_history_is_included_in_prompt() {
    let (evaluator, model, _clock) = setup(vec![Ok(json!("medium"))]);
    let summaries = vec![
        SessionSummary {
            role: "user".into(),
            content: json!("Ontem eu chorei muito"),
            timestamp: None,
        },
        SessionSummary {
            role: "assistant".into(),
            content: json!({"text": "Sinto muito. Quer conversar?"}),
            timestamp: None,
        },
    ];
    let runtime =
        AgentRuntime::new(model.clone()).with_memory(Arc::new(FixedMemory(Ok(summaries))));

    let result = evaluator
        .handler(
            &runtime,
            &IncomingMessage::text("Hoje também"),
            &EvaluatorState::for_room("room-1"),
        )
        .await;

    assert_eq!(result.level(), RiskTier::Medium);
    let prompt = &model.prompts()[0];
    assert!(prompt.contains("user: Ontem eu chorei muito"));
    assert!(prompt.contains("assistant: Sinto muito. Quer conversar?"));
    assert!(prompt.contains("Latest message: \"Hoje também\""));
}

#[tokio::test]
async fn memory_failure_reports_unsuccessful_medium() {
    let (evaluator, model, _clock) = setup(vec![Ok(json!("low"))]);
    let runtime = AgentRuntime::new(model.clone())
        .with_memory(Arc::new(FixedMemory(Err(MemoryError::new("Memory Error")))));
    let message = IncomingMessage::text("oi").with_room("test-room");

    let result = evaluator
        .handler(&runtime, &message, &EvaluatorState::default())
        .await;

    assert!(!result.success);
    assert_eq!(result.level(), RiskTier::Medium);
    assert!(result.error.is_some());
    assert_eq!(model.call_count(), 0);
    assert!(!evaluator.coordinator().gate().is_busy());

    // Nothing was cached, so a healthy retry reaches the model.
    let healthy = AgentRuntime::new(model.clone());
    let retry = evaluator
        .handler(&healthy, &message, &EvaluatorState::default())
        .await;
    assert_eq!(retry.level(), RiskTier::Low);
    assert_eq!(model.call_count(), 1);
}

// ── Offline ──────────────────────────────────────────────────────────

#[tokio::test]
async fn keyword_model_runs_through_the_engine() {
    let clock = Arc::new(ManualClock::new());
    let evaluator = RiskEvaluator::with_clock(EvaluatorConfig::default(), clock.clone())
        .with_event_handler(NoopHandler);
    let runtime = AgentRuntime::new(Arc::new(KeywordModel));
    let state = EvaluatorState::default();

    let high = evaluator
        .handler(&runtime, &IncomingMessage::text("tenho pensamentos suicidas"), &state)
        .await;
    let medium = evaluator
        .handler(&runtime, &IncomingMessage::text("estou com medo"), &state)
        .await;

    assert_eq!(high.level(), RiskTier::High);
    assert_eq!(medium.level(), RiskTier::Medium);
    assert_eq!(clock.total_slept(), Duration::from_millis(2000));
}

#[test]
fn validate_needs_text() {
    let evaluator = RiskEvaluator::new(EvaluatorConfig::default());
    assert!(evaluator.validate(&IncomingMessage::text("oi")));
    assert!(!evaluator.validate(&IncomingMessage::default()));
}

#[test]
fn hint_detail_is_parsed_from_provider_body() {
    let err = retry_info_429("1s");
    assert!(err.is_rate_limited());
    assert_eq!(err.retry_hint(), Some(Duration::from_secs(1)));
    assert!(err.details.iter().any(ErrorDetail::is_retry_info));
}
