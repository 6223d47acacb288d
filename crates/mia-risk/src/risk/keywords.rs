//! Keyword screening for Portuguese-language messages.
//!
//! [`KeywordScreen`] is a cheap local heuristic: a message mentioning
//! self-harm terms is `high`, one mentioning sadness or fear is `medium`,
//! anything else `low`. [`KeywordModel`] wraps it as a [`ModelService`] so
//! the full engine can run without network access.

use serde_json::Value;

use super::tier::RiskTier;
use crate::runtime::{ModelFuture, ModelKind, ModelParams, ModelService};

const HIGH_RISK_TERMS: &[&str] = &[
    "suicid",
    "autoagress",
    "autoles",
    "matar",
    "me machucar",
    "me ferir",
];

const MEDIUM_RISK_TERMS: &[&str] = &["triste", "sozinh", "medo", "ansioso", "chorar"];

const CRISIS_TERMS: &[&str] = &[
    "suicid",
    "autoagress",
    "autoles",
    "crise",
    "emerg",
    "perigo",
    "matar",
    "me machucar",
    "me ferir",
];

const LATEST_MESSAGE_MARKER: &str = "Latest message: \"";
const ANSWER_MARKER: &str = "\"\n\nAnswer with";

#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordScreen;

impl KeywordScreen {
    /// Tier suggested by the keywords in `text`.
    pub fn classify(text: &str) -> RiskTier {
        let lower = text.to_lowercase();
        if contains_any(&lower, HIGH_RISK_TERMS) {
            RiskTier::High
        } else if contains_any(&lower, MEDIUM_RISK_TERMS) {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }

    /// Whether `text` mentions a crisis term.
    pub fn is_crisis(text: &str) -> bool {
        contains_any(&text.to_lowercase(), CRISIS_TERMS)
    }
}

fn contains_any(haystack: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| haystack.contains(term))
}

/// Pull the judged message back out of a classification prompt.
fn latest_message(prompt: &str) -> Option<&str> {
    let (_, tail) = prompt.rsplit_once(LATEST_MESSAGE_MARKER)?;
    let (message, _) = tail.rsplit_once(ANSWER_MARKER)?;
    Some(message)
}

/// Offline model that answers with the keyword tier.
///
/// Prompts without a recognizable latest message are screened whole.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordModel;

impl ModelService for KeywordModel {
    fn use_model(&self, _kind: ModelKind, params: ModelParams) -> ModelFuture<'_> {
        let message = latest_message(&params.prompt).unwrap_or(&params.prompt);
        let tier = KeywordScreen::classify(message);
        Box::pin(async move { Ok(Value::String(tier.as_str().to_string())) })
    }
}
