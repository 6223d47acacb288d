//! Extract a [`RiskTier`] from a raw model response.
//!
//! The host's model service returns whatever the provider adapter produced:
//! a bare string, an object with a `text` field, or a full chat-completion
//! body. Shapes are tried in that order; anything unreadable is `medium`.

use serde_json::Value;

use super::tier::RiskTier;

/// Parse a raw model response into a tier. Never fails.
pub fn parse_response(raw: &Value) -> RiskTier {
    response_text(raw)
        .and_then(RiskTier::from_label)
        .unwrap_or(RiskTier::FALLBACK)
}

/// The text payload of a response, for whichever shape matches first.
pub fn response_text(raw: &Value) -> Option<&str> {
    if let Some(text) = raw.as_str() {
        return Some(text);
    }
    if let Some(text) = raw.get("text").and_then(Value::as_str) {
        return Some(text);
    }
    raw.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_string() {
        assert_eq!(parse_response(&json!(" High \n")), RiskTier::High);
    }

    #[test]
    fn text_field() {
        assert_eq!(parse_response(&json!({"text": "low"})), RiskTier::Low);
    }

    #[test]
    fn chat_completion_shape() {
        let raw = json!({
            "id": "gen-1",
            "choices": [{"message": {"role": "assistant", "content": "HIGH"}}]
        });
        assert_eq!(parse_response(&raw), RiskTier::High);
    }

    #[test]
    fn text_field_wins_over_choices() {
        let raw = json!({
            "text": "low",
            "choices": [{"message": {"content": "high"}}]
        });
        assert_eq!(parse_response(&raw), RiskTier::Low);
    }

    #[test]
    fn unknown_label_falls_back() {
        assert_eq!(parse_response(&json!("unsure")), RiskTier::Medium);
        assert_eq!(parse_response(&json!("high risk")), RiskTier::Medium);
    }

    #[test]
    fn unknown_shape_falls_back() {
        assert_eq!(parse_response(&json!(42)), RiskTier::Medium);
        assert_eq!(parse_response(&json!({"choices": []})), RiskTier::Medium);
        assert_eq!(parse_response(&json!({"text": 3})), RiskTier::Medium);
        assert_eq!(parse_response(&Value::Null), RiskTier::Medium);
    }
}
