//! The classification prompt.

use std::fmt::Write;

use super::history::HistoryTurn;

/// Instructions prepended to every classification request.
const CLASSIFIER_INSTRUCTIONS: &str = "\
You are a safety classifier for a psychoeducational support agent that talks \
with children and adolescents. Read the conversation and assess the mental-health \
risk expressed in the LATEST message, using the earlier turns as context.

Risk levels:
- high: suicidal ideation, self-harm, intent to hurt others, abuse, or any sign of imminent danger
- medium: persistent sadness, loneliness, fear, anxiety, crying, or distress without imminent danger
- low: everyday conversation with no sign of risk";

/// Build the prompt for one classification call.
///
/// The history already ends with the current message; it is repeated after
/// the transcript so the model knows which turn to judge.
pub fn build_classification_prompt(history: &[HistoryTurn], message: &str) -> String {
    let mut prompt = String::from(CLASSIFIER_INSTRUCTIONS);
    prompt.push_str("\n\nConversation (oldest first):\n");
    for turn in history {
        let _ = writeln!(
            prompt,
            "[{}] {}: {}",
            turn.timestamp.format("%Y-%m-%d %H:%M:%S"),
            turn.role,
            turn.content
        );
    }
    let _ = write!(
        prompt,
        "\nLatest message: \"{message}\"\n\n\
         Answer with exactly one word: low, medium, or high. Do not add anything else."
    );
    prompt
}
