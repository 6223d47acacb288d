//! The classifier's output vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk level of a conversational message.
///
/// Tiers carry no ordering beyond identity. Anything the model says that is
/// not exactly one of the three labels maps to [`RiskTier::FALLBACK`].
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// Fail-cautious default for unreadable output, exhausted retries, and
    /// collaborator failures.
    pub const FALLBACK: RiskTier = RiskTier::Medium;

    pub fn as_str(self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }

    /// Exact label match, after trimming and lower-casing.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "low" => Some(RiskTier::Low),
            "medium" => Some(RiskTier::Medium),
            "high" => Some(RiskTier::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
