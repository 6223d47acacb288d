//! Model routing by [`ModelKind`].
//!
//! The evaluator asks for a model class, not a model name. The routing
//! decides which OpenRouter model serves each class.

use crate::runtime::ModelKind;

/// Model routing strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelRouting {
    /// Use a single model for every kind.
    Single(String),
    /// Use a cheap model for `TextSmall` and a capable one for `TextLarge`.
    BySize { small: String, large: String },
}

impl ModelRouting {
    /// Routing from CLI-style options: a large model only splits the
    /// routing when it differs from the default one.
    pub fn from_models(model: impl Into<String>, large: Option<String>) -> Self {
        let small = model.into();
        match large {
            Some(large) if large != small => ModelRouting::BySize { small, large },
            _ => ModelRouting::Single(small),
        }
    }

    /// Get the model to use for a given kind.
    pub fn model_for(&self, kind: ModelKind) -> &str {
        match self {
            ModelRouting::Single(model) => model,
            ModelRouting::BySize { small, large } => match kind {
                ModelKind::TextSmall => small,
                ModelKind::TextLarge => large,
            },
        }
    }
}

impl Default for ModelRouting {
    fn default() -> Self {
        ModelRouting::Single(crate::DEFAULT_MODEL.to_string())
    }
}
