//! LLM configuration types

use serde::{Deserialize, Serialize};

/// Per-provider generation settings, overridable per request
///
/// # Example
///
/// ```
/// use research_workflow::llm::LLMConfig;
///
/// let config = LLMConfig::new("gpt-4o").with_temperature(0.2);
/// assert_eq!(config.model, "gpt-4o");
/// assert_eq!(config.temperature, Some(0.2));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Model identifier (e.g., "gpt-4o")
    pub model: String,
    /// Sampling temperature (0.0 - 2.0)
    pub temperature: Option<f64>,
    /// Maximum tokens to generate in the response
    pub max_tokens: Option<u64>,
}

impl LLMConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_max_tokens(mut self, tokens: u64) -> Self {
        self.max_tokens = Some(tokens);
        self
    }
}
