//! LLM Provider trait definition

use async_trait::async_trait;

use super::config::LLMConfig;
use super::message::ChatMessage;
use crate::error::ResearchError;

/// LLM completion response
#[derive(Debug, Clone, PartialEq)]
pub struct LLMResponse {
    pub message: ChatMessage,
}

impl LLMResponse {
    pub fn new(message: ChatMessage) -> Self {
        Self { message }
    }

    pub fn content(&self) -> &str {
        &self.message.content
    }
}

/// Provider-agnostic completion interface
///
/// Implementations report failures as [`ResearchError::Generation`] so the
/// interview engine can substitute its fallbacks.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, ResearchError>;

    /// Provider name for logging
    fn name(&self) -> &str;

    fn default_model(&self) -> &str;
}
