//! OpenAI LLM Provider implementation via Rig

use async_trait::async_trait;
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;
use rig::providers::openai::Client;
use tracing::debug;

use super::config::LLMConfig;
use super::message::{extract_system_preamble, ChatMessage, Role};
use super::provider::{LLMProvider, LLMResponse};
use crate::error::ResearchError;

/// OpenAI provider backed by rig-core's client
///
/// ```rust,ignore
/// // Reads OPENAI_API_KEY
/// let provider = OpenAIProvider::from_env_with_model("gpt-4o")?;
/// ```
pub struct OpenAIProvider {
    client: Client,
    default_model: String,
    default_config: LLMConfig,
}

impl OpenAIProvider {
    pub fn from_env() -> Result<Self, ResearchError> {
        Self::from_env_with_model("gpt-4o")
    }

    pub fn from_env_with_model(model: impl Into<String>) -> Result<Self, ResearchError> {
        Self::from_env_with_config(LLMConfig::new(model))
    }

    pub fn from_env_with_config(config: LLMConfig) -> Result<Self, ResearchError> {
        if std::env::var("OPENAI_API_KEY").is_err() {
            return Err(ResearchError::config(
                "OPENAI_API_KEY environment variable not set",
            ));
        }
        Ok(Self {
            client: Client::from_env(),
            default_model: config.model.clone(),
            default_config: config,
        })
    }

    /// Runtime config wins over the provider default
    fn effective_config<'a>(&'a self, runtime: Option<&'a LLMConfig>) -> &'a LLMConfig {
        runtime.unwrap_or(&self.default_config)
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, ResearchError> {
        let config = self.effective_config(config);

        let mut agent_builder = self.client.agent(&config.model);

        if let Some(preamble) = extract_system_preamble(messages) {
            agent_builder = agent_builder.preamble(&preamble);
        }
        if let Some(temp) = config.temperature {
            agent_builder = agent_builder.temperature(temp);
        }
        if let Some(max_tokens) = config.max_tokens {
            agent_builder = agent_builder.max_tokens(max_tokens);
        }

        let agent = agent_builder.build();

        let prompt = messages
            .iter()
            .rfind(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        debug!(model = %config.model, prompt_chars = prompt.len(), "Sending OpenAI completion");

        let response = agent
            .prompt(&prompt)
            .await
            .map_err(|e| ResearchError::generation(format!("OpenAI completion failed: {}", e)))?;

        Ok(LLMResponse::new(ChatMessage::assistant(response)))
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}
