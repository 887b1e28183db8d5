//! LLM-backed generators
//!
//! Every call is reported to a [`TraceSink`]. Failures surface as
//! [`ResearchError::Generation`]; fallbacks are the caller's decision.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::prompts::ResearchPrompts;
use crate::domain::{format_transcript, Analyst, Message};
use crate::error::{ResearchError, Result};
use crate::llm::{ChatMessage, LLMConfig, LLMProvider};
use crate::ports::{AnswerGenerator, PersonaGenerator, QueryGenerator, QuestionGenerator, SectionWriter};
use crate::trace::{NoopTraceSink, TraceMessage, TraceRequest, TraceResponse, TraceSink};

#[derive(Debug, Deserialize)]
struct PersonaDraft {
    name: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    affiliation: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct PersonaEnvelope {
    analysts: Vec<PersonaDraft>,
}

/// Pull analyst personas out of a model reply.
///
/// Accepts a bare JSON array or an object with an `analysts` array, with or
/// without markdown code fences and surrounding prose.
pub fn parse_analysts(raw: &str, max_count: usize) -> Result<Vec<Analyst>> {
    let body = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let drafts: Vec<PersonaDraft> = if body.starts_with('[') {
        serde_json::from_str(body)?
    } else {
        let (Some(start), Some(end)) = (body.find('{'), body.rfind('}')) else {
            return Err(ResearchError::generation("No JSON object in persona reply"));
        };
        if end < start {
            return Err(ResearchError::generation("Malformed JSON in persona reply"));
        }
        serde_json::from_str::<PersonaEnvelope>(&body[start..=end])?.analysts
    };

    Ok(drafts
        .into_iter()
        .take(max_count)
        .map(|d| Analyst::new(d.name, d.role, d.affiliation, d.description))
        .collect())
}

fn conversation_prompt(history: &[Message], instruction: &str) -> String {
    if history.is_empty() {
        instruction.to_string()
    } else {
        format!("Conversation so far:\n\n{}\n\n{}", format_transcript(history), instruction)
    }
}

/// Research generator that prompts an [`LLMProvider`]
pub struct LlmResearchGenerator {
    provider: Arc<dyn LLMProvider>,
    trace: Arc<dyn TraceSink>,
    config: Option<LLMConfig>,
}

impl LlmResearchGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        info!(provider = provider.name(), model = provider.default_model(), "LLM research generator initialized");
        Self {
            provider,
            trace: Arc::new(NoopTraceSink::default()),
            config: None,
        }
    }

    pub fn with_trace_sink(mut self, trace: Arc<dyn TraceSink>) -> Self {
        self.trace = trace;
        self
    }

    /// Override the provider's default model settings
    pub fn with_config(mut self, config: LLMConfig) -> Self {
        self.config = Some(config);
        self
    }

    fn model(&self) -> &str {
        self.config
            .as_ref()
            .map(|c| c.model.as_str())
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// One traced completion
    async fn invoke(
        &self,
        operation: &str,
        system: String,
        user: String,
        params: Vec<(&str, serde_json::Value)>,
    ) -> Result<String> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];

        let mut request = TraceRequest::new(
            operation,
            messages
                .iter()
                .map(|m| TraceMessage::new(m.role.as_str(), m.content.clone()))
                .collect(),
        )
        .with_model(self.model());
        for (key, value) in params {
            request = request.with_param(key, value);
        }
        let trace_id = self.trace.record_request(request).await;

        let started = Instant::now();
        match self.provider.complete(&messages, self.config.as_ref()).await {
            Ok(response) => {
                let content = response.content().trim().to_string();
                self.trace
                    .record_response(TraceResponse::success(&trace_id, &content, started.elapsed()))
                    .await;
                debug!(operation, chars = content.len(), "LLM call succeeded");
                Ok(content)
            }
            Err(e) => {
                self.trace
                    .record_response(TraceResponse::failure(&trace_id, "", e.to_string(), started.elapsed()))
                    .await;
                warn!(operation, error = %e, "LLM call failed");
                Err(match e {
                    ResearchError::Generation(_) => e,
                    other => ResearchError::generation(other.to_string()),
                })
            }
        }
    }
}

#[async_trait]
impl PersonaGenerator for LlmResearchGenerator {
    async fn create(
        &self,
        topic: &str,
        max_count: usize,
        feedback: Option<&str>,
    ) -> Result<Vec<Analyst>> {
        let raw = self
            .invoke(
                "create_analysts",
                ResearchPrompts::analyst_instructions(topic, feedback, max_count),
                "Generate the set of analysts.".to_string(),
                vec![
                    ("topic", topic.into()),
                    ("max_analysts", max_count.into()),
                    ("has_feedback", feedback.is_some().into()),
                ],
            )
            .await?;

        let analysts = parse_analysts(&raw, max_count).map_err(|e| {
            ResearchError::generation(format!("Could not parse analyst personas: {}", e))
        })?;
        info!(topic, count = analysts.len(), "Created analysts");
        Ok(analysts)
    }
}

#[async_trait]
impl QuestionGenerator for LlmResearchGenerator {
    async fn next(&self, persona: &Analyst, history: &[Message]) -> Result<String> {
        self.invoke(
            "generate_interview_question",
            ResearchPrompts::question_instructions(&persona.persona()),
            conversation_prompt(history, "Ask your next question."),
            vec![
                ("analyst_name", persona.name.clone().into()),
                ("message_count", history.len().into()),
            ],
        )
        .await
    }
}

#[async_trait]
impl AnswerGenerator for LlmResearchGenerator {
    async fn answer(&self, persona: &Analyst, history: &[Message], context: &str) -> Result<String> {
        self.invoke(
            "generate_expert_answer",
            ResearchPrompts::answer_instructions(&persona.persona(), context),
            conversation_prompt(history, "Answer the analyst's latest question."),
            vec![
                ("analyst_name", persona.name.clone().into()),
                ("context_length", context.len().into()),
            ],
        )
        .await
    }
}

#[async_trait]
impl QueryGenerator for LlmResearchGenerator {
    async fn query(&self, history: &[Message]) -> Result<String> {
        let query = self
            .invoke(
                "generate_search_query",
                ResearchPrompts::search_instructions(),
                conversation_prompt(history, "Write the search query."),
                vec![("message_count", history.len().into())],
            )
            .await?;
        Ok(query.trim_matches('"').to_string())
    }
}

#[async_trait]
impl SectionWriter for LlmResearchGenerator {
    async fn write(&self, persona: &Analyst, context: &str) -> Result<String> {
        self.invoke(
            "write_research_section",
            ResearchPrompts::section_writer_instructions(&persona.description),
            format!("Use this source to write your section: {}", context),
            vec![
                ("analyst_role", persona.role.clone().into()),
                ("context_length", context.len().into()),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LLMResponse;
    use crate::trace::MemoryTraceSink;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    /// Replays canned replies; `None` entries fail
    struct ScriptedProvider {
        replies: Mutex<VecDeque<Option<String>>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Option<&str>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().map(|r| r.map(String::from)).collect()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            _config: Option<&LLMConfig>,
        ) -> std::result::Result<LLMResponse, ResearchError> {
            self.seen.lock().await.push(messages.to_vec());
            match self.replies.lock().await.pop_front().flatten() {
                Some(reply) => Ok(LLMResponse::new(ChatMessage::assistant(reply))),
                None => Err(ResearchError::generation("scripted failure")),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn default_model(&self) -> &str {
            "scripted-1"
        }
    }

    const PERSONAS: &str = r#"{"analysts": [
        {"name": "Ada", "role": "Architect", "affiliation": "Lab", "description": "Systems and safety"},
        {"name": "Grace", "role": "Compiler Engineer", "affiliation": "Navy", "description": "Languages and tooling"},
        {"name": "Linus", "role": "Maintainer", "affiliation": "Kernel", "description": "Operating systems"}
    ]}"#;

    #[test]
    fn test_parse_analysts_variants() {
        let fenced = format!("```json\n{}\n```", PERSONAS);
        assert_eq!(parse_analysts(&fenced, 5).unwrap().len(), 3);

        let prose = format!("Here you go:\n{}\nEnjoy", PERSONAS);
        let analysts = parse_analysts(&prose, 2).unwrap();
        assert_eq!(analysts.len(), 2);
        assert_eq!(analysts[1].name, "Grace");

        let array = r#"[{"name": "Ada", "role": "Architect", "affiliation": "Lab", "description": "Systems"}]"#;
        assert_eq!(parse_analysts(array, 3).unwrap()[0].role, "Architect");

        assert!(parse_analysts("no json at all", 3).is_err());
        assert!(parse_analysts("{not json}", 3).is_err());
    }

    #[tokio::test]
    async fn test_create_traces_request_and_response() {
        let provider = Arc::new(ScriptedProvider::new(vec![Some(PERSONAS)]));
        let sink = Arc::new(MemoryTraceSink::new());
        let generator = LlmResearchGenerator::new(provider.clone()).with_trace_sink(sink.clone());

        let analysts = generator.create("Rust", 2, Some("focus on tooling")).await.unwrap();
        assert_eq!(analysts.len(), 2);

        let requests = sink.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].1.operation, "create_analysts");
        assert_eq!(requests[0].1.model.as_deref(), Some("scripted-1"));
        assert_eq!(requests[0].1.params["max_analysts"], 2);

        let responses = sink.responses().await;
        assert!(responses[0].success);
        assert_eq!(responses[0].trace_id, requests[0].0);

        let seen = provider.seen.lock().await;
        assert!(seen[0][0].content.contains("focus on tooling"));
    }

    #[tokio::test]
    async fn test_unparseable_personas_are_generation_errors() {
        let provider = Arc::new(ScriptedProvider::new(vec![Some("I cannot help with that")]));
        let generator = LlmResearchGenerator::new(provider);

        let err = generator.create("Rust", 2, None).await.unwrap_err();
        assert!(matches!(err, ResearchError::Generation(_)));
    }

    #[tokio::test]
    async fn test_failures_are_traced() {
        let provider = Arc::new(ScriptedProvider::new(vec![None]));
        let sink = Arc::new(MemoryTraceSink::new());
        let generator = LlmResearchGenerator::new(provider).with_trace_sink(sink.clone());
        let analyst = Analyst::new("Ada", "Architect", "Lab", "Systems and safety");

        let err = generator.next(&analyst, &[]).await.unwrap_err();
        assert!(err.is_recoverable());

        let responses = sink.responses().await;
        assert!(!responses[0].success);
        assert_eq!(responses[0].error.as_deref(), Some("Generation error: scripted failure"));
    }

    #[tokio::test]
    async fn test_history_is_rendered_into_prompt() {
        let provider = Arc::new(ScriptedProvider::new(vec![Some("  \"rust ownership\" ")]));
        let generator = LlmResearchGenerator::new(provider.clone());
        let history = vec![Message::analyst("How does ownership work?")];

        let query = generator.query(&history).await.unwrap();
        assert_eq!(query, "rust ownership");

        let seen = provider.seen.lock().await;
        assert!(seen[0][1].content.contains("Analyst: How does ownership work?"));
    }
}
