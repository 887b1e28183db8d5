//! Interview engine: the bounded question/answer loop for one analyst

use tracing::{debug, info, warn};

use crate::domain::{
    extract_search_context, should_continue_interview, Analyst, Interview,
    Message,
};
use crate::error::Result;
use crate::generators::{fallback_question, FALLBACK_ANSWER};
use crate::ports::{format_documents_for_context, Generators};

/// Runs interviews against the injected generators
///
/// Generator and search failures never abort an interview: questions and
/// answers fall back to fixed texts, and a failed search means no context.
/// The turn cap bounds the loop whatever the generators return.
#[derive(Clone)]
pub struct InterviewEngine {
    generators: Generators,
}

impl InterviewEngine {
    pub fn new(generators: Generators) -> Self {
        Self { generators }
    }

    pub fn generators(&self) -> &Generators {
        &self.generators
    }

    /// Produce a completed interview for `analyst` on `topic`
    pub async fn conduct_interview(
        &self,
        analyst: &Analyst,
        topic: &str,
        max_turns: usize,
    ) -> Result<Interview> {
        let mut interview = Interview::new(analyst, topic, max_turns);
        let mut messages: Vec<Message> = Vec::new();

        for turn in 1..=max_turns {
            let question = Message::analyst(self.next_question(analyst, &messages).await);
            interview.append_transcript(&question.transcript_line());
            messages.push(question);

            let context = self.search_context(topic, &messages).await;
            if !context.is_empty() {
                interview.add_context([context.clone()]);
            }

            let answer = Message::expert(self.answer(analyst, &messages, &context).await);
            interview.append_transcript(&answer.transcript_line());
            messages.push(answer);

            if !should_continue_interview(&messages, max_turns) {
                debug!(analyst = %analyst.name, turn, "Interview finished");
                break;
            }
        }

        interview.complete()?;

        info!(
            interview_id = %interview.id,
            analyst = %analyst.name,
            messages = messages.len(),
            "Completed interview"
        );
        Ok(interview)
    }

    async fn next_question(&self, analyst: &Analyst, messages: &[Message]) -> String {
        match self.generators.questions.next(analyst, messages).await {
            Ok(question) => question,
            Err(e) => {
                warn!(analyst = %analyst.name, error = %e, "Question generation failed, using fallback");
                fallback_question(analyst)
            }
        }
    }

    async fn answer(&self, analyst: &Analyst, messages: &[Message], context: &str) -> String {
        match self.generators.answers.answer(analyst, messages, context).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(analyst = %analyst.name, error = %e, "Answer generation failed, using fallback");
                FALLBACK_ANSWER.to_string()
            }
        }
    }

    /// Query from the query generator, else the latest analyst question,
    /// else the topic
    async fn search_query(&self, topic: &str, messages: &[Message]) -> String {
        if let Some(queries) = &self.generators.queries {
            match queries.query(messages).await {
                Ok(query) if !query.trim().is_empty() => return query,
                Ok(_) => debug!("Query generator returned nothing, using last question"),
                Err(e) => warn!(error = %e, "Query generation failed, using last question"),
            }
        }
        let query = extract_search_context(messages);
        if query.trim().is_empty() {
            topic.to_string()
        } else {
            query
        }
    }

    /// Formatted documents for the running conversation; empty when the
    /// search failed or found nothing
    async fn search_context(&self, topic: &str, messages: &[Message]) -> String {
        let query = self.search_query(topic, messages).await;
        match self.generators.search.search(&query).await {
            Ok(documents) if !documents.is_empty() => {
                debug!(documents = documents.len(), "Retrieved context");
                format_documents_for_context(&documents)
            }
            Ok(_) => String::new(),
            Err(e) => {
                warn!(error = %e, "Context search failed, continuing without context");
                String::new()
            }
        }
    }
}
