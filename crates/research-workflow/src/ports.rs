//! Generation and search ports
//!
//! The workflow only sees these traits. A deterministic stub and an
//! LLM-backed implementation live in [`crate::generators`]; the search
//! providers live in [`crate::search`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::{Analyst, Message};
use crate::error::Result;

/// Produces analyst personas for a topic
#[async_trait]
pub trait PersonaGenerator: Send + Sync {
    async fn create(
        &self,
        topic: &str,
        max_count: usize,
        feedback: Option<&str>,
    ) -> Result<Vec<Analyst>>;
}

/// Produces the analyst's next question
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn next(&self, persona: &Analyst, history: &[Message]) -> Result<String>;
}

/// Produces the expert's answer, grounded in retrieved context
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn answer(&self, persona: &Analyst, history: &[Message], context: &str) -> Result<String>;
}

/// Turns a running conversation into a search query
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    async fn query(&self, history: &[Message]) -> Result<String>;
}

/// Writes a markdown section from interview context
#[async_trait]
pub trait SectionWriter: Send + Sync {
    async fn write(&self, persona: &Analyst, context: &str) -> Result<String>;
}

/// Retrieves documents for a query
#[async_trait]
pub trait ContextSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<Document>>;
}

/// A retrieved search document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub url: String,
    pub title: String,
    pub content: String,
    /// "web", "wikipedia", ...
    pub source_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
}

impl Document {
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        source_type: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            content: content.into(),
            source_type: source_type.into(),
            page: None,
        }
    }

    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }

    fn to_context(&self) -> String {
        match &self.page {
            Some(page) => format!(
                "<Document source=\"{}\" page=\"{}\">\n{}\n</Document>",
                self.url, page, self.content
            ),
            None => format!("<Document href=\"{}\">\n{}\n</Document>", self.url, self.content),
        }
    }
}

/// Text used when a search returns nothing
pub const NO_SEARCH_RESULTS: &str = "No search results available for this query.";

/// Format documents as prompt context
pub fn format_documents_for_context(documents: &[Document]) -> String {
    if documents.is_empty() {
        return NO_SEARCH_RESULTS.to_string();
    }
    documents
        .iter()
        .map(Document::to_context)
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// The full set of collaborators a workflow needs
///
/// Built once and injected; the workflow never branches on which
/// implementation sits behind a port.
#[derive(Clone)]
pub struct Generators {
    pub personas: Arc<dyn PersonaGenerator>,
    pub questions: Arc<dyn QuestionGenerator>,
    pub answers: Arc<dyn AnswerGenerator>,
    pub sections: Arc<dyn SectionWriter>,
    pub search: Arc<dyn ContextSearch>,
    pub queries: Option<Arc<dyn QueryGenerator>>,
}

impl Generators {
    /// Use one backend for every generation port
    pub fn from_backend<B>(backend: Arc<B>, search: Arc<dyn ContextSearch>) -> Self
    where
        B: PersonaGenerator + QuestionGenerator + AnswerGenerator + SectionWriter + 'static,
    {
        Self {
            personas: backend.clone(),
            questions: backend.clone(),
            answers: backend.clone(),
            sections: backend,
            search,
            queries: None,
        }
    }

    pub fn with_query_generator(mut self, queries: Arc<dyn QueryGenerator>) -> Self {
        self.queries = Some(queries);
        self
    }

    pub fn with_personas(mut self, personas: Arc<dyn PersonaGenerator>) -> Self {
        self.personas = personas;
        self
    }

    pub fn with_questions(mut self, questions: Arc<dyn QuestionGenerator>) -> Self {
        self.questions = questions;
        self
    }

    pub fn with_answers(mut self, answers: Arc<dyn AnswerGenerator>) -> Self {
        self.answers = answers;
        self
    }

    pub fn with_sections(mut self, sections: Arc<dyn SectionWriter>) -> Self {
        self.sections = sections;
        self
    }

    pub fn with_search(mut self, search: Arc<dyn ContextSearch>) -> Self {
        self.search = search;
        self
    }
}

/// Search that never finds anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSearch;

#[async_trait]
impl ContextSearch for NoSearch {
    async fn search(&self, _query: &str) -> Result<Vec<Document>> {
        Ok(Vec::new())
    }
}
