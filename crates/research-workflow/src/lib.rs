//! research-workflow: multi-analyst research orchestration
//!
//! A topic is researched by a small panel of generated analyst personas.
//! Each analyst interviews an expert for a bounded number of turns, grounded
//! in retrieved context, and one report section is written per interview.
//! The run can pause after the analysts are generated so a human can steer
//! them with free-text feedback.
//!
//! - [`domain`]: entities and the pure rules around them
//! - [`ports`]: generation and search traits the workflow depends on
//! - [`generators`]: mock and LLM-backed port implementations
//! - [`search`]: Tavily, Wikipedia and combined context search
//! - [`repository`]: repositories and the per-stage unit of work
//! - [`workflow`]: state machine, run persistence and the orchestrator
//! - [`trace`]: request/response sinks for LLM calls
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use research_workflow::{
//!     Generators, MockResearchGenerator, ResearchConfig, ResearchOrchestrator,
//! };
//!
//! let mock = Arc::new(MockResearchGenerator::new());
//! let orchestrator = ResearchOrchestrator::new(
//!     Generators::from_backend(mock.clone(), mock),
//!     ResearchConfig::default(),
//! );
//!
//! let outcome = orchestrator
//!     .run_research_with_interruption("Design patterns", 2, 1, None)
//!     .await?;
//! let run_id = outcome.run_id().unwrap().to_string();
//!
//! let finished = orchestrator
//!     .continue_research_with_feedback(&run_id, "Add a startup perspective")
//!     .await?;
//! println!("{}", finished.state().final_report.as_ref().unwrap().to_markdown());
//! ```

pub mod domain;
pub mod error;
pub mod generators;
pub mod interview;
pub mod llm;
pub mod ports;
pub mod repository;
pub mod search;
pub mod trace;
pub mod workflow;

// Re-exports for convenience
pub use domain::{
    Analyst, Interview, Message, ProjectOverview, ProjectProgress, ProjectStatus,
    ResearchProject, ResearchSection, ResearchTopic, Speaker,
};
pub use error::{ResearchError, Result};
pub use generators::{LlmResearchGenerator, MockResearchGenerator, ResearchPrompts};
pub use interview::InterviewEngine;
pub use llm::{LLMConfig, LLMProvider, LLMResponse, OpenAIProvider};
pub use ports::{
    AnswerGenerator, ContextSearch, Document, Generators, NoSearch, PersonaGenerator,
    QueryGenerator, QuestionGenerator, SectionWriter,
};
pub use repository::{Repositories, ResearchUnitOfWork};
pub use search::{CombinedSearch, SearchError, TavilySearch, WikipediaSearch};
pub use trace::{FileTraceSink, LoggingTraceSink, NoopTraceSink, TraceSink};
pub use workflow::{
    FileRunStore, FinalReport, MemoryRunStore, ResearchConfig, ResearchOrchestrator,
    ResearchState, RunOutcome, RunStateStore, WorkflowStep,
};
