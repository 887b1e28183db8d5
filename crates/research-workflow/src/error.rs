//! Error types for the research workflow
//!
//! `ResearchError` is what stages, repositories and the orchestrator return.
//! Generation and search failures are recoverable: the interview engine and
//! the section stage replace them with fallback values. Everything else ends
//! the run in the error terminal state.

use thiserror::Error;

/// Errors raised by the research workflow and its collaborators
#[derive(Debug, Error)]
pub enum ResearchError {
    /// Missing topic, persona count out of range, malformed persona batch
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown project, analyst, interview, section or run id
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A generation port (LLM or stub) failed
    #[error("Generation error: {0}")]
    Generation(String),

    /// Integrity violation: completing twice, status regression, bad cursor
    #[error("Invalid state transition: {0}")]
    StateTransition(String),

    /// Repository or unit-of-work failure
    #[error("Repository error: {0}")]
    Repository(String),

    /// Saving or loading a suspended run failed
    #[error("Run state error: {0}")]
    RunState(String),

    /// Context search failed
    #[error("Search error: {0}")]
    Search(String),

    /// Invalid workflow configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Run cancelled by the caller
    #[error("Workflow cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ResearchError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    pub fn state_transition(message: impl Into<String>) -> Self {
        Self::StateTransition(message.into())
    }

    pub fn repository(message: impl Into<String>) -> Self {
        Self::Repository(message.into())
    }

    pub fn run_state(message: impl Into<String>) -> Self {
        Self::RunState(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether a port-call site may substitute a fallback value
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Generation(_) | Self::Search(_))
    }
}

/// Result alias used throughout the crate
pub type Result<T, E = ResearchError> = std::result::Result<T, E>;
