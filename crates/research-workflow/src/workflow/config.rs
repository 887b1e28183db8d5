//! Workflow configuration

use serde::{Deserialize, Serialize};

use crate::domain::MAX_ANALYSTS;
use crate::error::{ResearchError, Result};

pub const DEFAULT_MAX_ANALYSTS: usize = 3;
pub const DEFAULT_MAX_INTERVIEW_TURNS: usize = 2;
pub const DEFAULT_RUN_ID_PREFIX: &str = "research";

/// Upper bound on interview rounds per analyst
pub const MAX_INTERVIEW_TURNS: usize = 20;

/// Orchestrator settings
///
/// `max_analysts` and `max_interview_turns` are the limits of the
/// `run_configured_research*` operations; the operations taking explicit
/// counts ignore them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchConfig {
    pub max_analysts: usize,
    pub max_interview_turns: usize,
    /// Substitute placeholder personas when persona generation fails
    pub persona_fallback: bool,
    /// Prefix of generated run ids
    pub run_id_prefix: String,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_analysts: DEFAULT_MAX_ANALYSTS,
            max_interview_turns: DEFAULT_MAX_INTERVIEW_TURNS,
            persona_fallback: false,
            run_id_prefix: DEFAULT_RUN_ID_PREFIX.to_string(),
        }
    }
}

impl ResearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_analysts(mut self, max_analysts: usize) -> Self {
        self.max_analysts = max_analysts;
        self
    }

    pub fn with_max_interview_turns(mut self, turns: usize) -> Self {
        self.max_interview_turns = turns;
        self
    }

    pub fn with_persona_fallback(mut self, enabled: bool) -> Self {
        self.persona_fallback = enabled;
        self
    }

    pub fn with_run_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.run_id_prefix = prefix.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_limits(self.max_analysts, self.max_interview_turns)?;
        if self.run_id_prefix.trim().is_empty() {
            return Err(ResearchError::config("run_id_prefix must not be empty"));
        }
        Ok(())
    }
}

/// Bounds shared by the config and per-run arguments
pub(crate) fn validate_limits(max_analysts: usize, max_interview_turns: usize) -> Result<()> {
    if !(1..=MAX_ANALYSTS).contains(&max_analysts) {
        return Err(ResearchError::validation(format!(
            "max_analysts must be between 1 and {}, got {}",
            MAX_ANALYSTS, max_analysts
        )));
    }
    if !(1..=MAX_INTERVIEW_TURNS).contains(&max_interview_turns) {
        return Err(ResearchError::validation(format!(
            "max_interview_turns must be between 1 and {}, got {}",
            MAX_INTERVIEW_TURNS, max_interview_turns
        )));
    }
    Ok(())
}
