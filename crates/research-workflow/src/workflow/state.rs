//! Workflow state, stage deltas and the transition table

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::report::FinalReport;
use crate::domain::{Analyst, Interview, ResearchSection};

/// Where the machine is. Drives [`next_stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    #[default]
    Start,
    ProjectCreated,
    AnalystsCreated,
    AwaitingHumanFeedback,
    FeedbackProcessed,
    InterviewCompleted,
    SectionWritten,
    NextAnalystReady,
    AllAnalystsProcessed,
    Complete,
    Error,
}

impl WorkflowStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::ProjectCreated => "project_created",
            Self::AnalystsCreated => "analysts_created",
            Self::AwaitingHumanFeedback => "awaiting_human_feedback",
            Self::FeedbackProcessed => "feedback_processed",
            Self::InterviewCompleted => "interview_completed",
            Self::SectionWritten => "section_written",
            Self::NextAnalystReady => "next_analyst_ready",
            Self::AllAnalystsProcessed => "all_analysts_processed",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The workflow's stages, in their nominal order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    CreateProject,
    GenerateAnalysts,
    HumanFeedback,
    ConductInterview,
    WriteSection,
    AdvanceAnalyst,
    CompleteResearch,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::CreateProject,
        Stage::GenerateAnalysts,
        Stage::HumanFeedback,
        Stage::ConductInterview,
        Stage::WriteSection,
        Stage::AdvanceAnalyst,
        Stage::CompleteResearch,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateProject => "create_project",
            Self::GenerateAnalysts => "generate_analysts",
            Self::HumanFeedback => "human_feedback",
            Self::ConductInterview => "conduct_interview",
            Self::WriteSection => "write_section",
            Self::AdvanceAnalyst => "advance_analyst",
            Self::CompleteResearch => "complete_research",
        }
    }

    /// Prefix for the error message of a failed stage
    pub(crate) fn failure_prefix(&self) -> &'static str {
        match self {
            Self::CreateProject => "Failed to create project",
            Self::GenerateAnalysts => "Failed to generate analysts",
            Self::HumanFeedback => "Failed to process human feedback",
            Self::ConductInterview => "Failed to conduct interview",
            Self::WriteSection => "Failed to write section",
            Self::AdvanceAnalyst => "Failed to advance analyst",
            Self::CompleteResearch => "Failed to complete research",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The transition table: which stage runs after `step`.
///
/// `None` for terminal steps. Whether the machine suspends at the feedback
/// gate is the orchestrator's decision, not part of the table.
pub fn next_stage(step: WorkflowStep) -> Option<Stage> {
    match step {
        WorkflowStep::Start => Some(Stage::CreateProject),
        WorkflowStep::ProjectCreated => Some(Stage::GenerateAnalysts),
        WorkflowStep::AnalystsCreated => Some(Stage::HumanFeedback),
        WorkflowStep::FeedbackProcessed => Some(Stage::GenerateAnalysts),
        WorkflowStep::AwaitingHumanFeedback => Some(Stage::ConductInterview),
        WorkflowStep::InterviewCompleted => Some(Stage::WriteSection),
        WorkflowStep::SectionWritten => Some(Stage::AdvanceAnalyst),
        WorkflowStep::NextAnalystReady => Some(Stage::ConductInterview),
        WorkflowStep::AllAnalystsProcessed => Some(Stage::CompleteResearch),
        WorkflowStep::Complete | WorkflowStep::Error => None,
    }
}

/// How a run ended, if it has
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    #[default]
    Running,
    Succeeded,
    Failed { error: String },
}

/// Timing of one executed stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageExecution {
    pub stage: Stage,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub succeeded: bool,
}

/// Everything carried across stages of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchState {
    pub topic: String,
    pub max_analysts: usize,
    pub max_interview_turns: usize,
    /// Pending feedback; consumed by the next analyst generation
    pub human_feedback: Option<String>,
    pub project_id: Option<String>,
    pub analysts: Vec<Analyst>,
    /// Zero-based cursor into `analysts`
    pub current_analyst_index: usize,
    pub interviews: Vec<Interview>,
    pub sections: Vec<ResearchSection>,
    pub final_report: Option<FinalReport>,
    pub current_step: WorkflowStep,
    pub outcome: Outcome,
    #[serde(default)]
    pub executions: Vec<StageExecution>,
}

impl ResearchState {
    pub fn new(
        topic: impl Into<String>,
        max_analysts: usize,
        max_interview_turns: usize,
        human_feedback: Option<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            max_analysts,
            max_interview_turns,
            human_feedback: human_feedback.filter(|f| !f.trim().is_empty()),
            project_id: None,
            analysts: Vec::new(),
            current_analyst_index: 0,
            interviews: Vec::new(),
            sections: Vec::new(),
            final_report: None,
            current_step: WorkflowStep::Start,
            outcome: Outcome::Running,
            executions: Vec::new(),
        }
    }

    pub fn workflow_complete(&self) -> bool {
        !matches!(self.outcome, Outcome::Running)
    }

    pub fn success(&self) -> bool {
        matches!(self.outcome, Outcome::Succeeded)
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Failed { error } => Some(error),
            _ => None,
        }
    }

    pub fn current_analyst(&self) -> Option<&Analyst> {
        self.analysts.get(self.current_analyst_index)
    }

    /// Feedback that is present and not blank
    pub fn pending_feedback(&self) -> Option<&str> {
        self.human_feedback
            .as_deref()
            .filter(|f| !f.trim().is_empty())
    }

    pub fn apply(&mut self, delta: StateDelta) {
        if let Some(step) = delta.step {
            self.current_step = step;
        }
        if let Some(project_id) = delta.project_id {
            self.project_id = Some(project_id);
        }
        if let Some(analysts) = delta.analysts {
            self.analysts = analysts;
        }
        if let Some(index) = delta.current_analyst_index {
            self.current_analyst_index = index;
        }
        if let Some(interview) = delta.interview {
            self.interviews.push(interview);
        }
        if let Some(section) = delta.section {
            self.sections.push(section);
        }
        if delta.clear_feedback {
            self.human_feedback = None;
        }
        if let Some(report) = delta.final_report {
            self.final_report = Some(report);
        }
        if let Some(outcome) = delta.outcome {
            self.outcome = outcome;
        }
    }
}

/// What one stage changes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDelta {
    pub step: Option<WorkflowStep>,
    pub project_id: Option<String>,
    /// Replaces the analyst list
    pub analysts: Option<Vec<Analyst>>,
    pub current_analyst_index: Option<usize>,
    /// Appended to the interview list
    pub interview: Option<Interview>,
    /// Appended to the section list
    pub section: Option<ResearchSection>,
    pub clear_feedback: bool,
    pub final_report: Option<FinalReport>,
    pub outcome: Option<Outcome>,
}

impl StateDelta {
    pub fn step(step: WorkflowStep) -> Self {
        Self {
            step: Some(step),
            ..Default::default()
        }
    }

    /// The error terminal state
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            step: Some(WorkflowStep::Error),
            outcome: Some(Outcome::Failed {
                error: error.into(),
            }),
            ..Default::default()
        }
    }

    /// The success terminal state
    pub fn succeeded(report: FinalReport) -> Self {
        Self {
            step: Some(WorkflowStep::Complete),
            final_report: Some(report),
            outcome: Some(Outcome::Succeeded),
            ..Default::default()
        }
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_analysts(mut self, analysts: Vec<Analyst>) -> Self {
        self.analysts = Some(analysts);
        self
    }

    pub fn with_analyst_index(mut self, index: usize) -> Self {
        self.current_analyst_index = Some(index);
        self
    }

    pub fn with_interview(mut self, interview: Interview) -> Self {
        self.interview = Some(interview);
        self
    }

    pub fn with_section(mut self, section: ResearchSection) -> Self {
        self.section = Some(section);
        self
    }

    pub fn clearing_feedback(mut self) -> Self {
        self.clear_feedback = true;
        self
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Some(Outcome::Failed { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        assert_eq!(next_stage(WorkflowStep::Start), Some(Stage::CreateProject));
        assert_eq!(next_stage(WorkflowStep::FeedbackProcessed), Some(Stage::GenerateAnalysts));
        assert_eq!(
            next_stage(WorkflowStep::AwaitingHumanFeedback),
            Some(Stage::ConductInterview)
        );
        assert_eq!(next_stage(WorkflowStep::NextAnalystReady), Some(Stage::ConductInterview));
        assert_eq!(
            next_stage(WorkflowStep::AllAnalystsProcessed),
            Some(Stage::CompleteResearch)
        );
        assert_eq!(next_stage(WorkflowStep::Complete), None);
        assert_eq!(next_stage(WorkflowStep::Error), None);
    }

    #[test]
    fn test_terminal_steps_have_no_successor() {
        for step in [WorkflowStep::Complete, WorkflowStep::Error] {
            assert!(step.is_terminal());
            assert!(next_stage(step).is_none());
        }
    }

    #[test]
    fn test_blank_feedback_is_dropped() {
        let state = ResearchState::new("Rust", 2, 1, Some("   ".to_string()));
        assert!(state.human_feedback.is_none());
        assert!(state.pending_feedback().is_none());

        let state = ResearchState::new("Rust", 2, 1, Some("more startups".to_string()));
        assert_eq!(state.pending_feedback(), Some("more startups"));
    }

    #[test]
    fn test_apply_failure_is_terminal() {
        let mut state = ResearchState::new("Rust", 2, 1, None);
        assert!(!state.workflow_complete());

        state.apply(StateDelta::failed("boom"));
        assert!(state.workflow_complete());
        assert!(!state.success());
        assert_eq!(state.error(), Some("boom"));
        assert_eq!(state.current_step, WorkflowStep::Error);
    }

    #[test]
    fn test_apply_appends_and_clears() {
        let mut state = ResearchState::new("Rust", 2, 1, Some("feedback".to_string()));
        let analyst = Analyst::new("Ada", "Architect", "Lab", "Systems and safety");
        let interview = Interview::new(&analyst, "Rust", 1);

        state.apply(
            StateDelta::step(WorkflowStep::AnalystsCreated)
                .with_analysts(vec![analyst.clone()])
                .with_analyst_index(0)
                .clearing_feedback(),
        );
        state.apply(StateDelta::step(WorkflowStep::InterviewCompleted).with_interview(interview));

        assert_eq!(state.current_step, WorkflowStep::InterviewCompleted);
        assert_eq!(state.analysts, vec![analyst]);
        assert_eq!(state.interviews.len(), 1);
        assert!(state.human_feedback.is_none());
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(Outcome::Failed { error: "x".into() }).unwrap();
        assert_eq!(json, serde_json::json!({"status": "failed", "error": "x"}));
        assert_eq!(
            serde_json::to_value(WorkflowStep::AwaitingHumanFeedback).unwrap(),
            "awaiting_human_feedback"
        );
    }
}
