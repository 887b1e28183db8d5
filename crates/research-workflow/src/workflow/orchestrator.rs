//! Research orchestrator
//!
//! Drives a run through the stage table until it reaches a terminal step,
//! or suspends it at the human feedback gate when interruption is asked
//! for. A suspended run is persisted in the [`RunStateStore`] and picked up
//! again by [`ResearchOrchestrator::continue_research_with_feedback`].
//!
//! # Example
//!
//! ```ignore
//! let mock = Arc::new(MockResearchGenerator::new());
//! let orchestrator = ResearchOrchestrator::new(
//!     Generators::from_backend(mock.clone(), mock),
//!     ResearchConfig::default(),
//! );
//!
//! let state = orchestrator.run_research("Design patterns", 2, 1, None).await?;
//! assert!(state.success());
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::ResearchConfig;
use super::run_store::{new_run_id, MemoryRunStore, RunRecord, RunStateStore};
use super::stages::StageContext;
use super::state::{next_stage, ResearchState, Stage, StageExecution, StateDelta, WorkflowStep};
use crate::domain::{get_project_progress, is_project_complete, ProjectOverview, ProjectProgress};
use crate::error::{ResearchError, Result};
use crate::interview::InterviewEngine;
use crate::ports::Generators;
use crate::repository::ResearchUnitOfWork;

pub const WORKFLOW_NAME: &str = "Research Assistant";
pub const PAUSED_MESSAGE: &str =
    "Workflow paused for human feedback. Use continue_research_with_feedback to proceed.";

/// What the driver does at the feedback gate with no feedback to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GatePolicy {
    Suspend,
    PassThrough,
}

/// Result of an interruptible run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Waiting at the feedback gate; resume with `run_id`
    #[serde(rename = "paused_for_feedback")]
    Paused {
        run_id: String,
        state: ResearchState,
        message: String,
    },
    Completed(ResearchState),
    Failed(ResearchState),
}

impl RunOutcome {
    fn finished(state: ResearchState) -> Self {
        if state.success() {
            Self::Completed(state)
        } else {
            Self::Failed(state)
        }
    }

    pub fn state(&self) -> &ResearchState {
        match self {
            Self::Paused { state, .. } | Self::Completed(state) | Self::Failed(state) => state,
        }
    }

    pub fn into_state(self) -> ResearchState {
        match self {
            Self::Paused { state, .. } | Self::Completed(state) | Self::Failed(state) => state,
        }
    }

    pub fn run_id(&self) -> Option<&str> {
        match self {
            Self::Paused { run_id, .. } => Some(run_id),
            _ => None,
        }
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused { .. })
    }
}

/// Out-of-band project status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectStatusReport {
    pub overview: ProjectOverview,
    pub progress: ProjectProgress,
    pub is_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowInfo {
    pub name: String,
    pub stages: Vec<String>,
    pub supports_interruption: bool,
    pub interrupt_points: Vec<String>,
    pub description: String,
}

pub struct ResearchOrchestrator {
    stages: StageContext,
    runs: Arc<dyn RunStateStore>,
    cancel: Option<CancellationToken>,
}

impl ResearchOrchestrator {
    /// In-memory repositories and run store
    pub fn new(generators: Generators, config: ResearchConfig) -> Self {
        Self {
            stages: StageContext {
                uow: Arc::new(ResearchUnitOfWork::in_memory()),
                engine: InterviewEngine::new(generators),
                config,
            },
            runs: Arc::new(MemoryRunStore::new()),
            cancel: None,
        }
    }

    pub fn with_unit_of_work(mut self, uow: Arc<ResearchUnitOfWork>) -> Self {
        self.stages.uow = uow;
        self
    }

    pub fn with_run_store(mut self, runs: Arc<dyn RunStateStore>) -> Self {
        self.runs = runs;
        self
    }

    /// Checked before every stage
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.stages.config
    }

    pub fn unit_of_work(&self) -> &Arc<ResearchUnitOfWork> {
        &self.stages.uow
    }

    pub fn run_store(&self) -> &Arc<dyn RunStateStore> {
        &self.runs
    }

    /// Run to a terminal state without suspending.
    ///
    /// Feedback, if given, shapes the first analyst generation. The result
    /// is `Ok` for failed runs too; check [`ResearchState::success`].
    pub async fn run_research(
        &self,
        topic: &str,
        max_analysts: usize,
        max_interview_turns: usize,
        human_feedback: Option<String>,
    ) -> Result<ResearchState> {
        info!(topic, max_analysts, max_interview_turns, "Starting research run");
        let state = ResearchState::new(topic, max_analysts, max_interview_turns, human_feedback);
        Ok(self
            .drive(state, Stage::CreateProject, GatePolicy::PassThrough)
            .await)
    }

    /// Run until the feedback gate and persist the suspended run.
    ///
    /// Feedback given up front is applied by the first analyst generation,
    /// and the run still pauses afterwards for review.
    pub async fn run_research_with_interruption(
        &self,
        topic: &str,
        max_analysts: usize,
        max_interview_turns: usize,
        human_feedback: Option<String>,
    ) -> Result<RunOutcome> {
        info!(topic, max_analysts, max_interview_turns, "Starting interruptible research run");
        let state = ResearchState::new(topic, max_analysts, max_interview_turns, human_feedback);
        let state = self
            .drive(state, Stage::CreateProject, GatePolicy::Suspend)
            .await;

        if state.workflow_complete() {
            return Ok(RunOutcome::finished(state));
        }

        let run_id = new_run_id(&self.stages.config.run_id_prefix);
        let record = RunRecord::new(run_id.clone(), state.clone())
            .with_metadata("topic", state.topic.clone())
            .with_metadata("analysts", state.analysts.len());
        self.runs.save_run_state(&record).await?;

        info!(run_id = %run_id, analysts = state.analysts.len(), "Workflow paused for human feedback");
        Ok(RunOutcome::Paused {
            run_id,
            state,
            message: PAUSED_MESSAGE.to_string(),
        })
    }

    /// [`run_research`](Self::run_research) with the configured limits
    pub async fn run_configured_research(
        &self,
        topic: &str,
        human_feedback: Option<String>,
    ) -> Result<ResearchState> {
        let config = &self.stages.config;
        self.run_research(topic, config.max_analysts, config.max_interview_turns, human_feedback)
            .await
    }

    /// [`run_research_with_interruption`](Self::run_research_with_interruption)
    /// with the configured limits
    pub async fn run_configured_research_with_interruption(
        &self,
        topic: &str,
        human_feedback: Option<String>,
    ) -> Result<RunOutcome> {
        let config = &self.stages.config;
        self.run_research_with_interruption(
            topic,
            config.max_analysts,
            config.max_interview_turns,
            human_feedback,
        )
        .await
    }

    /// Resume a paused run.
    ///
    /// Blank feedback proceeds with the current analysts; anything else
    /// regenerates them once before the interviews start. The run is taken
    /// out of the store before it is driven, so a run id resumes once.
    pub async fn continue_research_with_feedback(
        &self,
        run_id: &str,
        human_feedback: &str,
    ) -> Result<RunOutcome> {
        let record = self
            .runs
            .take_run_state(run_id)
            .await?
            .ok_or_else(|| ResearchError::not_found("Run", run_id))?;

        if record.state.current_step != WorkflowStep::AwaitingHumanFeedback {
            let step = record.state.current_step;
            self.runs.save_run_state(&record).await?;
            return Err(ResearchError::state_transition(format!(
                "Run {} is not awaiting feedback (step: {})",
                run_id, step
            )));
        }
        let mut state = record.state;

        let feedback = human_feedback.trim();
        state.human_feedback = (!feedback.is_empty()).then(|| feedback.to_string());
        info!(run_id, with_feedback = state.human_feedback.is_some(), "Resuming research run");

        let state = self
            .drive(state, Stage::HumanFeedback, GatePolicy::PassThrough)
            .await;

        if state.workflow_complete() {
            Ok(RunOutcome::finished(state))
        } else {
            // Only a suspending drive stops short of a terminal step
            Err(ResearchError::state_transition(format!(
                "Run {} stopped at {}",
                run_id, state.current_step
            )))
        }
    }

    pub async fn get_project_status(&self, project_id: &str) -> Result<ProjectStatusReport> {
        let overview = self.stages.uow.project_overview(project_id).await?;
        let progress = get_project_progress(&overview);
        let is_complete = is_project_complete(&overview);
        Ok(ProjectStatusReport {
            overview,
            progress,
            is_complete,
        })
    }

    pub fn workflow_info(&self) -> WorkflowInfo {
        WorkflowInfo {
            name: WORKFLOW_NAME.to_string(),
            stages: Stage::ALL.iter().map(|s| s.name().to_string()).collect(),
            supports_interruption: true,
            interrupt_points: vec![Stage::HumanFeedback.name().to_string()],
            description: "Generates analyst personas for a topic, interviews an expert once \
                          per analyst and writes one report section per interview, with an \
                          optional pause for human feedback on the analysts"
                .to_string(),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    /// Execute stages from `start` until a terminal step or a suspension.
    ///
    /// Stage errors never escape: they become the error terminal state.
    async fn drive(&self, mut state: ResearchState, start: Stage, gate: GatePolicy) -> ResearchState {
        let mut stage = start;

        loop {
            if self.is_cancelled() {
                warn!(stage = %stage, "Workflow cancelled");
                state.apply(StateDelta::failed(ResearchError::Cancelled.to_string()));
                break;
            }

            let started_at = Utc::now();
            debug!(stage = %stage, step = %state.current_step, "Executing stage");
            let delta = match self.stages.execute(stage, &state).await {
                Ok(delta) => delta,
                Err(e) => {
                    let message = format!("{}: {}", stage.failure_prefix(), e);
                    error!(stage = %stage, error = %e, "Stage failed");
                    StateDelta::failed(message)
                }
            };

            state.executions.push(StageExecution {
                stage,
                started_at,
                completed_at: Utc::now(),
                succeeded: !delta.is_failure(),
            });
            state.apply(delta);

            if state.current_step.is_terminal() {
                break;
            }
            if stage == Stage::HumanFeedback
                && gate == GatePolicy::Suspend
                && state.current_step == WorkflowStep::AwaitingHumanFeedback
            {
                break;
            }

            match next_stage(state.current_step) {
                Some(next) => stage = next,
                None => break,
            }
        }

        if let Some(err) = state.error() {
            info!(error = %err, "Research run failed");
        } else if state.success() {
            info!(project_id = ?state.project_id, sections = state.sections.len(), "Research run completed");
        }
        state
    }
}
