//! Stage functions
//!
//! Each stage reads the run state, performs its work and returns the
//! [`StateDelta`] to apply. Persistence goes through one transaction per
//! stage. Errors are returned as-is; the driver turns them into the error
//! terminal state.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::config::{validate_limits, ResearchConfig};
use super::report::FinalReport;
use super::state::{ResearchState, Stage, StateDelta, WorkflowStep};
use crate::domain::{
    extract_sources, section_context, section_title, validate_analyst_personas,
    validate_section_content, Analyst, Interview, ProjectStatus, ResearchProject, ResearchSection,
    ResearchTopic,
};
use crate::error::{ResearchError, Result};
use crate::generators::{fallback_section, placeholder_analysts};
use crate::interview::InterviewEngine;
use crate::repository::ResearchUnitOfWork;

/// What stages run against
#[derive(Clone)]
pub struct StageContext {
    pub uow: Arc<ResearchUnitOfWork>,
    pub engine: InterviewEngine,
    pub config: ResearchConfig,
}

impl StageContext {
    pub async fn execute(&self, stage: Stage, state: &ResearchState) -> Result<StateDelta> {
        match stage {
            Stage::CreateProject => create_project(self, state).await,
            Stage::GenerateAnalysts => generate_analysts(self, state).await,
            Stage::HumanFeedback => Ok(human_feedback(state)),
            Stage::ConductInterview => conduct_interview(self, state).await,
            Stage::WriteSection => write_section(self, state).await,
            Stage::AdvanceAnalyst => Ok(advance_analyst(state)),
            Stage::CompleteResearch => complete_research(self, state).await,
        }
    }
}

fn require_project_id(state: &ResearchState) -> Result<&str> {
    state
        .project_id
        .as_deref()
        .ok_or_else(|| ResearchError::state_transition("Project ID is required"))
}

async fn create_project(ctx: &StageContext, state: &ResearchState) -> Result<StateDelta> {
    if state.topic.trim().is_empty() {
        return Err(ResearchError::validation("Topic is required"));
    }
    validate_limits(state.max_analysts, state.max_interview_turns)?;

    let project = ResearchProject::new(state.topic.clone());
    let topic = ResearchTopic::new(
        state.topic.clone(),
        state.max_analysts,
        state.human_feedback.clone(),
    );
    let project_id = project.id.clone();

    let mut tx = ctx.uow.begin();
    tx.create_project(project).create_topic(&project_id, topic);
    tx.commit().await?;

    info!(project_id = %project_id, topic = %state.topic, "Created research project");
    Ok(StateDelta::step(WorkflowStep::ProjectCreated).with_project_id(project_id))
}

async fn generate_analysts(ctx: &StageContext, state: &ResearchState) -> Result<StateDelta> {
    let project_id = require_project_id(state)?;
    let feedback = state.pending_feedback();

    let generated = match ctx
        .engine
        .generators()
        .personas
        .create(&state.topic, state.max_analysts, feedback)
        .await
    {
        Ok(analysts) => analysts,
        Err(e) if ctx.config.persona_fallback && e.is_recoverable() => {
            warn!(error = %e, "Persona generation failed, using placeholder analysts");
            placeholder_analysts(&state.topic, state.max_analysts)
        }
        Err(e) => return Err(e),
    };

    let analysts: Vec<Analyst> = generated.into_iter().take(state.max_analysts).collect();
    if !validate_analyst_personas(&analysts) {
        return Err(ResearchError::validation(format!(
            "Invalid analyst personas generated ({} returned)",
            analysts.len()
        )));
    }

    let mut project = ctx.uow.get_project(project_id).await?;
    project.replace_analysts(&analysts);

    let mut tx = ctx.uow.begin();
    for old in &state.analysts {
        tx.delete_analyst(project_id, &old.id);
    }
    for analyst in &analysts {
        tx.create_analyst(project_id, analyst.clone());
    }
    tx.replace_analysts(project_id, &analysts)
        .update_project(project);
    tx.commit().await?;

    info!(
        project_id = %project_id,
        analysts = analysts.len(),
        regenerated = !state.analysts.is_empty(),
        with_feedback = feedback.is_some(),
        "Generated analysts"
    );
    Ok(StateDelta::step(WorkflowStep::AnalystsCreated)
        .with_analysts(analysts)
        .with_analyst_index(0)
        .clearing_feedback())
}

/// Feedback to apply routes back to generation; otherwise the run waits
fn human_feedback(state: &ResearchState) -> StateDelta {
    if state.pending_feedback().is_some() {
        debug!("Human feedback received, regenerating analysts");
        StateDelta::step(WorkflowStep::FeedbackProcessed)
    } else {
        StateDelta::step(WorkflowStep::AwaitingHumanFeedback)
    }
}

async fn conduct_interview(ctx: &StageContext, state: &ResearchState) -> Result<StateDelta> {
    let project_id = require_project_id(state)?;
    if state.analysts.is_empty() {
        return Err(ResearchError::state_transition("No analysts to interview"));
    }
    let index = state.current_analyst_index;
    let analyst = state.current_analyst().ok_or_else(|| {
        ResearchError::state_transition(format!(
            "Analyst index {} out of range ({} analysts)",
            index,
            state.analysts.len()
        ))
    })?;
    if state.interviews.len() != index {
        return Err(ResearchError::state_transition(format!(
            "Expected {} interviews before analyst {}, found {}",
            index,
            index,
            state.interviews.len()
        )));
    }

    let interview = ctx
        .engine
        .conduct_interview(analyst, &state.topic, state.max_interview_turns)
        .await?;

    let mut project = ctx.uow.get_project(project_id).await?;
    project.add_interview(&interview);
    if project.status == ProjectStatus::Created {
        project.advance_status(ProjectStatus::InProgress)?;
    }

    let mut tx = ctx.uow.begin();
    tx.create_interview(project_id, interview.clone())
        .update_project(project);
    tx.commit().await?;

    info!(
        project_id = %project_id,
        analyst = %analyst.name,
        index,
        "Interview recorded"
    );
    Ok(StateDelta::step(WorkflowStep::InterviewCompleted).with_interview(interview))
}

/// The interview for the current analyst; missing means the run skipped one
fn current_interview<'a>(state: &'a ResearchState, analyst: &Analyst) -> Result<&'a Interview> {
    let index = state.current_analyst_index;
    let interview = state.interviews.get(index).ok_or_else(|| {
        ResearchError::state_transition(format!("No interview for analyst {}", index))
    })?;
    if interview.analyst_id != analyst.id {
        return Err(ResearchError::state_transition(format!(
            "Interview {} belongs to another analyst",
            interview.id
        )));
    }
    Ok(interview)
}

async fn write_section(ctx: &StageContext, state: &ResearchState) -> Result<StateDelta> {
    let project_id = require_project_id(state)?;
    let index = state.current_analyst_index;
    let analyst = state.current_analyst().ok_or_else(|| {
        ResearchError::state_transition(format!("Analyst index {} out of range", index))
    })?;
    let interview = current_interview(state, analyst)?;
    if state.sections.len() != index {
        return Err(ResearchError::state_transition(format!(
            "Expected {} sections before analyst {}, found {}",
            index,
            index,
            state.sections.len()
        )));
    }

    let context = section_context(interview);
    let content = match ctx.engine.generators().sections.write(analyst, &context).await {
        Ok(content) => content,
        Err(e) => {
            warn!(analyst = %analyst.name, error = %e, "Section writing failed, using fallback");
            fallback_section(analyst)
        }
    };
    if !validate_section_content(&content) {
        warn!(analyst = %analyst.name, chars = content.chars().count(), "Section content looks low quality");
    }

    let sources = extract_sources(&content);
    let title = section_title(analyst, &state.topic);
    let section = ResearchSection::new(interview, analyst, title, content, sources);

    let mut project = ctx.uow.get_project(project_id).await?;
    project.add_section(&section);

    let mut tx = ctx.uow.begin();
    tx.create_section(project_id, section.clone())
        .update_project(project);
    tx.commit().await?;

    info!(
        project_id = %project_id,
        section = %section.title,
        sources = section.sources.len(),
        "Section written"
    );
    Ok(StateDelta::step(WorkflowStep::SectionWritten).with_section(section))
}

fn advance_analyst(state: &ResearchState) -> StateDelta {
    let next = state.current_analyst_index + 1;
    let step = if next >= state.analysts.len() {
        WorkflowStep::AllAnalystsProcessed
    } else {
        WorkflowStep::NextAnalystReady
    };
    debug!(next_index = next, analysts = state.analysts.len(), step = %step, "Advanced analyst");
    StateDelta::step(step).with_analyst_index(next)
}

async fn complete_research(ctx: &StageContext, state: &ResearchState) -> Result<StateDelta> {
    let project_id = require_project_id(state)?;
    let mut project = ctx.uow.get_project(project_id).await?;

    if project.status != ProjectStatus::Completed {
        project.advance_status(ProjectStatus::Completed)?;
        let mut tx = ctx.uow.begin();
        tx.update_project(project.clone());
        tx.commit().await?;
    }

    let report = FinalReport::assemble(
        &project,
        &state.analysts,
        state.interviews.len(),
        &state.sections,
    );
    info!(
        project_id = %project_id,
        sections = report.total_sections,
        "Research completed"
    );
    Ok(StateDelta::succeeded(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::MockResearchGenerator;
    use crate::ports::{Generators, PersonaGenerator};
    use async_trait::async_trait;

    fn context_with(generators: Generators, config: ResearchConfig) -> StageContext {
        StageContext {
            uow: Arc::new(ResearchUnitOfWork::in_memory()),
            engine: InterviewEngine::new(generators),
            config,
        }
    }

    fn mock_context() -> StageContext {
        let mock = Arc::new(MockResearchGenerator::new());
        context_with(Generators::from_backend(mock.clone(), mock), ResearchConfig::default())
    }

    struct FailingPersonas;

    #[async_trait]
    impl PersonaGenerator for FailingPersonas {
        async fn create(&self, _t: &str, _m: usize, _f: Option<&str>) -> Result<Vec<Analyst>> {
            Err(ResearchError::generation("provider down"))
        }
    }

    struct DuplicatePersonas;

    #[async_trait]
    impl PersonaGenerator for DuplicatePersonas {
        async fn create(&self, _t: &str, _m: usize, _f: Option<&str>) -> Result<Vec<Analyst>> {
            let a = Analyst::new("Same", "Role", "Org", "Long enough description");
            Ok(vec![a.clone(), Analyst::new("Same", "Role", "Org", "Another description")])
        }
    }

    async fn run(ctx: &StageContext, state: &mut ResearchState, stage: Stage) {
        let delta = ctx.execute(stage, state).await.unwrap();
        state.apply(delta);
    }

    #[tokio::test]
    async fn test_create_project_requires_topic() {
        let ctx = mock_context();
        let state = ResearchState::new("  ", 2, 1, None);
        let err = ctx.execute(Stage::CreateProject, &state).await.unwrap_err();
        assert!(matches!(err, ResearchError::Validation(_)));

        let state = ResearchState::new("Rust", 11, 1, None);
        assert!(ctx.execute(Stage::CreateProject, &state).await.is_err());
    }

    #[tokio::test]
    async fn test_create_project_persists_project_and_topic() {
        let ctx = mock_context();
        let mut state = ResearchState::new("Rust", 2, 1, Some("focus".into()));
        run(&ctx, &mut state, Stage::CreateProject).await;

        let project_id = state.project_id.clone().unwrap();
        assert_eq!(state.current_step, WorkflowStep::ProjectCreated);
        let project = ctx.uow.get_project(&project_id).await.unwrap();
        assert_eq!(project.status, ProjectStatus::Created);

        let topics = ctx.uow.get_topics_by_project_id(&project_id).await.unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].human_feedback.as_deref(), Some("focus"));
    }

    #[tokio::test]
    async fn test_generate_analysts_without_project_fails() {
        let ctx = mock_context();
        let state = ResearchState::new("Rust", 2, 1, None);
        let err = ctx.execute(Stage::GenerateAnalysts, &state).await.unwrap_err();
        assert!(matches!(err, ResearchError::StateTransition(_)));
    }

    #[tokio::test]
    async fn test_regeneration_replaces_analysts() {
        let ctx = mock_context();
        let mut state = ResearchState::new("Rust", 3, 1, None);
        run(&ctx, &mut state, Stage::CreateProject).await;
        run(&ctx, &mut state, Stage::GenerateAnalysts).await;
        let first: Vec<String> = state.analysts.iter().map(|a| a.id.clone()).collect();

        state.human_feedback = Some("Add a startup perspective".into());
        run(&ctx, &mut state, Stage::HumanFeedback).await;
        assert_eq!(state.current_step, WorkflowStep::FeedbackProcessed);
        run(&ctx, &mut state, Stage::GenerateAnalysts).await;

        assert!(state.human_feedback.is_none());
        assert_eq!(state.analysts.len(), 3);
        assert_eq!(state.analysts[2].name, "Alex Kim");

        let project_id = state.project_id.clone().unwrap();
        let stored = ctx.uow.get_analysts_by_project_id(&project_id).await.unwrap();
        assert_eq!(stored, state.analysts);
        for id in first {
            assert!(ctx.uow.get_analyst(&id).await.is_err());
        }
    }

    #[tokio::test]
    async fn test_persona_failure_and_fallback() {
        let mock = Arc::new(MockResearchGenerator::new());
        let generators = Generators::from_backend(mock.clone(), mock).with_personas(Arc::new(FailingPersonas));

        let ctx = context_with(generators.clone(), ResearchConfig::default());
        let mut state = ResearchState::new("Rust", 2, 1, None);
        run(&ctx, &mut state, Stage::CreateProject).await;
        let err = ctx.execute(Stage::GenerateAnalysts, &state).await.unwrap_err();
        assert!(matches!(err, ResearchError::Generation(_)));

        let ctx = context_with(generators, ResearchConfig::default().with_persona_fallback(true));
        let mut state = ResearchState::new("Rust", 2, 1, None);
        run(&ctx, &mut state, Stage::CreateProject).await;
        run(&ctx, &mut state, Stage::GenerateAnalysts).await;
        assert_eq!(state.analysts.len(), 2);
        assert_eq!(state.analysts[0].name, "Mock Analyst 1");
    }

    #[tokio::test]
    async fn test_invalid_personas_are_rejected() {
        let mock = Arc::new(MockResearchGenerator::new());
        let generators = Generators::from_backend(mock.clone(), mock).with_personas(Arc::new(DuplicatePersonas));
        let ctx = context_with(generators, ResearchConfig::default());

        let mut state = ResearchState::new("Rust", 2, 1, None);
        run(&ctx, &mut state, Stage::CreateProject).await;
        let err = ctx.execute(Stage::GenerateAnalysts, &state).await.unwrap_err();
        assert!(matches!(err, ResearchError::Validation(_)));

        let project_id = state.project_id.unwrap();
        assert!(ctx.uow.get_analysts_by_project_id(&project_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_gate_waits() {
        let state = ResearchState::new("Rust", 2, 1, Some(" ".into()));
        assert_eq!(human_feedback(&state).step, Some(WorkflowStep::AwaitingHumanFeedback));
    }

    #[tokio::test]
    async fn test_interview_section_and_advance() {
        let ctx = mock_context();
        let mut state = ResearchState::new("Rust", 2, 1, None);
        run(&ctx, &mut state, Stage::CreateProject).await;
        run(&ctx, &mut state, Stage::GenerateAnalysts).await;

        run(&ctx, &mut state, Stage::ConductInterview).await;
        let project_id = state.project_id.clone().unwrap();
        let project = ctx.uow.get_project(&project_id).await.unwrap();
        assert_eq!(project.status, ProjectStatus::InProgress);

        run(&ctx, &mut state, Stage::WriteSection).await;
        let section = &state.sections[0];
        assert_eq!(section.analyst_id, state.analysts[0].id);
        assert_eq!(section.title, "Technical Architect Perspective on Rust");
        assert!(!section.sources.is_empty());

        run(&ctx, &mut state, Stage::AdvanceAnalyst).await;
        assert_eq!(state.current_step, WorkflowStep::NextAnalystReady);
        assert_eq!(state.current_analyst_index, 1);

        // A second section for the same interview is refused
        state.current_analyst_index = 0;
        let err = ctx.execute(Stage::WriteSection, &state).await.unwrap_err();
        assert!(matches!(err, ResearchError::StateTransition(_)));
    }

    #[tokio::test]
    async fn test_write_section_without_interview_is_error() {
        let ctx = mock_context();
        let mut state = ResearchState::new("Rust", 2, 1, None);
        run(&ctx, &mut state, Stage::CreateProject).await;
        run(&ctx, &mut state, Stage::GenerateAnalysts).await;

        let err = ctx.execute(Stage::WriteSection, &state).await.unwrap_err();
        assert!(matches!(err, ResearchError::StateTransition(_)));
    }

    #[tokio::test]
    async fn test_index_out_of_range() {
        let ctx = mock_context();
        let mut state = ResearchState::new("Rust", 1, 1, None);
        run(&ctx, &mut state, Stage::CreateProject).await;
        run(&ctx, &mut state, Stage::GenerateAnalysts).await;
        state.current_analyst_index = 1;

        let err = ctx.execute(Stage::ConductInterview, &state).await.unwrap_err();
        assert!(matches!(err, ResearchError::StateTransition(_)));
        assert_eq!(advance_analyst(&state).step, Some(WorkflowStep::AllAnalystsProcessed));
    }

    #[tokio::test]
    async fn test_complete_research_marks_project() {
        let ctx = mock_context();
        let mut state = ResearchState::new("Rust", 1, 1, None);
        for stage in [
            Stage::CreateProject,
            Stage::GenerateAnalysts,
            Stage::ConductInterview,
            Stage::WriteSection,
            Stage::AdvanceAnalyst,
            Stage::CompleteResearch,
        ] {
            run(&ctx, &mut state, stage).await;
        }

        assert!(state.success());
        let report = state.final_report.unwrap();
        assert!(report.research_completed);
        assert_eq!(report.total_sections, 1);
        assert_eq!(report.sections[0].analyst_name, "Dr. Sarah Chen");

        let project = ctx.uow.get_project(&report.project_id).await.unwrap();
        assert_eq!(project.status, ProjectStatus::Completed);
        assert!(project.completed_at.is_some());
    }
}
