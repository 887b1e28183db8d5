//! Research workflow: state machine, stages and the orchestrator
//!
//! ```text
//! create_project → generate_analysts → human_feedback ─┬─(feedback)→ generate_analysts
//!                                                       └─→ conduct_interview → write_section
//!                                                            → advance_analyst ─┬→ conduct_interview
//!                                                                               └→ complete_research
//! ```

mod config;
mod orchestrator;
mod report;
mod run_store;
mod stages;
mod state;

pub use config::{
    ResearchConfig, DEFAULT_MAX_ANALYSTS, DEFAULT_MAX_INTERVIEW_TURNS, DEFAULT_RUN_ID_PREFIX,
    MAX_INTERVIEW_TURNS,
};
pub use orchestrator::{
    ProjectStatusReport, ResearchOrchestrator, RunOutcome, WorkflowInfo, PAUSED_MESSAGE,
    WORKFLOW_NAME,
};
pub use report::{FinalReport, SectionSummary};
pub use run_store::{new_run_id, FileRunStore, MemoryRunStore, RunRecord, RunStateStore};
pub use stages::StageContext;
pub use state::{
    next_stage, Outcome, ResearchState, Stage, StageExecution, StateDelta, WorkflowStep,
};
