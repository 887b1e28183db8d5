//! Research domain: entities and the pure rules around them

mod analyst;
mod entities;
mod interview;
mod progress;
mod section;

pub use analyst::{
    affiliations, find_analyst, should_recreate_analysts, specializations,
    validate_analyst_personas, validate_analyst_requirements, MAX_ANALYSTS, MIN_DESCRIPTION_LEN,
};
pub use entities::{
    new_id, Analyst, Interview, ProjectStatus, ResearchProject, ResearchSection, ResearchTopic,
};
pub use interview::{
    extract_search_context, format_transcript, should_continue_interview,
    validate_interview_progression, InterviewSummary, Message, Speaker, SIGN_OFF_PHRASE,
};
pub use progress::{get_project_progress, is_project_complete, ProjectOverview, ProjectProgress};
pub(crate) use section::char_prefix;
pub use section::{
    extract_sources, section_context, section_title, validate_section_content, MIN_SECTION_LEN,
};
