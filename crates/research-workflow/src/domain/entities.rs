//! Research domain entities
//!
//! Analysts, interviews and sections are persisted on their own and
//! referenced from a project by id. The project is the aggregate root for
//! status and reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{ResearchError, Result};

/// Generate a fresh opaque entity id
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// A generated analyst persona
///
/// Immutable once created; regenerating personas creates new analysts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analyst {
    pub id: String,
    pub name: String,
    /// Role of the analyst in the context of the topic
    pub role: String,
    pub affiliation: String,
    /// Focus, concerns and motives
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Analyst {
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        affiliation: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            role: role.into(),
            affiliation: affiliation.into(),
            description: description.into(),
            created_at: Utc::now(),
        }
    }

    /// Persona block handed to question and answer prompts
    pub fn persona(&self) -> String {
        format!(
            "Name: {}\nRole: {}\nAffiliation: {}\nDescription: {}",
            self.name, self.role, self.affiliation, self.description
        )
    }
}

/// The topic a project was started for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchTopic {
    pub id: String,
    pub topic: String,
    pub max_analysts: usize,
    pub human_feedback: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ResearchTopic {
    pub fn new(topic: impl Into<String>, max_analysts: usize, human_feedback: Option<String>) -> Self {
        Self {
            id: new_id(),
            topic: topic.into(),
            max_analysts,
            human_feedback,
            created_at: Utc::now(),
        }
    }
}

/// One analyst/expert exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interview {
    pub id: String,
    pub analyst_id: String,
    pub topic: String,
    pub transcript: String,
    /// Formatted search context gathered during the exchange
    pub context_documents: Vec<String>,
    pub max_turns: usize,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Interview {
    pub fn new(analyst: &Analyst, topic: impl Into<String>, max_turns: usize) -> Self {
        Self {
            id: new_id(),
            analyst_id: analyst.id.clone(),
            topic: topic.into(),
            transcript: String::new(),
            context_documents: Vec::new(),
            max_turns,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn add_context(&mut self, documents: impl IntoIterator<Item = String>) {
        self.context_documents.extend(documents);
    }

    /// Append text to the transcript, separated from earlier text by a blank line
    pub fn append_transcript(&mut self, text: &str) {
        if !self.transcript.is_empty() {
            self.transcript.push_str("\n\n");
        }
        self.transcript.push_str(text);
    }

    /// Mark the interview completed. Completing twice is an integrity error.
    pub fn complete(&mut self) -> Result<()> {
        if self.is_complete() {
            return Err(ResearchError::state_transition(format!(
                "Interview {} is already completed",
                self.id
            )));
        }
        self.completed_at = Some(Utc::now());
        Ok(())
    }
}

/// A report section written from one completed interview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchSection {
    pub id: String,
    pub interview_id: String,
    pub analyst_id: String,
    pub title: String,
    /// Markdown content
    pub content: String,
    pub sources: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ResearchSection {
    pub fn new(
        interview: &Interview,
        analyst: &Analyst,
        title: impl Into<String>,
        content: impl Into<String>,
        sources: Vec<String>,
    ) -> Self {
        Self {
            id: new_id(),
            interview_id: interview.id.clone(),
            analyst_id: analyst.id.clone(),
            title: title.into(),
            content: content.into(),
            sources,
            created_at: Utc::now(),
        }
    }
}

/// Project lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Created,
    InProgress,
    Completed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root of one research run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchProject {
    pub id: String,
    pub topic: String,
    /// Analyst ids in generation order
    pub analyst_ids: Vec<String>,
    pub interview_ids: Vec<String>,
    pub section_ids: Vec<String>,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ResearchProject {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            topic: topic.into(),
            analyst_ids: Vec::new(),
            interview_ids: Vec::new(),
            section_ids: Vec::new(),
            status: ProjectStatus::Created,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Move the project forward. Setting the current status again is a no-op.
    pub fn advance_status(&mut self, status: ProjectStatus) -> Result<()> {
        if status < self.status {
            return Err(ResearchError::state_transition(format!(
                "Project {} cannot move from {} back to {}",
                self.id, self.status, status
            )));
        }
        if status == ProjectStatus::Completed && self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
        self.status = status;
        Ok(())
    }

    /// Replace the analyst list after (re)generation
    pub fn replace_analysts(&mut self, analysts: &[Analyst]) {
        self.analyst_ids = analysts.iter().map(|a| a.id.clone()).collect();
    }

    pub fn add_interview(&mut self, interview: &Interview) {
        self.interview_ids.push(interview.id.clone());
    }

    pub fn add_section(&mut self, section: &ResearchSection) {
        self.section_ids.push(section.id.clone());
    }
}
