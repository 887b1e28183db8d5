//! Unit of work over the research repositories
//!
//! A workflow stage stages its writes on a [`Transaction`] and commits them
//! together. Changes are applied in order; when one fails, the ones already
//! applied are compensated in reverse so the stage leaves nothing behind.
//! Dropping a transaction without committing discards it.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use super::{
    AnalystRepository, InterviewRepository, MemoryRepository, ProjectRepository, Repository,
    SectionRepository, TopicRepository,
};
use crate::domain::{
    Analyst, Interview, ProjectOverview, ResearchProject, ResearchSection, ResearchTopic,
};
use crate::error::{ResearchError, Result};

/// The repositories a unit of work coordinates
#[derive(Clone)]
pub struct Repositories {
    pub projects: Arc<dyn ProjectRepository>,
    pub topics: Arc<dyn TopicRepository>,
    pub analysts: Arc<dyn AnalystRepository>,
    pub interviews: Arc<dyn InterviewRepository>,
    pub sections: Arc<dyn SectionRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            projects: Arc::new(MemoryRepository::<ResearchProject>::new()),
            topics: Arc::new(MemoryRepository::<ResearchTopic>::new()),
            analysts: Arc::new(MemoryRepository::<Analyst>::new()),
            interviews: Arc::new(MemoryRepository::<Interview>::new()),
            sections: Arc::new(MemoryRepository::<ResearchSection>::new()),
        }
    }
}

/// Kinds of entity a project owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildKind {
    Topic,
    Analyst,
    Interview,
    Section,
}

/// project_id -> child ids, per child kind, in association order
#[derive(Debug, Default)]
struct AssociationIndex {
    links: HashMap<(ChildKind, String), Vec<String>>,
}

impl AssociationIndex {
    fn ids(&self, kind: ChildKind, project_id: &str) -> Vec<String> {
        self.links
            .get(&(kind, project_id.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    fn associate(&mut self, kind: ChildKind, project_id: &str, child_id: &str) {
        let ids = self.links.entry((kind, project_id.to_string())).or_default();
        if !ids.iter().any(|id| id == child_id) {
            ids.push(child_id.to_string());
        }
    }

    /// Returns the position the child held
    fn dissociate(&mut self, kind: ChildKind, project_id: &str, child_id: &str) -> Option<usize> {
        let ids = self.links.get_mut(&(kind, project_id.to_string()))?;
        let position = ids.iter().position(|id| id == child_id)?;
        ids.remove(position);
        Some(position)
    }

    fn insert_at(&mut self, kind: ChildKind, project_id: &str, child_id: &str, position: usize) {
        let ids = self.links.entry((kind, project_id.to_string())).or_default();
        if !ids.iter().any(|id| id == child_id) {
            ids.insert(position.min(ids.len()), child_id.to_string());
        }
    }

    /// Returns the previous ids
    fn replace(&mut self, kind: ChildKind, project_id: &str, child_ids: Vec<String>) -> Vec<String> {
        self.links
            .insert((kind, project_id.to_string()), child_ids)
            .unwrap_or_default()
    }
}

/// One staged write
#[derive(Debug, Clone)]
pub enum Change {
    CreateProject(ResearchProject),
    UpdateProject(ResearchProject),
    CreateTopic { project_id: String, topic: ResearchTopic },
    CreateAnalyst { project_id: String, analyst: Analyst },
    DeleteAnalyst { project_id: String, analyst_id: String },
    /// Set the project's analyst association to exactly these ids
    ReplaceAnalysts { project_id: String, analyst_ids: Vec<String> },
    CreateInterview { project_id: String, interview: Interview },
    CreateSection { project_id: String, section: ResearchSection },
}

impl Change {
    fn label(&self) -> &'static str {
        match self {
            Self::CreateProject(_) => "create_project",
            Self::UpdateProject(_) => "update_project",
            Self::CreateTopic { .. } => "create_topic",
            Self::CreateAnalyst { .. } => "create_analyst",
            Self::DeleteAnalyst { .. } => "delete_analyst",
            Self::ReplaceAnalysts { .. } => "replace_analysts",
            Self::CreateInterview { .. } => "create_interview",
            Self::CreateSection { .. } => "create_section",
        }
    }
}

/// How to take back an applied change
#[derive(Debug)]
enum Undo {
    DeleteProject(String),
    RestoreProject(ResearchProject),
    DeleteTopic { project_id: String, topic_id: String },
    DeleteAnalyst { project_id: String, analyst_id: String },
    /// `position` is where the analyst sat in the project's list
    RestoreAnalyst { project_id: String, analyst: Analyst, position: Option<usize> },
    RestoreAnalystLinks { project_id: String, analyst_ids: Vec<String> },
    DeleteInterview { project_id: String, interview_id: String },
    DeleteSection { project_id: String, section_id: String },
}

/// Coordinates the repositories and the project association index
pub struct ResearchUnitOfWork {
    repos: Repositories,
    index: RwLock<AssociationIndex>,
}

impl Default for ResearchUnitOfWork {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl ResearchUnitOfWork {
    pub fn new(repos: Repositories) -> Self {
        Self {
            repos,
            index: RwLock::new(AssociationIndex::default()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Repositories::in_memory())
    }

    pub fn repositories(&self) -> &Repositories {
        &self.repos
    }

    pub fn begin(&self) -> Transaction<'_> {
        Transaction {
            uow: self,
            changes: Vec::new(),
        }
    }

    pub async fn get_project(&self, project_id: &str) -> Result<ResearchProject> {
        self.repos
            .projects
            .get_by_id(project_id)
            .await?
            .ok_or_else(|| ResearchError::not_found("Project", project_id))
    }

    pub async fn get_analyst(&self, analyst_id: &str) -> Result<Analyst> {
        self.repos
            .analysts
            .get_by_id(analyst_id)
            .await?
            .ok_or_else(|| ResearchError::not_found("Analyst", analyst_id))
    }

    pub async fn get_interview(&self, interview_id: &str) -> Result<Interview> {
        self.repos
            .interviews
            .get_by_id(interview_id)
            .await?
            .ok_or_else(|| ResearchError::not_found("Interview", interview_id))
    }

    /// Link a persisted child to a project outside of a transaction
    pub async fn associate_with_project(&self, project_id: &str, kind: ChildKind, child_id: &str) {
        self.index.write().await.associate(kind, project_id, child_id);
    }

    pub async fn get_topics_by_project_id(&self, project_id: &str) -> Result<Vec<ResearchTopic>> {
        let ids = self.index.read().await.ids(ChildKind::Topic, project_id);
        let mut topics = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(topic) = self.repos.topics.get_by_id(&id).await? {
                topics.push(topic);
            }
        }
        Ok(topics)
    }

    pub async fn get_analysts_by_project_id(&self, project_id: &str) -> Result<Vec<Analyst>> {
        let ids = self.index.read().await.ids(ChildKind::Analyst, project_id);
        let mut analysts = Vec::with_capacity(ids.len());
        for id in ids {
            analysts.push(self.get_analyst(&id).await?);
        }
        Ok(analysts)
    }

    pub async fn get_interviews_by_project_id(&self, project_id: &str) -> Result<Vec<Interview>> {
        let ids = self.index.read().await.ids(ChildKind::Interview, project_id);
        let mut interviews = Vec::with_capacity(ids.len());
        for id in ids {
            interviews.push(self.get_interview(&id).await?);
        }
        Ok(interviews)
    }

    pub async fn get_sections_by_project_id(&self, project_id: &str) -> Result<Vec<ResearchSection>> {
        let ids = self.index.read().await.ids(ChildKind::Section, project_id);
        let mut sections = Vec::with_capacity(ids.len());
        for id in ids {
            let section = self
                .repos
                .sections
                .get_by_id(&id)
                .await?
                .ok_or_else(|| ResearchError::not_found("Section", id.as_str()))?;
            sections.push(section);
        }
        Ok(sections)
    }

    /// The project joined with its associated children
    pub async fn project_overview(&self, project_id: &str) -> Result<ProjectOverview> {
        Ok(ProjectOverview {
            project: self.get_project(project_id).await?,
            analysts: self.get_analysts_by_project_id(project_id).await?,
            interviews: self.get_interviews_by_project_id(project_id).await?,
            sections: self.get_sections_by_project_id(project_id).await?,
        })
    }

    async fn apply(&self, change: Change) -> Result<Undo> {
        let repos = &self.repos;
        match change {
            Change::CreateProject(project) => {
                let project = repos.projects.create(project).await?;
                Ok(Undo::DeleteProject(project.id))
            }
            Change::UpdateProject(project) => {
                let previous = self.get_project(&project.id).await?;
                repos.projects.update(project).await?;
                Ok(Undo::RestoreProject(previous))
            }
            Change::CreateTopic { project_id, topic } => {
                let topic = repos.topics.create(topic).await?;
                self.index
                    .write()
                    .await
                    .associate(ChildKind::Topic, &project_id, &topic.id);
                Ok(Undo::DeleteTopic {
                    project_id,
                    topic_id: topic.id,
                })
            }
            Change::CreateAnalyst { project_id, analyst } => {
                let analyst = repos.analysts.create(analyst).await?;
                self.associate_with_project(&project_id, ChildKind::Analyst, &analyst.id)
                    .await;
                Ok(Undo::DeleteAnalyst {
                    project_id,
                    analyst_id: analyst.id,
                })
            }
            Change::DeleteAnalyst {
                project_id,
                analyst_id,
            } => {
                let analyst = self.get_analyst(&analyst_id).await?;
                repos.analysts.delete(&analyst_id).await?;
                let position =
                    self.index
                        .write()
                        .await
                        .dissociate(ChildKind::Analyst, &project_id, &analyst_id);
                Ok(Undo::RestoreAnalyst {
                    project_id,
                    analyst,
                    position,
                })
            }
            Change::ReplaceAnalysts {
                project_id,
                analyst_ids,
            } => {
                let previous =
                    self.index
                        .write()
                        .await
                        .replace(ChildKind::Analyst, &project_id, analyst_ids);
                Ok(Undo::RestoreAnalystLinks {
                    project_id,
                    analyst_ids: previous,
                })
            }
            Change::CreateInterview {
                project_id,
                interview,
            } => {
                let interview = repos.interviews.create(interview).await?;
                self.index
                    .write()
                    .await
                    .associate(ChildKind::Interview, &project_id, &interview.id);
                Ok(Undo::DeleteInterview {
                    project_id,
                    interview_id: interview.id,
                })
            }
            Change::CreateSection {
                project_id,
                section,
            } => {
                let section = repos.sections.create(section).await?;
                self.index
                    .write()
                    .await
                    .associate(ChildKind::Section, &project_id, &section.id);
                Ok(Undo::DeleteSection {
                    project_id,
                    section_id: section.id,
                })
            }
        }
    }

    async fn compensate(&self, undo: Undo) -> Result<()> {
        let repos = &self.repos;
        match undo {
            Undo::DeleteProject(id) => {
                repos.projects.delete(&id).await?;
            }
            Undo::RestoreProject(project) => {
                repos.projects.update(project).await?;
            }
            Undo::DeleteTopic {
                project_id,
                topic_id,
            } => {
                repos.topics.delete(&topic_id).await?;
                self.index
                    .write()
                    .await
                    .dissociate(ChildKind::Topic, &project_id, &topic_id);
            }
            Undo::DeleteAnalyst {
                project_id,
                analyst_id,
            } => {
                repos.analysts.delete(&analyst_id).await?;
                self.index
                    .write()
                    .await
                    .dissociate(ChildKind::Analyst, &project_id, &analyst_id);
            }
            Undo::RestoreAnalyst {
                project_id,
                analyst,
                position,
            } => {
                let analyst = repos.analysts.create(analyst).await?;
                // Undos run in reverse, so each recorded position is valid again here
                if let Some(position) = position {
                    self.index.write().await.insert_at(
                        ChildKind::Analyst,
                        &project_id,
                        &analyst.id,
                        position,
                    );
                }
            }
            Undo::RestoreAnalystLinks {
                project_id,
                analyst_ids,
            } => {
                self.index
                    .write()
                    .await
                    .replace(ChildKind::Analyst, &project_id, analyst_ids);
            }
            Undo::DeleteInterview {
                project_id,
                interview_id,
            } => {
                repos.interviews.delete(&interview_id).await?;
                self.index
                    .write()
                    .await
                    .dissociate(ChildKind::Interview, &project_id, &interview_id);
            }
            Undo::DeleteSection {
                project_id,
                section_id,
            } => {
                repos.sections.delete(&section_id).await?;
                self.index
                    .write()
                    .await
                    .dissociate(ChildKind::Section, &project_id, &section_id);
            }
        }
        Ok(())
    }
}

/// Writes staged by one workflow stage
#[must_use = "a transaction does nothing until committed"]
pub struct Transaction<'a> {
    uow: &'a ResearchUnitOfWork,
    changes: Vec<Change>,
}

impl Transaction<'_> {
    pub fn stage(&mut self, change: Change) -> &mut Self {
        self.changes.push(change);
        self
    }

    pub fn create_project(&mut self, project: ResearchProject) -> &mut Self {
        self.stage(Change::CreateProject(project))
    }

    pub fn update_project(&mut self, project: ResearchProject) -> &mut Self {
        self.stage(Change::UpdateProject(project))
    }

    pub fn create_topic(&mut self, project_id: &str, topic: ResearchTopic) -> &mut Self {
        self.stage(Change::CreateTopic {
            project_id: project_id.to_string(),
            topic,
        })
    }

    pub fn create_analyst(&mut self, project_id: &str, analyst: Analyst) -> &mut Self {
        self.stage(Change::CreateAnalyst {
            project_id: project_id.to_string(),
            analyst,
        })
    }

    pub fn delete_analyst(&mut self, project_id: &str, analyst_id: &str) -> &mut Self {
        self.stage(Change::DeleteAnalyst {
            project_id: project_id.to_string(),
            analyst_id: analyst_id.to_string(),
        })
    }

    pub fn replace_analysts(&mut self, project_id: &str, analysts: &[Analyst]) -> &mut Self {
        self.stage(Change::ReplaceAnalysts {
            project_id: project_id.to_string(),
            analyst_ids: analysts.iter().map(|a| a.id.clone()).collect(),
        })
    }

    pub fn create_interview(&mut self, project_id: &str, interview: Interview) -> &mut Self {
        self.stage(Change::CreateInterview {
            project_id: project_id.to_string(),
            interview,
        })
    }

    pub fn create_section(&mut self, project_id: &str, section: ResearchSection) -> &mut Self {
        self.stage(Change::CreateSection {
            project_id: project_id.to_string(),
            section,
        })
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Apply every staged change, or none of them
    pub async fn commit(self) -> Result<()> {
        let total = self.changes.len();
        let mut applied = Vec::with_capacity(total);

        for change in self.changes {
            let label = change.label();
            match self.uow.apply(change).await {
                Ok(undo) => applied.push(undo),
                Err(e) => {
                    warn!(change = label, error = %e, rolled_back = applied.len(), "Commit failed, compensating");
                    for undo in applied.into_iter().rev() {
                        if let Err(undo_err) = self.uow.compensate(undo).await {
                            error!(error = %undo_err, "Compensation failed");
                        }
                    }
                    return Err(e);
                }
            }
        }

        debug!(changes = total, "Transaction committed");
        Ok(())
    }
}
