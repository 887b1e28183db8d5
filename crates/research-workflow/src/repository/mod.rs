//! Storage ports for research entities
//!
//! [`Repository`] is the generic CRUD contract. The per-entity traits add
//! typed lookups with default implementations over `list_all`, so a backend
//! only overrides the ones it can answer faster.

mod memory;
mod unit_of_work;

pub use memory::MemoryRepository;
pub use unit_of_work::{Change, ChildKind, Repositories, ResearchUnitOfWork, Transaction};

use async_trait::async_trait;

use crate::domain::{
    Analyst, Interview, ProjectStatus, ResearchProject, ResearchSection, ResearchTopic,
};
use crate::error::Result;

/// Anything a repository can store
pub trait Entity: Clone + Send + Sync + 'static {
    /// Used in NotFound errors and logs
    const KIND: &'static str;

    fn id(&self) -> &str;
}

impl Entity for ResearchProject {
    const KIND: &'static str = "Project";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for ResearchTopic {
    const KIND: &'static str = "Topic";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Analyst {
    const KIND: &'static str = "Analyst";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Interview {
    const KIND: &'static str = "Interview";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for ResearchSection {
    const KIND: &'static str = "Section";

    fn id(&self) -> &str {
        &self.id
    }
}

#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// Store a new entity. An existing id is a repository error.
    async fn create(&self, entity: T) -> Result<T>;

    async fn get_by_id(&self, id: &str) -> Result<Option<T>>;

    /// Replace a stored entity. An unknown id is NotFound.
    async fn update(&self, entity: T) -> Result<T>;

    /// Returns whether anything was removed
    async fn delete(&self, id: &str) -> Result<bool>;

    /// All entities in insertion order
    async fn list_all(&self) -> Result<Vec<T>>;

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.get_by_id(id).await?.is_some())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.list_all().await?.len())
    }
}

async fn filter_all<T, R, F>(repo: &R, keep: F) -> Result<Vec<T>>
where
    T: Entity,
    R: Repository<T> + ?Sized,
    F: Fn(&T) -> bool + Send,
{
    Ok(repo.list_all().await?.into_iter().filter(|e| keep(e)).collect())
}

#[async_trait]
pub trait ProjectRepository: Repository<ResearchProject> {
    async fn get_by_topic(&self, topic: &str) -> Result<Vec<ResearchProject>> {
        filter_all(self, |p: &ResearchProject| p.topic == topic).await
    }

    async fn get_by_status(&self, status: ProjectStatus) -> Result<Vec<ResearchProject>> {
        filter_all(self, |p: &ResearchProject| p.status == status).await
    }
}

#[async_trait]
pub trait TopicRepository: Repository<ResearchTopic> {
    async fn get_by_topic(&self, topic: &str) -> Result<Vec<ResearchTopic>> {
        filter_all(self, |t: &ResearchTopic| t.topic == topic).await
    }
}

#[async_trait]
pub trait AnalystRepository: Repository<Analyst> {
    async fn get_by_role(&self, role: &str) -> Result<Vec<Analyst>> {
        filter_all(self, |a: &Analyst| a.role == role).await
    }

    async fn get_by_affiliation(&self, affiliation: &str) -> Result<Vec<Analyst>> {
        filter_all(self, |a: &Analyst| a.affiliation == affiliation).await
    }
}

#[async_trait]
pub trait InterviewRepository: Repository<Interview> {
    async fn get_by_analyst_id(&self, analyst_id: &str) -> Result<Vec<Interview>> {
        filter_all(self, |i: &Interview| i.analyst_id == analyst_id).await
    }

    async fn get_completed(&self) -> Result<Vec<Interview>> {
        filter_all(self, |i: &Interview| i.is_complete()).await
    }

    async fn get_pending(&self) -> Result<Vec<Interview>> {
        filter_all(self, |i: &Interview| !i.is_complete()).await
    }
}

#[async_trait]
pub trait SectionRepository: Repository<ResearchSection> {
    async fn get_by_interview_id(&self, interview_id: &str) -> Result<Vec<ResearchSection>> {
        filter_all(self, |s: &ResearchSection| s.interview_id == interview_id).await
    }

    async fn get_by_analyst_id(&self, analyst_id: &str) -> Result<Vec<ResearchSection>> {
        filter_all(self, |s: &ResearchSection| s.analyst_id == analyst_id).await
    }
}

impl ProjectRepository for MemoryRepository<ResearchProject> {}
impl TopicRepository for MemoryRepository<ResearchTopic> {}
impl AnalystRepository for MemoryRepository<Analyst> {}
impl InterviewRepository for MemoryRepository<Interview> {}
impl SectionRepository for MemoryRepository<ResearchSection> {}
