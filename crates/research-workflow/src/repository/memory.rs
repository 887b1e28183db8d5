//! In-memory repository

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{Entity, Repository};
use crate::error::{ResearchError, Result};

#[derive(Debug)]
struct Table<T> {
    /// Ids in insertion order
    order: Vec<String>,
    rows: HashMap<String, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            rows: HashMap::new(),
        }
    }
}

/// Repository backed by a `HashMap`; `list_all` keeps insertion order
#[derive(Debug)]
pub struct MemoryRepository<T> {
    table: RwLock<Table<T>>,
}

impl<T> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self {
            table: RwLock::new(Table::default()),
        }
    }
}

impl<T> MemoryRepository<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for MemoryRepository<T> {
    async fn create(&self, entity: T) -> Result<T> {
        let mut table = self.table.write().await;
        let id = entity.id().to_string();
        if table.rows.contains_key(&id) {
            return Err(ResearchError::repository(format!(
                "{} {} already exists",
                T::KIND,
                id
            )));
        }
        table.order.push(id.clone());
        table.rows.insert(id, entity.clone());
        Ok(entity)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<T>> {
        Ok(self.table.read().await.rows.get(id).cloned())
    }

    async fn update(&self, entity: T) -> Result<T> {
        let mut table = self.table.write().await;
        match table.rows.get_mut(entity.id()) {
            Some(row) => {
                *row = entity.clone();
                Ok(entity)
            }
            None => Err(ResearchError::not_found(T::KIND, entity.id())),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut table = self.table.write().await;
        if table.rows.remove(id).is_none() {
            return Ok(false);
        }
        table.order.retain(|existing| existing != id);
        Ok(true)
    }

    async fn list_all(&self) -> Result<Vec<T>> {
        let table = self.table.read().await;
        Ok(table
            .order
            .iter()
            .filter_map(|id| table.rows.get(id).cloned())
            .collect())
    }
}
