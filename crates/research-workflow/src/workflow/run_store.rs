//! Persistence of suspended runs
//!
//! A run is saved when it pauses at the feedback gate and loaded again when
//! feedback arrives. Two stores:
//!
//! - [`MemoryRunStore`]: process-local
//! - [`FileRunStore`]: one JSON file per run, optionally zstd-compressed
//!
//! ```text
//! runs/
//! ├── research_3f2a....json
//! └── research_9c1b....json.zst
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::state::ResearchState;
use crate::error::{ResearchError, Result};

/// A fresh `{prefix}_{uuid}` run id
pub fn new_run_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

/// A saved run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub state: ResearchState,
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl RunRecord {
    pub fn new(run_id: impl Into<String>, state: ResearchState) -> Self {
        Self {
            run_id: run_id.into(),
            state,
            saved_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[async_trait]
pub trait RunStateStore: Send + Sync {
    /// Save or overwrite a run
    async fn save_run_state(&self, record: &RunRecord) -> Result<()>;

    async fn load_run_state(&self, run_id: &str) -> Result<Option<RunRecord>>;

    /// Deleting an unknown run is not an error
    async fn delete_run_state(&self, run_id: &str) -> Result<()>;

    /// Load and remove a run in one step. Of several concurrent callers for
    /// the same id, at most one gets the record.
    async fn take_run_state(&self, run_id: &str) -> Result<Option<RunRecord>>;

    /// Saved run ids, sorted
    async fn list_runs(&self) -> Result<Vec<String>>;
}

#[derive(Debug, Default)]
pub struct MemoryRunStore {
    runs: RwLock<HashMap<String, RunRecord>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStateStore for MemoryRunStore {
    async fn save_run_state(&self, record: &RunRecord) -> Result<()> {
        self.runs
            .write()
            .await
            .insert(record.run_id.clone(), record.clone());
        Ok(())
    }

    async fn load_run_state(&self, run_id: &str) -> Result<Option<RunRecord>> {
        Ok(self.runs.read().await.get(run_id).cloned())
    }

    async fn delete_run_state(&self, run_id: &str) -> Result<()> {
        self.runs.write().await.remove(run_id);
        Ok(())
    }

    async fn take_run_state(&self, run_id: &str) -> Result<Option<RunRecord>> {
        Ok(self.runs.write().await.remove(run_id))
    }

    async fn list_runs(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.runs.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// Writes go to a temp file first and are renamed into place.
#[derive(Debug)]
pub struct FileRunStore {
    dir: PathBuf,
    compression: bool,
}

impl FileRunStore {
    pub fn new(dir: impl Into<PathBuf>, compression: bool) -> Self {
        Self {
            dir: dir.into(),
            compression,
        }
    }

    fn extension(compressed: bool) -> &'static str {
        if compressed {
            "json.zst"
        } else {
            "json"
        }
    }

    fn run_path(&self, run_id: &str, compressed: bool) -> PathBuf {
        self.dir
            .join(format!("{}.{}", run_id, Self::extension(compressed)))
    }

    fn temp_path(&self, run_id: &str) -> PathBuf {
        self.dir.join(format!("{}.tmp", run_id))
    }

    /// Unique per claimant, so a rename onto it cannot collide
    fn claim_path(&self, run_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}.claim", run_id, Uuid::new_v4().simple()))
    }

    /// `None` when the file does not exist
    async fn read_record(path: &Path, compressed: bool) -> Result<Option<RunRecord>> {
        let data = match fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ResearchError::run_state(format!("Failed to read file: {}", e))),
        };
        let json = if compressed {
            Self::decompress(&data)?
        } else {
            data
        };
        Ok(Some(serde_json::from_slice(&json)?))
    }

    /// Run ids become file names, so keep them to a safe alphabet
    fn check_run_id(run_id: &str) -> Result<()> {
        let safe = !run_id.is_empty()
            && run_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if safe {
            Ok(())
        } else {
            Err(ResearchError::run_state(format!("Invalid run id: {:?}", run_id)))
        }
    }

    async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ResearchError::run_state(format!("Failed to create directory: {}", e)))
    }

    fn compress(data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = zstd::stream::Encoder::new(Vec::new(), 3)
            .map_err(|e| ResearchError::run_state(format!("Compression init failed: {}", e)))?;
        encoder
            .write_all(data)
            .map_err(|e| ResearchError::run_state(format!("Compression write failed: {}", e)))?;
        encoder
            .finish()
            .map_err(|e| ResearchError::run_state(format!("Compression finish failed: {}", e)))
    }

    fn decompress(data: &[u8]) -> Result<Vec<u8>> {
        zstd::stream::decode_all(data)
            .map_err(|e| ResearchError::run_state(format!("Decompression failed: {}", e)))
    }

    /// Run id from a store file name, if it is one
    fn parse_run_id(path: &Path) -> Option<String> {
        let name = path.file_name()?.to_str()?;
        name.strip_suffix(".json.zst")
            .or_else(|| name.strip_suffix(".json"))
            .map(str::to_string)
    }
}

#[async_trait]
impl RunStateStore for FileRunStore {
    async fn save_run_state(&self, record: &RunRecord) -> Result<()> {
        Self::check_run_id(&record.run_id)?;
        self.ensure_dir().await?;

        let json = serde_json::to_vec_pretty(record)?;
        let data = if self.compression {
            Self::compress(&json)?
        } else {
            json
        };

        let temp_path = self.temp_path(&record.run_id);
        let final_path = self.run_path(&record.run_id, self.compression);

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| ResearchError::run_state(format!("Failed to create temp file: {}", e)))?;
        file.write_all(&data)
            .await
            .map_err(|e| ResearchError::run_state(format!("Failed to write data: {}", e)))?;
        file.sync_all()
            .await
            .map_err(|e| ResearchError::run_state(format!("Failed to sync file: {}", e)))?;

        fs::rename(&temp_path, &final_path)
            .await
            .map_err(|e| ResearchError::run_state(format!("Failed to rename file: {}", e)))?;

        // A save with the other compression setting must not leave a stale twin
        let stale = self.run_path(&record.run_id, !self.compression);
        if fs::try_exists(&stale).await.unwrap_or(false) {
            let _ = fs::remove_file(&stale).await;
        }

        debug!(run_id = %record.run_id, bytes = data.len(), "Saved run state");
        Ok(())
    }

    async fn load_run_state(&self, run_id: &str) -> Result<Option<RunRecord>> {
        Self::check_run_id(run_id)?;

        for compressed in [self.compression, !self.compression] {
            if let Some(record) = Self::read_record(&self.run_path(run_id, compressed), compressed).await? {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    async fn delete_run_state(&self, run_id: &str) -> Result<()> {
        Self::check_run_id(run_id)?;
        for compressed in [true, false] {
            match fs::remove_file(self.run_path(run_id, compressed)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(ResearchError::run_state(format!("Failed to delete file: {}", e)))
                }
            }
        }
        Ok(())
    }

    /// Renaming the run file away is the claim; only one rename can win.
    async fn take_run_state(&self, run_id: &str) -> Result<Option<RunRecord>> {
        Self::check_run_id(run_id)?;

        for compressed in [self.compression, !self.compression] {
            let claim = self.claim_path(run_id);
            match fs::rename(self.run_path(run_id, compressed), &claim).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(ResearchError::run_state(format!("Failed to claim run: {}", e)))
                }
            }

            let record = Self::read_record(&claim, compressed).await;
            let _ = fs::remove_file(&claim).await;
            debug!(run_id, "Claimed run state");
            return record;
        }
        Ok(None)
    }

    async fn list_runs(&self) -> Result<Vec<String>> {
        if !fs::try_exists(&self.dir).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| ResearchError::run_state(format!("Failed to read directory: {}", e)))?;

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ResearchError::run_state(format!("Failed to read entry: {}", e)))?
        {
            if let Some(id) = Self::parse_run_id(&entry.path()) {
                ids.push(id);
            }
        }
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(run_id: &str) -> RunRecord {
        RunRecord::new(run_id, ResearchState::new("Rust", 2, 1, None))
            .with_metadata("topic", "Rust")
    }

    #[test]
    fn test_run_id_format() {
        let id = new_run_id("research");
        let (prefix, uuid) = id.split_once('_').unwrap();
        assert_eq!(prefix, "research");
        assert_eq!(uuid.len(), 32);
        assert!(uuid.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(new_run_id("research"), id);
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryRunStore::new();
        store.save_run_state(&record("run_b")).await.unwrap();
        store.save_run_state(&record("run_a")).await.unwrap();

        let loaded = store.load_run_state("run_a").await.unwrap().unwrap();
        assert_eq!(loaded.state.topic, "Rust");
        assert_eq!(loaded.metadata["topic"], "Rust");
        assert_eq!(store.list_runs().await.unwrap(), vec!["run_a", "run_b"]);

        store.delete_run_state("run_a").await.unwrap();
        store.delete_run_state("run_a").await.unwrap();
        assert!(store.load_run_state("run_a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_plain_and_compressed() {
        for compression in [false, true] {
            let dir = TempDir::new().unwrap();
            let store = FileRunStore::new(dir.path(), compression);
            let saved = record("research_abc");

            store.save_run_state(&saved).await.unwrap();
            let ext = if compression { "json.zst" } else { "json" };
            assert!(dir.path().join(format!("research_abc.{}", ext)).exists());
            assert!(!dir.path().join("research_abc.tmp").exists());

            let loaded = store.load_run_state("research_abc").await.unwrap().unwrap();
            assert_eq!(loaded, saved);
            assert_eq!(store.list_runs().await.unwrap(), vec!["research_abc"]);

            store.delete_run_state("research_abc").await.unwrap();
            assert!(store.load_run_state("research_abc").await.unwrap().is_none());
            assert!(store.list_runs().await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_memory_store_take_is_exclusive() {
        let store = MemoryRunStore::new();
        store.save_run_state(&record("run_a")).await.unwrap();

        let (first, second) = tokio::join!(store.take_run_state("run_a"), store.take_run_state("run_a"));
        let taken = [first.unwrap(), second.unwrap()];
        assert_eq!(taken.iter().filter(|r| r.is_some()).count(), 1);
        assert!(store.load_run_state("run_a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_take_is_exclusive() {
        for compression in [false, true] {
            let dir = TempDir::new().unwrap();
            let store = FileRunStore::new(dir.path(), compression);
            let saved = record("research_take");
            store.save_run_state(&saved).await.unwrap();

            let (first, second) = tokio::join!(
                store.take_run_state("research_take"),
                store.take_run_state("research_take")
            );
            let taken: Vec<RunRecord> = [first.unwrap(), second.unwrap()].into_iter().flatten().collect();
            assert_eq!(taken, vec![saved]);

            assert!(store.list_runs().await.unwrap().is_empty());
            assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
            assert!(store.take_run_state("research_take").await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_file_store_reads_other_compression() {
        let dir = TempDir::new().unwrap();
        FileRunStore::new(dir.path(), true)
            .save_run_state(&record("run_1"))
            .await
            .unwrap();

        let plain = FileRunStore::new(dir.path(), false);
        assert!(plain.load_run_state("run_1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_file_store_missing_dir_and_bad_ids() {
        let dir = TempDir::new().unwrap();
        let store = FileRunStore::new(dir.path().join("never-created"), false);
        assert!(store.list_runs().await.unwrap().is_empty());
        assert!(store.load_run_state("nope").await.unwrap().is_none());

        let err = store.load_run_state("../escape").await.unwrap_err();
        assert!(matches!(err, ResearchError::RunState(_)));
    }
}
