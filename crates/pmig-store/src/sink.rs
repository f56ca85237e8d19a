//! Record sinks
//!
//! Written records carry their new target id under `"id"` ahead of the mapped
//! fields.

use async_trait::async_trait;
use parking_lot::Mutex;
use pmig_core::{PersistenceError, RecordSink, TargetId};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// One record as it landed in a sink
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// Entity the record was written to
    pub entity: String,
    /// Assigned target id
    pub target_id: TargetId,
    /// Mapped fields
    pub record: Map<String, Value>,
}

fn with_id(target_id: TargetId, record: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::with_capacity(record.len() + 1);
    out.insert("id".to_string(), Value::String(target_id.to_string()));
    for (k, v) in record {
        if k != "id" {
            out.insert(k.clone(), v.clone());
        }
    }
    out
}

/// Sink collecting records in memory
///
/// Clones share the same storage, so a handle kept by the caller observes
/// writes made through a clone handed to the pipeline.
#[derive(Debug, Default, Clone)]
pub struct InMemorySink {
    records: Arc<Mutex<Vec<StoredRecord>>>,
}

impl InMemorySink {
    /// Create an empty sink
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored record
    #[must_use]
    pub fn records(&self) -> Vec<StoredRecord> {
        self.records.lock().clone()
    }

    /// Records stored for `entity`
    #[must_use]
    pub fn count(&self, entity: &str) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|r| r.entity == entity)
            .count()
    }

    /// Total stored records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether nothing was stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl RecordSink for InMemorySink {
    async fn persist(
        &mut self,
        entity: &str,
        target_id: TargetId,
        record: &Map<String, Value>,
    ) -> Result<(), PersistenceError> {
        self.records.lock().push(StoredRecord {
            entity: entity.to_string(),
            target_id,
            record: record.clone(),
        });
        Ok(())
    }
}

/// Sink appending one JSON object per line to `<dir>/<entity>.jsonl`
///
/// Every record is flushed before `persist` returns, so an identifier map
/// entry recorded afterwards never points at a lost write.
#[derive(Debug)]
pub struct JsonlSink {
    dir: PathBuf,
    files: HashMap<String, File>,
}

impl JsonlSink {
    /// Sink rooted at `dir`, created if missing
    ///
    /// # Errors
    /// - [`PersistenceError::Io`] if the directory cannot be created
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            files: HashMap::new(),
        })
    }

    /// Output path of `entity`
    #[must_use]
    pub fn path_for(&self, entity: &str) -> PathBuf {
        self.dir.join(format!("{entity}.jsonl"))
    }

    async fn file_for(&mut self, entity: &str) -> Result<&mut File, PersistenceError> {
        if !self.files.contains_key(entity) {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.path_for(entity))
                .await?;
            self.files.insert(entity.to_string(), file);
        }
        self.files
            .get_mut(entity)
            .ok_or_else(|| PersistenceError::Rejected(format!("no output file for `{entity}`")))
    }
}

#[async_trait]
impl RecordSink for JsonlSink {
    async fn persist(
        &mut self,
        entity: &str,
        target_id: TargetId,
        record: &Map<String, Value>,
    ) -> Result<(), PersistenceError> {
        let mut line = serde_json::to_string(&with_id(target_id, record))?;
        line.push('\n');

        let file = self.file_for(entity).await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), PersistenceError> {
        for file in self.files.values_mut() {
            file.sync_data().await?;
        }
        Ok(())
    }
}
