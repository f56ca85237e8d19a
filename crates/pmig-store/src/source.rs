//! Legacy sources
//!
//! A legacy table is exported as one JSON object per row. [`JsonlCatalog`]
//! reads `<dir>/<entity>.jsonl`; [`InMemoryCatalog`] serves fixed rows and
//! counts how many were handed out.
//!
//! A line that is not valid JSON is handed to the driver as an unparseable
//! row, so it is skipped and reported like any other record that cannot be
//! mapped.

use async_trait::async_trait;
use pmig_core::{LegacySource, MappingError, SourceCatalog, SourceError, SourceRow};
use serde_json::Value;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

/// Rows of one table held in memory
#[derive(Debug, Clone)]
pub struct InMemorySource {
    rows: Arc<Vec<Value>>,
    served: Arc<AtomicUsize>,
}

impl InMemorySource {
    /// Serve `rows` in order
    #[must_use]
    pub fn new(rows: Vec<Value>) -> Self {
        Self {
            rows: Arc::new(rows),
            served: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Rows handed out so far
    #[inline]
    #[must_use]
    pub fn rows_served(&self) -> usize {
        self.served.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LegacySource for InMemorySource {
    async fn read_batch(
        &mut self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<SourceRow>, SourceError> {
        let batch: Vec<SourceRow> = self
            .rows
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .map(Ok)
            .collect();
        self.served.fetch_add(batch.len(), Ordering::Relaxed);
        Ok(batch)
    }
}

/// Catalog of in-memory tables
#[derive(Debug, Default, Clone)]
pub struct InMemoryCatalog {
    tables: HashMap<String, InMemorySource>,
}

impl InMemoryCatalog {
    /// Create an empty catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a table
    #[must_use]
    pub fn with_table(mut self, entity: &str, rows: Vec<Value>) -> Self {
        self.tables
            .insert(entity.to_string(), InMemorySource::new(rows));
        self
    }

    /// Rows handed out for `entity` across every source opened so far
    #[must_use]
    pub fn rows_served(&self, entity: &str) -> usize {
        self.tables.get(entity).map_or(0, InMemorySource::rows_served)
    }
}

#[async_trait]
impl SourceCatalog for InMemoryCatalog {
    async fn open(&self, entity: &str) -> Result<Box<dyn LegacySource>, SourceError> {
        self.tables
            .get(entity)
            .cloned()
            .map(|s| Box::new(s) as Box<dyn LegacySource>)
            .ok_or_else(|| SourceError::UnknownEntity(entity.to_string()))
    }
}

/// Sequential reader over a JSON-lines export
///
/// Rows are counted by non-blank line. Batches are expected in ascending
/// offset order; a request behind the cursor is rejected.
pub struct JsonlSource {
    lines: Lines<BufReader<File>>,
    line_no: usize,
    cursor: usize,
}

impl JsonlSource {
    /// Open the export at `path` as table `entity`
    ///
    /// # Errors
    /// - [`SourceError::UnknownEntity`] if the file does not exist
    /// - [`SourceError::Io`] on other filesystem failures
    pub async fn open(entity: &str, path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let file = match File::open(path.as_ref()).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SourceError::UnknownEntity(entity.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            lines: BufReader::new(file).lines(),
            line_no: 0,
            cursor: 0,
        })
    }

    async fn next_row(&mut self) -> Result<Option<SourceRow>, SourceError> {
        while let Some(line) = self.lines.next_line().await? {
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            self.cursor += 1;
            let line_no = self.line_no;
            let row = serde_json::from_str(&line)
                .map_err(|e| MappingError::unparseable(format!("line {line_no}: {e}")));
            return Ok(Some(row));
        }
        Ok(None)
    }
}

#[async_trait]
impl LegacySource for JsonlSource {
    async fn read_batch(
        &mut self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<SourceRow>, SourceError> {
        if offset < self.cursor {
            return Err(SourceError::OutOfOrder {
                offset,
                cursor: self.cursor,
            });
        }
        while self.cursor < offset {
            if self.next_row().await?.is_none() {
                return Ok(Vec::new());
            }
        }

        let mut batch = Vec::with_capacity(limit);
        while batch.len() < limit {
            match self.next_row().await? {
                Some(row) => batch.push(row),
                None => break,
            }
        }
        Ok(batch)
    }
}

/// Catalog of JSON-lines exports, one `<entity>.jsonl` per table
#[derive(Debug, Clone)]
pub struct JsonlCatalog {
    dir: PathBuf,
}

impl JsonlCatalog {
    /// Catalog rooted at `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Export path of `entity`
    #[must_use]
    pub fn path_for(&self, entity: &str) -> PathBuf {
        self.dir.join(format!("{entity}.jsonl"))
    }
}

#[async_trait]
impl SourceCatalog for JsonlCatalog {
    async fn open(&self, entity: &str) -> Result<Box<dyn LegacySource>, SourceError> {
        let source = JsonlSource::open(entity, self.path_for(entity)).await?;
        Ok(Box::new(source))
    }
}
