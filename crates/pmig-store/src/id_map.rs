//! Identifier map stores
//!
//! Both stores keep the full map in memory for O(1) foreign key resolution.
//! [`JsonlIdMap`] additionally appends every entry to a JSON-lines file so the
//! map outlives the process and feeds later migration stages.

use async_trait::async_trait;
use pmig_core::{IdMapEntry, IdMapError, IdentifierMap, LegacyId, ReferenceResolver, TargetId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// In-memory identifier map
///
/// Used directly by tests and as the staging overlay for preview runs.
#[derive(Debug, Default, Clone)]
pub struct InMemoryIdMap {
    entries: HashMap<(String, LegacyId), TargetId>,
    counts: HashMap<String, usize>,
}

impl InMemoryIdMap {
    /// Create an empty map
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total entries across all entities
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert an entry, refusing to overwrite
    ///
    /// # Errors
    /// - [`IdMapError::AlreadyMapped`] if the key exists
    pub fn insert(&mut self, entry: &IdMapEntry) -> Result<(), IdMapError> {
        let key = (entry.entity.clone(), entry.legacy_id.clone());
        if let Some(existing) = self.entries.get(&key) {
            return Err(IdMapError::AlreadyMapped {
                entity: entry.entity.clone(),
                legacy_id: entry.legacy_id.clone(),
                existing: *existing,
            });
        }
        self.entries.insert(key, entry.target_id);
        *self.counts.entry(entry.entity.clone()).or_default() += 1;
        Ok(())
    }
}

impl ReferenceResolver for InMemoryIdMap {
    fn resolve(&self, entity: &str, legacy_id: &LegacyId) -> Option<TargetId> {
        self.entries
            .get(&(entity.to_string(), legacy_id.clone()))
            .copied()
    }
}

#[async_trait]
impl IdentifierMap for InMemoryIdMap {
    fn count(&self, entity: &str) -> usize {
        self.counts.get(entity).copied().unwrap_or(0)
    }

    async fn record(&mut self, entry: IdMapEntry) -> Result<(), IdMapError> {
        self.insert(&entry)
    }
}

/// Identifier map persisted as an append-only JSON-lines file
#[derive(Debug)]
pub struct JsonlIdMap {
    path: PathBuf,
    index: InMemoryIdMap,
    file: File,
}

impl JsonlIdMap {
    /// Open (or create) the map at `path`, loading every stored entry
    ///
    /// # Errors
    /// - [`IdMapError::Corrupt`] if a stored line does not decode, or two
    ///   lines map the same key
    /// - [`IdMapError::Io`] on filesystem failures
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, IdMapError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut index = InMemoryIdMap::new();
        if fs::try_exists(&path).await? {
            let mut lines = BufReader::new(File::open(&path).await?).lines();
            let mut line_no = 0;
            while let Some(line) = lines.next_line().await? {
                line_no += 1;
                if line.trim().is_empty() {
                    continue;
                }
                let entry: IdMapEntry =
                    serde_json::from_str(&line).map_err(|e| IdMapError::Corrupt {
                        line: line_no,
                        message: e.to_string(),
                    })?;
                index.insert(&entry).map_err(|e| IdMapError::Corrupt {
                    line: line_no,
                    message: e.to_string(),
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        tracing::debug!(path = %path.display(), entries = index.len(), "identifier map loaded");
        Ok(Self { path, index, file })
    }

    /// Location of the backing file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total entries across all entities
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the map has no entries
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl ReferenceResolver for JsonlIdMap {
    fn resolve(&self, entity: &str, legacy_id: &LegacyId) -> Option<TargetId> {
        self.index.resolve(entity, legacy_id)
    }
}

#[async_trait]
impl IdentifierMap for JsonlIdMap {
    fn count(&self, entity: &str) -> usize {
        self.index.count(entity)
    }

    async fn record(&mut self, entry: IdMapEntry) -> Result<(), IdMapError> {
        if let Some(existing) = self.index.resolve(&entry.entity, &entry.legacy_id) {
            return Err(IdMapError::AlreadyMapped {
                entity: entry.entity,
                legacy_id: entry.legacy_id,
                existing,
            });
        }

        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        self.file.write_all(line.as_bytes()).await?;
        self.file.flush().await?;

        self.index.insert(&entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(entity: &str, legacy: impl Into<LegacyId>) -> IdMapEntry {
        IdMapEntry::new(entity, legacy.into(), TargetId::generate())
    }

    #[tokio::test]
    async fn in_memory_refuses_overwrite() {
        let mut map = InMemoryIdMap::new();
        let first = entry("owners", 1);
        map.record(first.clone()).await.unwrap();

        let err = map.record(entry("owners", 1)).await.unwrap_err();
        assert!(matches!(err, IdMapError::AlreadyMapped { existing, .. } if existing == first.target_id));
        assert_eq!(map.resolve("owners", &LegacyId::Int(1)), Some(first.target_id));
        assert_eq!(map.count("owners"), 1);
    }

    #[tokio::test]
    async fn entities_are_separate_namespaces() {
        let mut map = InMemoryIdMap::new();
        map.record(entry("owners", 1)).await.unwrap();
        map.record(entry("pets", 1)).await.unwrap();

        assert_eq!(map.count("owners"), 1);
        assert_eq!(map.count("pets"), 1);
        assert_eq!(map.count("licenses"), 0);
        assert_ne!(
            map.resolve("owners", &LegacyId::Int(1)),
            map.resolve("pets", &LegacyId::Int(1))
        );
    }

    #[tokio::test]
    async fn jsonl_map_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("id_map.jsonl");

        let owner = entry("owners", 10);
        let license = entry("licenses", "L000010");
        {
            let mut map = JsonlIdMap::open(&path).await.unwrap();
            assert!(map.is_empty());
            map.record(owner.clone()).await.unwrap();
            map.record(license.clone()).await.unwrap();
        }

        let mut reopened = JsonlIdMap::open(&path).await.unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.resolve("owners", &LegacyId::Int(10)), Some(owner.target_id));
        assert_eq!(
            reopened.resolve("licenses", &LegacyId::from("L000010")),
            Some(license.target_id)
        );

        let err = reopened.record(entry("owners", 10)).await.unwrap_err();
        assert!(matches!(err, IdMapError::AlreadyMapped { .. }));

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[tokio::test]
    async fn jsonl_map_reports_corrupt_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id_map.jsonl");
        let good = serde_json::to_string(&entry("owners", 1)).unwrap();
        tokio::fs::write(&path, format!("{good}\n\nnot json\n")).await.unwrap();

        let err = JsonlIdMap::open(&path).await.unwrap_err();
        assert!(matches!(err, IdMapError::Corrupt { line: 3, .. }));
    }

    #[tokio::test]
    async fn jsonl_map_rejects_duplicate_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id_map.jsonl");
        let a = serde_json::to_string(&entry("owners", 1)).unwrap();
        let b = serde_json::to_string(&entry("owners", 1)).unwrap();
        tokio::fs::write(&path, format!("{a}\n{b}\n")).await.unwrap();

        let err = JsonlIdMap::open(&path).await.unwrap_err();
        assert!(matches!(err, IdMapError::Corrupt { line: 2, .. }));
    }

    proptest! {
        #[test]
        fn one_entry_per_recorded_key(ids in proptest::collection::vec(0i64..50, 0..100)) {
            let mut map = InMemoryIdMap::new();
            let mut accepted = std::collections::HashSet::new();
            for id in &ids {
                let result = map.insert(&entry("pets", *id));
                prop_assert_eq!(result.is_ok(), accepted.insert(*id));
            }
            prop_assert_eq!(map.count("pets"), accepted.len());
            for id in accepted {
                prop_assert!(map.resolve("pets", &LegacyId::Int(id)).is_some());
            }
        }
    }
}
