//! Core migration types
//!
//! Identifiers on both sides of a migration, identifier map entries and the
//! per-run context handed to mappers and validators.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a record in the legacy store
///
/// Legacy tables key their rows either by an integer or by a fixed-length
/// string code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegacyId {
    /// Integer primary key
    Int(i64),
    /// String key (e.g. a license number)
    Key(String),
}

impl LegacyId {
    /// Extract a legacy id from a raw JSON value
    ///
    /// Accepts integers and strings that are non-empty once trimmed; anything
    /// else yields `None`. String keys are trimmed.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(Self::Int),
            serde_json::Value::String(s) => {
                let key = s.trim();
                (!key.is_empty()).then(|| Self::Key(key.to_string()))
            }
            _ => None,
        }
    }
}

impl fmt::Display for LegacyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Key(s) => f.write_str(s),
        }
    }
}

impl From<i64> for LegacyId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for LegacyId {
    fn from(value: &str) -> Self {
        Self::Key(value.to_string())
    }
}

impl From<String> for LegacyId {
    fn from(value: String) -> Self {
        Self::Key(value)
    }
}

/// Identifier assigned to a record in the target system
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(pub Uuid);

impl TargetId {
    /// Generate a fresh target id
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Durable legacy → target correspondence for one written record
///
/// Entries are created at the moment a record is written and never change
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdMapEntry {
    /// Entity (legacy table) the record belongs to
    pub entity: String,
    /// Legacy identifier
    pub legacy_id: LegacyId,
    /// Identifier in the target system
    pub target_id: TargetId,
    /// When the record was written
    pub migrated_at: DateTime<Utc>,
}

impl IdMapEntry {
    /// Create an entry stamped with the current time
    #[must_use]
    pub fn new(entity: impl Into<String>, legacy_id: LegacyId, target_id: TargetId) -> Self {
        Self {
            entity: entity.into(),
            legacy_id,
            target_id,
            migrated_at: Utc::now(),
        }
    }
}

/// Context shared by every mapper and validator in one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationContext {
    /// Reference date for date-range rules
    pub as_of: NaiveDate,
}

impl MigrationContext {
    /// Context pinned to a given reference date
    #[inline]
    #[must_use]
    pub fn new(as_of: NaiveDate) -> Self {
        Self { as_of }
    }

    /// Context pinned to today's UTC date
    #[must_use]
    pub fn today() -> Self {
        Self::new(Utc::now().date_naive())
    }
}
