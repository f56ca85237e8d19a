//! Error types for legacy record migration
//!
//! Per-record failures and store failures are kept apart:
//! - [`MappingError`] and [`ValidationRejection`] are never fatal; the record
//!   is skipped and reported
//! - [`PersistenceError`] is fatal unless the run is fault tolerant
//! - [`SourceError`] and [`IdMapError`] always abort the run; a single row
//!   that cannot be decoded is a [`MappingError`], not a [`SourceError`]

use crate::types::{LegacyId, TargetId};

/// A legacy record could not be translated into the target shape
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot map field `{field}`: {kind}")]
pub struct MappingError {
    /// Field that failed to translate
    pub field: String,
    /// What went wrong
    pub kind: MappingFailure,
}

/// Reason a field failed to translate
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingFailure {
    /// The record does not have the expected shape at all
    #[error("unparseable record ({0})")]
    Unparseable(String),

    /// Required field absent or empty
    #[error("missing value")]
    Missing,

    /// Value outside the legacy code table
    #[error("invalid enumerated value `{value}`")]
    InvalidEnumValue {
        /// Code as found in the legacy row
        value: String,
    },

    /// Value present but not in the expected format
    #[error("malformed value `{value}`, expected {expected}")]
    Malformed {
        /// Value as found in the legacy row
        value: String,
        /// Format the value should have had
        expected: String,
    },
}

impl MappingError {
    /// Whole-record parse failure
    #[must_use]
    pub fn unparseable(message: impl Into<String>) -> Self {
        Self {
            field: "*".to_string(),
            kind: MappingFailure::Unparseable(message.into()),
        }
    }

    /// Required field missing
    #[must_use]
    pub fn missing(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: MappingFailure::Missing,
        }
    }

    /// Unknown code in an enumerated column
    #[must_use]
    pub fn invalid_enum(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: MappingFailure::InvalidEnumValue {
                value: value.into(),
            },
        }
    }

    /// Value in the wrong format
    #[must_use]
    pub fn malformed(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            kind: MappingFailure::Malformed {
                value: value.into(),
                expected: expected.into(),
            },
        }
    }
}

/// A mapped record failed a business rule
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationRejection {
    /// Required reference did not resolve through the identifier map (orphan)
    #[error("orphan: `{field}` references {references} {legacy_id}, which has not been migrated")]
    MissingRequiredForeignKey {
        /// Foreign key field
        field: String,
        /// Referenced entity
        references: String,
        /// Legacy id that failed to resolve
        legacy_id: LegacyId,
    },

    /// Legacy id already migrated (earlier run or earlier in this run)
    #[error("duplicate legacy id {legacy_id}")]
    DuplicateIdentifier {
        /// Offending legacy id
        legacy_id: LegacyId,
    },

    /// Value violates a range rule
    #[error("`{field}` out of range ({value}): {reason}")]
    OutOfRangeValue {
        /// Field checked
        field: String,
        /// Offending value
        value: String,
        /// Rule that failed
        reason: String,
    },
}

impl ValidationRejection {
    /// Orphaned foreign key
    #[must_use]
    pub fn orphan(
        field: impl Into<String>,
        references: impl Into<String>,
        legacy_id: LegacyId,
    ) -> Self {
        Self::MissingRequiredForeignKey {
            field: field.into(),
            references: references.into(),
            legacy_id,
        }
    }

    /// Range rule violation
    #[must_use]
    pub fn out_of_range(
        field: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::OutOfRangeValue {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this rejection is an unresolved reference
    #[inline]
    #[must_use]
    pub fn is_orphan(&self) -> bool {
        matches!(self, Self::MissingRequiredForeignKey { .. })
    }
}

/// Failure reading the legacy store
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Underlying I/O failed
    #[error("source I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Rows were requested behind the read position of a sequential source
    #[error("offset {offset} is behind the read cursor {cursor}")]
    OutOfOrder {
        /// Requested row offset
        offset: usize,
        /// Rows already consumed
        cursor: usize,
    },

    /// No source exists for the entity
    #[error("no legacy source for entity `{0}`")]
    UnknownEntity(String),
}

/// Unexpected failure writing an accepted record
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Underlying I/O failed
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be encoded
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Target store refused the record
    #[error("target rejected record: {0}")]
    Rejected(String),
}

/// Failure reading or appending the identifier map
#[derive(Debug, thiserror::Error)]
pub enum IdMapError {
    /// Entry already exists; entries are never overwritten
    #[error("{entity} {legacy_id} is already mapped to {existing}")]
    AlreadyMapped {
        /// Entity of the entry
        entity: String,
        /// Legacy id of the entry
        legacy_id: LegacyId,
        /// Target id already on record
        existing: TargetId,
    },

    /// Underlying I/O failed
    #[error("identifier map I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Stored entry could not be decoded
    #[error("corrupt identifier map entry at line {line}: {message}")]
    Corrupt {
        /// One-based line number in the map file
        line: usize,
        /// Decoder message
        message: String,
    },

    /// Entry could not be encoded
    #[error("identifier map serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
