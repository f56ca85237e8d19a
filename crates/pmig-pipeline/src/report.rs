//! Run summaries
//!
//! A [`RunSummary`] is built by one stage and discarded after it is printed.

use pmig_core::{LegacyId, SkipReason};
use serde::Serialize;
use std::fmt::Write as _;

/// A record that was not written because mapping or validation failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRecord {
    /// Legacy id, when it could be determined
    pub legacy_id: Option<LegacyId>,
    /// Human-readable reason
    pub reason: String,
    /// Whether the record was an orphan
    pub orphan: bool,
}

/// A record whose write failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    /// Legacy id of the record
    pub legacy_id: LegacyId,
    /// Error message
    pub message: String,
}

/// Outcome of one migration stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Entity migrated
    pub entity: String,
    /// Whether writes were suppressed
    pub preview: bool,
    /// Source records read
    pub read: usize,
    /// Records written (or that would have been, in preview)
    pub migrated: usize,
    /// Records skipped by mapping or validation
    pub skipped: Vec<SkippedRecord>,
    /// Records whose write failed
    pub errors: Vec<RecordFailure>,
    /// Whether the stage stopped on an unrecoverable error
    pub aborted: bool,
}

impl RunSummary {
    /// Empty summary for `entity`
    #[must_use]
    pub fn new(entity: impl Into<String>, preview: bool) -> Self {
        Self {
            entity: entity.into(),
            preview,
            read: 0,
            migrated: 0,
            skipped: Vec::new(),
            errors: Vec::new(),
            aborted: false,
        }
    }

    /// Count a skipped record
    pub fn record_skip(&mut self, legacy_id: Option<LegacyId>, reason: &SkipReason) {
        self.skipped.push(SkippedRecord {
            legacy_id,
            reason: reason.to_string(),
            orphan: reason.is_orphan(),
        });
    }

    /// Count a failed write
    pub fn record_error(&mut self, legacy_id: LegacyId, error: &dyn std::error::Error) {
        self.errors.push(RecordFailure {
            legacy_id,
            message: error.to_string(),
        });
    }

    /// Number of skipped records
    #[inline]
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Number of orphaned records among the skips
    #[must_use]
    pub fn orphan_count(&self) -> usize {
        self.skipped.iter().filter(|s| s.orphan).count()
    }

    /// Number of failed writes
    #[inline]
    #[must_use]
    pub fn errored_count(&self) -> usize {
        self.errors.len()
    }

    /// Render the text summary
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        let _ = writeln!(report, "=== Migration: {} ===", self.entity);
        if self.preview {
            let _ = writeln!(report, "PREVIEW MODE: no records were written");
        }
        let _ = writeln!(report, "Read: {}", self.read);
        let _ = writeln!(report, "Migrated: {}", self.migrated);
        let _ = writeln!(
            report,
            "Skipped: {} ({} orphaned)",
            self.skipped_count(),
            self.orphan_count()
        );
        let _ = writeln!(report, "Errored: {}", self.errored_count());

        if !self.skipped.is_empty() {
            let _ = writeln!(report, "\n--- Skipped ---");
            for s in &self.skipped {
                let id = s
                    .legacy_id
                    .as_ref()
                    .map_or_else(|| "<unknown>".to_string(), ToString::to_string);
                let _ = writeln!(report, "  [{id}] {}", s.reason);
            }
        }

        if !self.errors.is_empty() {
            let _ = writeln!(report, "\n--- Errors ---");
            for e in &self.errors {
                let _ = writeln!(report, "  [{}] {}", e.legacy_id, e.message);
            }
        }

        if self.aborted {
            let _ = writeln!(report, "\n!!! Run aborted on an unrecoverable error");
        }

        report
    }
}
