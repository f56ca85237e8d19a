//! Pipeline driver
//!
//! One stage migrates one entity:
//! read batch → map → validate → (write | stage) → record mapping → report.
//!
//! # Failure policy
//!
//! - Mapping and validation failures skip the record and never stop the run.
//!   A source row that cannot be decoded is a mapping failure.
//! - A failed write aborts the run, unless the run is fault tolerant, in which
//!   case it is reported against its legacy id and the run continues.
//! - Source failures and identifier map failures always abort.

use crate::report::RunSummary;
use pmig_core::{
    DynMigration, IdMapEntry, IdMapError, IdentifierMap, LayeredResolver, LegacyId,
    MigrationContext, PersistenceError, Prepared, RecordSink, ReferenceResolver, SkipReason,
    SourceCatalog, SourceError, SourceRow, TargetId, ValidationRejection,
};
use pmig_store::InMemoryIdMap;

/// Default number of records per source read
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Operator-supplied options for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Compute and report outcomes without writing
    pub preview: bool,
    /// Ceiling on source records read
    pub limit: Option<usize>,
    /// Report failed writes and continue instead of aborting
    pub fault_tolerant: bool,
    /// Records per source read
    pub batch_size: usize,
}

impl RunOptions {
    /// Default options: real writes, no ceiling, abort on write failure
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With preview mode
    #[inline]
    #[must_use]
    pub fn with_preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    /// With a record ceiling
    #[inline]
    #[must_use]
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// With fault tolerance
    #[inline]
    #[must_use]
    pub fn with_fault_tolerance(mut self, fault_tolerant: bool) -> Self {
        self.fault_tolerant = fault_tolerant;
        self
    }

    /// With batch size (zero is treated as one)
    #[inline]
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            preview: false,
            limit: None,
            fault_tolerant: false,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Unrecoverable stage failure, carrying the partial summary
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// A write failed and the run is not fault tolerant
    #[error("{entity}: write of legacy id {legacy_id} failed: {source}")]
    Aborted {
        /// Entity being migrated
        entity: String,
        /// Record whose write failed
        legacy_id: LegacyId,
        /// Underlying failure
        #[source]
        source: PersistenceError,
        /// Counts up to the failure
        summary: Box<RunSummary>,
    },

    /// Flushing the sink at the end of the stage failed
    #[error("{entity}: flushing written records failed: {source}")]
    Flush {
        /// Entity being migrated
        entity: String,
        /// Underlying failure
        #[source]
        source: PersistenceError,
        /// Counts up to the failure
        summary: Box<RunSummary>,
    },

    /// Reading the legacy store failed
    #[error("{entity}: reading legacy records failed: {source}")]
    Source {
        /// Entity being migrated
        entity: String,
        /// Underlying failure
        #[source]
        source: SourceError,
        /// Counts up to the failure
        summary: Box<RunSummary>,
    },

    /// Recording an identifier mapping failed after the write succeeded
    #[error("{entity}: recording identifier for legacy id {legacy_id} failed: {source}")]
    IdMap {
        /// Entity being migrated
        entity: String,
        /// Record whose mapping failed
        legacy_id: LegacyId,
        /// Underlying failure
        #[source]
        source: IdMapError,
        /// Counts up to the failure
        summary: Box<RunSummary>,
    },
}

impl RunError {
    /// Partial summary of the aborted stage
    #[must_use]
    pub fn summary(&self) -> &RunSummary {
        match self {
            Self::Aborted { summary, .. }
            | Self::Flush { summary, .. }
            | Self::Source { summary, .. }
            | Self::IdMap { summary, .. } => summary,
        }
    }
}

/// Per-record fatal outcome, turned into [`RunError`] once the summary is final
enum Fatal {
    Persist(LegacyId, PersistenceError),
    IdMap(LegacyId, IdMapError),
}

/// Drives migration stages against one source catalog, sink and identifier map
///
/// A runner can be reused for several stages; in preview mode the mappings it
/// would have recorded are staged in memory so later stages resolve their
/// references exactly as a real run would.
pub struct MigrationRunner<'a> {
    sources: &'a dyn SourceCatalog,
    sink: &'a mut dyn RecordSink,
    id_map: &'a mut dyn IdentifierMap,
    staged: InMemoryIdMap,
    options: RunOptions,
    ctx: MigrationContext,
}

impl<'a> MigrationRunner<'a> {
    /// Create a runner dated today
    pub fn new(
        sources: &'a dyn SourceCatalog,
        sink: &'a mut dyn RecordSink,
        id_map: &'a mut dyn IdentifierMap,
        options: RunOptions,
    ) -> Self {
        Self {
            sources,
            sink,
            id_map,
            staged: InMemoryIdMap::new(),
            options,
            ctx: MigrationContext::today(),
        }
    }

    /// Pin the reference date used by validators
    #[must_use]
    pub fn with_context(mut self, ctx: MigrationContext) -> Self {
        self.ctx = ctx;
        self
    }

    /// Mappings staged by preview stages so far
    #[inline]
    #[must_use]
    pub fn staged(&self) -> &InMemoryIdMap {
        &self.staged
    }

    /// Migrate one entity
    ///
    /// # Errors
    /// - [`RunError::Aborted`] when a write fails without fault tolerance
    /// - [`RunError::Source`], [`RunError::IdMap`], [`RunError::Flush`] on
    ///   store failures
    pub async fn run(&mut self, migration: &dyn DynMigration) -> Result<RunSummary, RunError> {
        let entity = migration.entity_name();
        let mut summary = RunSummary::new(entity, self.options.preview);

        tracing::info!(
            entity,
            preview = self.options.preview,
            limit = ?self.options.limit,
            fault_tolerant = self.options.fault_tolerant,
            "starting migration"
        );
        self.warn_unmigrated_dependencies(migration);

        let mut source = match self.sources.open(entity).await {
            Ok(source) => source,
            Err(e) => return Err(Self::source_error(entity, e, summary)),
        };

        let batch_size = self.options.batch_size.max(1);

        loop {
            let want = match self.options.limit {
                Some(limit) => batch_size.min(limit.saturating_sub(summary.read)),
                None => batch_size,
            };
            if want == 0 {
                break;
            }

            let batch = match source.read_batch(summary.read, want).await {
                Ok(batch) => batch,
                Err(e) => return Err(Self::source_error(entity, e, summary)),
            };
            let fetched = batch.len();

            for row in batch {
                summary.read += 1;
                if let Err(fatal) = self.process(migration, row, &mut summary).await {
                    return Err(Self::abort(entity, fatal, summary));
                }
            }

            tracing::info!(
                entity,
                read = summary.read,
                migrated = summary.migrated,
                skipped = summary.skipped_count(),
                errored = summary.errored_count(),
                "batch processed"
            );

            if fetched < want {
                break;
            }
        }

        if !self.options.preview {
            if let Err(source) = self.sink.flush().await {
                summary.aborted = true;
                tracing::error!(entity, error = %source, "flush failed");
                return Err(RunError::Flush {
                    entity: entity.to_string(),
                    source,
                    summary: Box::new(summary),
                });
            }
        }

        tracing::info!(
            entity,
            read = summary.read,
            migrated = summary.migrated,
            skipped = summary.skipped_count(),
            errored = summary.errored_count(),
            "migration finished"
        );
        Ok(summary)
    }

    /// Duplicates are caught through the identifier map and the staged
    /// mappings, which only ever hold records that were written or staged.
    async fn process(
        &mut self,
        migration: &dyn DynMigration,
        row: SourceRow,
        summary: &mut RunSummary,
    ) -> Result<(), Fatal> {
        let entity = migration.entity_name();

        let prepared = match row {
            Err(e) => Prepared::Skipped {
                legacy_id: None,
                reason: e.into(),
            },
            Ok(raw) => {
                let resolver = LayeredResolver::new(&*self.id_map, &self.staged);
                match migration.prepare(&raw, &resolver, &self.ctx) {
                    Prepared::Accepted { legacy_id, record } => {
                        if resolver.resolve(entity, &legacy_id).is_some() {
                            let reason = SkipReason::from(ValidationRejection::DuplicateIdentifier {
                                legacy_id: legacy_id.clone(),
                            });
                            Prepared::Skipped {
                                legacy_id: Some(legacy_id),
                                reason,
                            }
                        } else {
                            Prepared::Accepted { legacy_id, record }
                        }
                    }
                    skipped @ Prepared::Skipped { .. } => skipped,
                }
            }
        };

        let (legacy_id, record) = match prepared {
            Prepared::Accepted { legacy_id, record } => (legacy_id, record),
            Prepared::Skipped { legacy_id, reason } => {
                tracing::warn!(
                    entity,
                    legacy_id = ?legacy_id,
                    orphan = reason.is_orphan(),
                    reason = %reason,
                    "record skipped"
                );
                summary.record_skip(legacy_id, &reason);
                return Ok(());
            }
        };

        let target_id = TargetId::generate();

        if self.options.preview {
            self.staged
                .insert(&IdMapEntry::new(entity, legacy_id.clone(), target_id))
                .map_err(|e| Fatal::IdMap(legacy_id, e))?;
            summary.migrated += 1;
            return Ok(());
        }

        if let Err(e) = self.sink.persist(entity, target_id, &record).await {
            if self.options.fault_tolerant {
                tracing::warn!(entity, legacy_id = %legacy_id, error = %e, "write failed, continuing");
                summary.record_error(legacy_id, &e);
                return Ok(());
            }
            return Err(Fatal::Persist(legacy_id, e));
        }

        self.id_map
            .record(IdMapEntry::new(entity, legacy_id.clone(), target_id))
            .await
            .map_err(|e| Fatal::IdMap(legacy_id, e))?;
        summary.migrated += 1;
        Ok(())
    }

    fn warn_unmigrated_dependencies(&self, migration: &dyn DynMigration) {
        for dependency in migration.dependency_names() {
            if self.id_map.count(dependency) == 0 && self.staged.count(dependency) == 0 {
                tracing::warn!(
                    entity = migration.entity_name(),
                    dependency,
                    "dependency has no migrated records; references to it will be orphaned"
                );
            }
        }
    }

    fn source_error(entity: &str, source: SourceError, mut summary: RunSummary) -> RunError {
        summary.aborted = true;
        tracing::error!(entity, error = %source, "legacy source failed");
        RunError::Source {
            entity: entity.to_string(),
            source,
            summary: Box::new(summary),
        }
    }

    fn abort(entity: &str, fatal: Fatal, mut summary: RunSummary) -> RunError {
        summary.aborted = true;
        match fatal {
            Fatal::Persist(legacy_id, source) => {
                tracing::error!(entity, legacy_id = %legacy_id, error = %source, "write failed, aborting");
                RunError::Aborted {
                    entity: entity.to_string(),
                    legacy_id,
                    source,
                    summary: Box::new(summary),
                }
            }
            Fatal::IdMap(legacy_id, source) => {
                tracing::error!(entity, legacy_id = %legacy_id, error = %source, "identifier map failed, aborting");
                RunError::IdMap {
                    entity: entity.to_string(),
                    legacy_id,
                    source,
                    summary: Box::new(summary),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_builder() {
        let opts = RunOptions::new()
            .with_preview(true)
            .with_limit(Some(10))
            .with_fault_tolerance(true)
            .with_batch_size(0);
        assert!(opts.preview);
        assert_eq!(opts.limit, Some(10));
        assert!(opts.fault_tolerant);
        assert_eq!(opts.batch_size, 1);
        assert_eq!(RunOptions::default().batch_size, DEFAULT_BATCH_SIZE);
    }
}
