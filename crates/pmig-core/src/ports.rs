//! Store seams of the pipeline
//!
//! The driver only talks to these traits; `pmig-store` provides in-memory and
//! JSON-lines implementations.

use crate::error::{IdMapError, MappingError, PersistenceError, SourceError};
use crate::types::{IdMapEntry, LegacyId, TargetId};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// One legacy row: its decoded value, or why it could not be decoded
pub type SourceRow = Result<Value, MappingError>;

/// Chunked reader over one legacy table
#[async_trait]
pub trait LegacySource: Send {
    /// Read up to `limit` rows starting at row `offset`
    ///
    /// Returns fewer than `limit` rows (possibly none) once the table is
    /// exhausted. A row that cannot be decoded still counts as a row.
    ///
    /// # Errors
    /// - [`SourceError`] when the table itself cannot be read
    async fn read_batch(&mut self, offset: usize, limit: usize)
        -> Result<Vec<SourceRow>, SourceError>;
}

/// Opens a [`LegacySource`] per entity
#[async_trait]
pub trait SourceCatalog: Send + Sync {
    /// Open the legacy table for `entity`
    async fn open(&self, entity: &str) -> Result<Box<dyn LegacySource>, SourceError>;
}

/// Destination for accepted records
#[async_trait]
pub trait RecordSink: Send {
    /// Persist one mapped record under its newly assigned target id
    async fn persist(
        &mut self,
        entity: &str,
        target_id: TargetId,
        record: &Map<String, Value>,
    ) -> Result<(), PersistenceError>;

    /// Flush buffered writes
    async fn flush(&mut self) -> Result<(), PersistenceError> {
        Ok(())
    }
}

/// Read-only foreign key lookup used by mappers
pub trait ReferenceResolver: Send + Sync {
    /// Target id of a previously migrated record, if any
    fn resolve(&self, entity: &str, legacy_id: &LegacyId) -> Option<TargetId>;
}

/// Durable, append-only legacy → target identifier map
#[async_trait]
pub trait IdentifierMap: ReferenceResolver {
    /// Number of entries recorded for `entity`
    fn count(&self, entity: &str) -> usize;

    /// Append an entry
    ///
    /// # Errors
    /// - [`IdMapError::AlreadyMapped`] if the key already has an entry
    async fn record(&mut self, entry: IdMapEntry) -> Result<(), IdMapError>;
}

/// Resolver that consults a primary map and then a fallback
///
/// Used to layer staged (preview) mappings under the durable map.
pub struct LayeredResolver<'a, P: ?Sized, F: ?Sized> {
    primary: &'a P,
    fallback: &'a F,
}

impl<'a, P, F> LayeredResolver<'a, P, F>
where
    P: ReferenceResolver + ?Sized,
    F: ReferenceResolver + ?Sized,
{
    /// Layer `fallback` under `primary`
    #[inline]
    #[must_use]
    pub fn new(primary: &'a P, fallback: &'a F) -> Self {
        Self { primary, fallback }
    }
}

impl<P, F> ReferenceResolver for LayeredResolver<'_, P, F>
where
    P: ReferenceResolver + ?Sized,
    F: ReferenceResolver + ?Sized,
{
    fn resolve(&self, entity: &str, legacy_id: &LegacyId) -> Option<TargetId> {
        self.primary
            .resolve(entity, legacy_id)
            .or_else(|| self.fallback.resolve(entity, legacy_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Fixed(HashMap<(String, LegacyId), TargetId>);

    impl ReferenceResolver for Fixed {
        fn resolve(&self, entity: &str, legacy_id: &LegacyId) -> Option<TargetId> {
            self.0.get(&(entity.to_string(), legacy_id.clone())).copied()
        }
    }

    #[test]
    fn layered_resolver_prefers_primary() {
        let a = TargetId::generate();
        let b = TargetId::generate();
        let c = TargetId::generate();
        let primary = Fixed(HashMap::from([(("owners".into(), LegacyId::Int(1)), a)]));
        let fallback = Fixed(HashMap::from([
            (("owners".into(), LegacyId::Int(1)), b),
            (("owners".into(), LegacyId::Int(2)), c),
        ]));
        let layered = LayeredResolver::new(&primary, &fallback);

        assert_eq!(layered.resolve("owners", &LegacyId::Int(1)), Some(a));
        assert_eq!(layered.resolve("owners", &LegacyId::Int(2)), Some(c));
        assert_eq!(layered.resolve("owners", &LegacyId::Int(3)), None);
        assert_eq!(layered.resolve("pets", &LegacyId::Int(1)), None);
    }
}
