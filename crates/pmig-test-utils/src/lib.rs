//! Testing utilities for PMIG workspace
//!
//! Shared test migrations, fault-injecting sinks and legacy row fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::NaiveDate;
use pmig_core::{
    EntityMigration, LegacyId, MappingError, MigrationContext, PersistenceError, RecordSink,
    ReferenceResolver, TargetId, ValidationRejection,
};
use pmig_store::InMemorySink;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;

/// Reference date used by tests that depend on date rules
pub fn fixed_context() -> MigrationContext {
    MigrationContext::new(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
}

// ---------------------------------------------------------------------------
// Generic parent / child migrations
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ParentRow {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ParentRecord {
    pub name: String,
}

/// Migration of `parents`: rejects empty names
pub struct ParentMigration;

impl EntityMigration for ParentMigration {
    type Legacy = ParentRow;
    type Target = ParentRecord;

    fn entity(&self) -> &'static str {
        "parents"
    }

    fn id_field(&self) -> &'static str {
        "id"
    }

    fn legacy_id(&self, legacy: &ParentRow) -> LegacyId {
        LegacyId::Int(legacy.id)
    }

    fn map(&self, legacy: &ParentRow, _refs: &dyn ReferenceResolver) -> Result<ParentRecord, MappingError> {
        Ok(ParentRecord {
            name: legacy.name.trim().to_string(),
        })
    }

    fn validate(
        &self,
        mapped: &ParentRecord,
        _legacy: &ParentRow,
        _ctx: &MigrationContext,
    ) -> Result<(), ValidationRejection> {
        if mapped.name.is_empty() {
            return Err(ValidationRejection::out_of_range("name", "", "must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct ChildRow {
    pub id: i64,
    pub parent_id: i64,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ChildRecord {
    pub parent_id: Option<TargetId>,
    pub name: String,
}

/// Migration of `children`: each child needs a migrated parent
pub struct ChildMigration;

impl EntityMigration for ChildMigration {
    type Legacy = ChildRow;
    type Target = ChildRecord;

    fn entity(&self) -> &'static str {
        "children"
    }

    fn id_field(&self) -> &'static str {
        "id"
    }

    fn dependencies(&self) -> &'static [&'static str] {
        &["parents"]
    }

    fn legacy_id(&self, legacy: &ChildRow) -> LegacyId {
        LegacyId::Int(legacy.id)
    }

    fn map(&self, legacy: &ChildRow, refs: &dyn ReferenceResolver) -> Result<ChildRecord, MappingError> {
        Ok(ChildRecord {
            parent_id: refs.resolve("parents", &LegacyId::Int(legacy.parent_id)),
            name: legacy.name.clone(),
        })
    }

    fn validate(
        &self,
        mapped: &ChildRecord,
        legacy: &ChildRow,
        _ctx: &MigrationContext,
    ) -> Result<(), ValidationRejection> {
        if mapped.parent_id.is_none() {
            return Err(ValidationRejection::orphan(
                "parent_id",
                "parents",
                LegacyId::Int(legacy.parent_id),
            ));
        }
        Ok(())
    }
}

pub fn parent_row(id: i64, name: &str) -> Value {
    json!({ "id": id, "name": name })
}

pub fn parent_rows(n: i64) -> Vec<Value> {
    (1..=n).map(|i| parent_row(i, &format!("parent-{i}"))).collect()
}

pub fn child_row(id: i64, parent_id: i64) -> Value {
    json!({ "id": id, "parent_id": parent_id, "name": format!("child-{id}") })
}

// ---------------------------------------------------------------------------
// PetLicense legacy rows
// ---------------------------------------------------------------------------

pub fn owner_row(owner_id: i64, last_name: &str) -> Value {
    json!({
        "owner_id": owner_id,
        "first_name": "Sam",
        "last_name": last_name,
        "email": format!("owner{owner_id}@example.com"),
        "phone": "555-0100",
        "status": "A",
    })
}

pub fn pet_row(pet_id: i64, owner_id: i64) -> Value {
    json!({
        "pet_id": pet_id,
        "owner_id": owner_id,
        "name": format!("Pet {pet_id}"),
        "species": "D",
        "birth_year": 2019,
        "spayed": "Y",
    })
}

pub fn license_row(license_no: &str, pet_id: i64) -> Value {
    json!({
        "license_no": license_no,
        "pet_id": pet_id,
        "issued_on": "2024-01-15",
        "expires_on": "2025-01-14",
        "fee_cents": 2500,
        "status": "ACT",
    })
}

// ---------------------------------------------------------------------------
// Fault injection
// ---------------------------------------------------------------------------

/// Sink that fails chosen `persist` calls and stores the rest
///
/// Calls are numbered from 1, counting failed attempts.
#[derive(Debug, Clone, Default)]
pub struct FlakySink {
    inner: InMemorySink,
    fail_on: HashSet<usize>,
    calls: usize,
}

impl FlakySink {
    pub fn failing_on(calls: &[usize]) -> Self {
        Self {
            inner: InMemorySink::new(),
            fail_on: calls.iter().copied().collect(),
            calls: 0,
        }
    }

    /// Handle sharing the stored records
    pub fn stored(&self) -> InMemorySink {
        self.inner.clone()
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

#[async_trait]
impl RecordSink for FlakySink {
    async fn persist(
        &mut self,
        entity: &str,
        target_id: TargetId,
        record: &Map<String, Value>,
    ) -> Result<(), PersistenceError> {
        self.calls += 1;
        if self.fail_on.contains(&self.calls) {
            return Err(PersistenceError::Rejected(format!(
                "injected failure on write #{}",
                self.calls
            )));
        }
        self.inner.persist(entity, target_id, record).await
    }
}

/// Sink whose final flush always fails
#[derive(Debug, Clone, Default)]
pub struct UnflushableSink {
    inner: InMemorySink,
}

#[async_trait]
impl RecordSink for UnflushableSink {
    async fn persist(
        &mut self,
        entity: &str,
        target_id: TargetId,
        record: &Map<String, Value>,
    ) -> Result<(), PersistenceError> {
        self.inner.persist(entity, target_id, record).await
    }

    async fn flush(&mut self) -> Result<(), PersistenceError> {
        Err(PersistenceError::Rejected("flush refused".to_string()))
    }
}
