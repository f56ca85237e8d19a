//! Per-entity migration definitions
//!
//! An [`EntityMigration`] is the typed pair of a pure mapper and a
//! side-effect-free validator for one legacy table. [`DynMigration`] erases the
//! legacy and target types so a plan can hold heterogeneous entities.

use crate::error::{MappingError, ValidationRejection};
use crate::ports::ReferenceResolver;
use crate::types::{LegacyId, MigrationContext};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Typed migration of one legacy entity
pub trait EntityMigration: Send + Sync {
    /// Legacy row shape
    type Legacy: DeserializeOwned;
    /// Target record shape
    type Target: Serialize;

    /// Entity name; also the name of the legacy table and target collection
    fn entity(&self) -> &'static str;

    /// Column holding the legacy id, used when a row fails to parse
    fn id_field(&self) -> &'static str;

    /// Entities whose identifier map entries this migration resolves against
    fn dependencies(&self) -> &'static [&'static str] {
        &[]
    }

    /// Legacy identifier of a parsed row
    fn legacy_id(&self, legacy: &Self::Legacy) -> LegacyId;

    /// Translate a legacy row
    ///
    /// Must be deterministic for identical input. Unresolved references are
    /// returned as `None` for the validator to judge.
    ///
    /// # Errors
    /// - [`MappingError`] naming the field that could not be translated
    fn map(
        &self,
        legacy: &Self::Legacy,
        refs: &dyn ReferenceResolver,
    ) -> Result<Self::Target, MappingError>;

    /// Business-rule check of a mapped record
    ///
    /// # Errors
    /// - [`ValidationRejection`] with the failed rule
    fn validate(
        &self,
        mapped: &Self::Target,
        legacy: &Self::Legacy,
        ctx: &MigrationContext,
    ) -> Result<(), ValidationRejection>;
}

/// Why a record was skipped
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    /// Mapping failed
    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// Validation rejected the mapped record
    #[error(transparent)]
    Rejected(#[from] ValidationRejection),
}

impl SkipReason {
    /// Whether the record was skipped as an orphan
    #[inline]
    #[must_use]
    pub fn is_orphan(&self) -> bool {
        matches!(self, Self::Rejected(r) if r.is_orphan())
    }
}

/// Outcome of mapping and validating one raw row
#[derive(Debug, Clone, PartialEq)]
pub enum Prepared {
    /// Ready to write
    Accepted {
        /// Legacy id of the row
        legacy_id: LegacyId,
        /// Mapped record as a JSON object
        record: Map<String, Value>,
    },
    /// Not to be written
    Skipped {
        /// Legacy id, when it could be determined
        legacy_id: Option<LegacyId>,
        /// Why
        reason: SkipReason,
    },
}

/// Type-erased [`EntityMigration`]
pub trait DynMigration: Send + Sync {
    /// Entity name
    fn entity_name(&self) -> &'static str;

    /// Entities this one depends on
    fn dependency_names(&self) -> &'static [&'static str];

    /// Parse, map and validate one raw legacy row
    fn prepare(
        &self,
        raw: &Value,
        refs: &dyn ReferenceResolver,
        ctx: &MigrationContext,
    ) -> Prepared;
}

impl<M: EntityMigration> DynMigration for M {
    fn entity_name(&self) -> &'static str {
        self.entity()
    }

    fn dependency_names(&self) -> &'static [&'static str] {
        self.dependencies()
    }

    fn prepare(
        &self,
        raw: &Value,
        refs: &dyn ReferenceResolver,
        ctx: &MigrationContext,
    ) -> Prepared {
        let legacy: M::Legacy = match M::Legacy::deserialize(raw) {
            Ok(legacy) => legacy,
            Err(e) => {
                return Prepared::Skipped {
                    legacy_id: raw.get(self.id_field()).and_then(LegacyId::from_json),
                    reason: MappingError::unparseable(e.to_string()).into(),
                }
            }
        };
        let legacy_id = self.legacy_id(&legacy);

        let skip = |reason: SkipReason| Prepared::Skipped {
            legacy_id: Some(legacy_id.clone()),
            reason,
        };

        let mapped = match self.map(&legacy, refs) {
            Ok(mapped) => mapped,
            Err(e) => return skip(e.into()),
        };
        if let Err(rejection) = self.validate(&mapped, &legacy, ctx) {
            return skip(rejection.into());
        }

        match serde_json::to_value(&mapped) {
            Ok(Value::Object(record)) => Prepared::Accepted {
                legacy_id: legacy_id.clone(),
                record,
            },
            Ok(_) => skip(MappingError::unparseable("mapped record is not an object").into()),
            Err(e) => skip(MappingError::unparseable(e.to_string()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TargetId;
    use chrono::NaiveDate;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Row {
        id: i64,
        parent: i64,
        size: i64,
    }

    #[derive(Serialize)]
    struct Out {
        parent: Option<TargetId>,
        size: i64,
    }

    struct Child;

    impl EntityMigration for Child {
        type Legacy = Row;
        type Target = Out;

        fn entity(&self) -> &'static str {
            "children"
        }

        fn id_field(&self) -> &'static str {
            "id"
        }

        fn dependencies(&self) -> &'static [&'static str] {
            &["parents"]
        }

        fn legacy_id(&self, legacy: &Row) -> LegacyId {
            LegacyId::Int(legacy.id)
        }

        fn map(&self, legacy: &Row, refs: &dyn ReferenceResolver) -> Result<Out, MappingError> {
            if legacy.size < 0 {
                return Err(MappingError::malformed("size", legacy.size.to_string(), "non-negative"));
            }
            Ok(Out {
                parent: refs.resolve("parents", &LegacyId::Int(legacy.parent)),
                size: legacy.size,
            })
        }

        fn validate(
            &self,
            mapped: &Out,
            legacy: &Row,
            _ctx: &MigrationContext,
        ) -> Result<(), ValidationRejection> {
            if mapped.parent.is_none() {
                return Err(ValidationRejection::orphan(
                    "parent",
                    "parents",
                    LegacyId::Int(legacy.parent),
                ));
            }
            if mapped.size > 10 {
                return Err(ValidationRejection::out_of_range("size", mapped.size, "at most 10"));
            }
            Ok(())
        }
    }

    struct OneParent(TargetId);

    impl ReferenceResolver for OneParent {
        fn resolve(&self, entity: &str, legacy_id: &LegacyId) -> Option<TargetId> {
            (entity == "parents" && *legacy_id == LegacyId::Int(1)).then_some(self.0)
        }
    }

    fn ctx() -> MigrationContext {
        MigrationContext::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
    }

    #[test]
    fn accepted_row_becomes_object() {
        let parent = TargetId::generate();
        let out = Child.prepare(&json!({"id": 5, "parent": 1, "size": 3}), &OneParent(parent), &ctx());
        match out {
            Prepared::Accepted { legacy_id, record } => {
                assert_eq!(legacy_id, LegacyId::Int(5));
                assert_eq!(record["parent"], json!(parent.to_string()));
                assert_eq!(record["size"], json!(3));
            }
            other => panic!("expected accepted, got {other:?}"),
        }
    }

    #[test]
    fn orphan_is_rejected_not_nulled() {
        let out = Child.prepare(
            &json!({"id": 6, "parent": 2, "size": 3}),
            &OneParent(TargetId::generate()),
            &ctx(),
        );
        match out {
            Prepared::Skipped { legacy_id, reason } => {
                assert_eq!(legacy_id, Some(LegacyId::Int(6)));
                assert!(reason.is_orphan());
            }
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[test]
    fn unparseable_row_keeps_best_effort_id() {
        let out = Child.prepare(&json!({"id": 7, "parent": "x"}), &OneParent(TargetId::generate()), &ctx());
        match out {
            Prepared::Skipped { legacy_id, reason } => {
                assert_eq!(legacy_id, Some(LegacyId::Int(7)));
                assert!(matches!(reason, SkipReason::Mapping(_)));
            }
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[test]
    fn mapping_error_wins_over_validation() {
        let out = Child.prepare(
            &json!({"id": 8, "parent": 2, "size": -1}),
            &OneParent(TargetId::generate()),
            &ctx(),
        );
        assert!(matches!(
            out,
            Prepared::Skipped { reason: SkipReason::Mapping(_), .. }
        ));
    }

    #[test]
    fn erased_metadata() {
        let erased: Box<dyn DynMigration> = Box::new(Child);
        assert_eq!(erased.entity_name(), "children");
        assert_eq!(erased.dependency_names(), &["parents"]);
    }
}
