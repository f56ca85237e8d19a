//! Owners: the root of the PetLicense data

use crate::codes::non_blank;
use pmig_core::{
    EntityMigration, LegacyId, MappingError, MigrationContext, ReferenceResolver,
    ValidationRejection,
};
use serde::{Deserialize, Serialize};

/// Row of the legacy `owners` table
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyOwner {
    /// Legacy primary key
    pub owner_id: i64,
    /// Given name
    #[serde(default)]
    pub first_name: Option<String>,
    /// Family name; required
    #[serde(default)]
    pub last_name: Option<String>,
    /// Free-text email, any case
    #[serde(default)]
    pub email: Option<String>,
    /// Free-text phone number
    #[serde(default)]
    pub phone: Option<String>,
    /// `A` active, `I` inactive
    pub status: String,
}

/// Migrated owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Owner {
    /// Given name, if recorded
    pub first_name: Option<String>,
    /// Family name
    pub last_name: String,
    /// Lower-cased email address
    pub email: Option<String>,
    /// Phone number as recorded
    pub phone: Option<String>,
    /// Whether the account is active
    pub active: bool,
}

/// `owners` migration
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnerMigration;

impl EntityMigration for OwnerMigration {
    type Legacy = LegacyOwner;
    type Target = Owner;

    fn entity(&self) -> &'static str {
        "owners"
    }

    fn id_field(&self) -> &'static str {
        "owner_id"
    }

    fn legacy_id(&self, legacy: &LegacyOwner) -> LegacyId {
        LegacyId::Int(legacy.owner_id)
    }

    fn map(&self, legacy: &LegacyOwner, _refs: &dyn ReferenceResolver) -> Result<Owner, MappingError> {
        let active = match legacy.status.trim().to_ascii_uppercase().as_str() {
            "A" => true,
            "I" => false,
            _ => return Err(MappingError::invalid_enum("status", legacy.status.as_str())),
        };

        Ok(Owner {
            first_name: non_blank(legacy.first_name.as_deref()),
            last_name: non_blank(legacy.last_name.as_deref()).unwrap_or_default(),
            email: non_blank(legacy.email.as_deref()).map(|e| e.to_lowercase()),
            phone: non_blank(legacy.phone.as_deref()),
            active,
        })
    }

    fn validate(
        &self,
        mapped: &Owner,
        _legacy: &LegacyOwner,
        _ctx: &MigrationContext,
    ) -> Result<(), ValidationRejection> {
        if mapped.last_name.is_empty() {
            return Err(ValidationRejection::out_of_range(
                "last_name",
                "",
                "last name is required",
            ));
        }
        if let Some(email) = &mapped.email {
            if !email.contains('@') {
                return Err(ValidationRejection::out_of_range(
                    "email",
                    email,
                    "not an email address",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmig_core::{DynMigration, Prepared, SkipReason};
    use pmig_store::InMemoryIdMap;
    use pmig_test_utils::{fixed_context, owner_row};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn prepare(raw: &serde_json::Value) -> Prepared {
        OwnerMigration.prepare(raw, &InMemoryIdMap::new(), &fixed_context())
    }

    #[test]
    fn maps_active_owner() {
        let mut raw = owner_row(7, "  Okafor ");
        raw["email"] = json!(" Ada@Example.COM ");
        raw["first_name"] = json!("   ");

        let Prepared::Accepted { legacy_id, record } = prepare(&raw) else {
            panic!("owner should be accepted");
        };
        assert_eq!(legacy_id, LegacyId::Int(7));
        assert_eq!(record["last_name"], json!("Okafor"));
        assert_eq!(record["email"], json!("ada@example.com"));
        assert_eq!(record["first_name"], json!(null));
        assert_eq!(record["active"], json!(true));
    }

    #[test]
    fn inactive_status_maps_to_false() {
        let mut raw = owner_row(1, "Lee");
        raw["status"] = json!("i");
        let Prepared::Accepted { record, .. } = prepare(&raw) else {
            panic!("owner should be accepted");
        };
        assert_eq!(record["active"], json!(false));
    }

    #[test]
    fn unknown_status_is_a_mapping_error() {
        let mut raw = owner_row(1, "Lee");
        raw["status"] = json!("X");
        let Prepared::Skipped { legacy_id, reason } = prepare(&raw) else {
            panic!("owner should be skipped");
        };
        assert_eq!(legacy_id, Some(LegacyId::Int(1)));
        assert_eq!(reason, SkipReason::Mapping(MappingError::invalid_enum("status", "X")));
    }

    #[test]
    fn blank_email_is_allowed() {
        let mut raw = owner_row(2, "Lee");
        raw["email"] = json!("");
        assert!(matches!(prepare(&raw), Prepared::Accepted { .. }));
    }

    #[test]
    fn rejects_bad_email_and_missing_last_name() {
        let mut raw = owner_row(3, "Lee");
        raw["email"] = json!("not-an-email");
        let Prepared::Skipped { reason, .. } = prepare(&raw) else {
            panic!("owner should be skipped");
        };
        assert!(matches!(
            reason,
            SkipReason::Rejected(ValidationRejection::OutOfRangeValue { ref field, .. }) if field == "email"
        ));

        let raw = owner_row(4, " ");
        let Prepared::Skipped { reason, .. } = prepare(&raw) else {
            panic!("owner should be skipped");
        };
        assert!(!reason.is_orphan());
        assert!(reason.to_string().contains("last_name"));
    }
}
