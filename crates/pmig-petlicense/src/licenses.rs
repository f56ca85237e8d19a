//! Licenses, keyed by the legacy seven-character license number

use crate::codes::iso_date;
use chrono::NaiveDate;
use pmig_core::{
    EntityMigration, LegacyId, MappingError, MigrationContext, ReferenceResolver, TargetId,
    ValidationRejection,
};
use serde::{Deserialize, Serialize};

/// Length of a legacy license number, e.g. `L000123`
pub const LICENSE_NO_LEN: usize = 7;

/// Row of the legacy `licenses` table
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyLicense {
    /// Legacy primary key
    pub license_no: String,
    /// Legacy pet key
    #[serde(default)]
    pub pet_id: Option<i64>,
    /// `YYYY-MM-DD`
    pub issued_on: String,
    /// `YYYY-MM-DD`
    pub expires_on: String,
    /// Fee in cents
    pub fee_cents: i64,
    /// `ACT`, `EXP` or `REV`
    pub status: String,
}

/// License status code table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseStatus {
    /// `ACT`
    Active,
    /// `EXP`
    Expired,
    /// `REV`
    Revoked,
}

impl LicenseStatus {
    fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "ACT" => Some(Self::Active),
            "EXP" => Some(Self::Expired),
            "REV" => Some(Self::Revoked),
            _ => None,
        }
    }
}

/// Migrated license
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct License {
    /// Trimmed legacy license number
    pub license_number: String,
    /// Target id of the pet; `None` if the pet was never migrated
    pub pet_id: Option<TargetId>,
    /// Issue date
    pub issued_on: NaiveDate,
    /// Expiry date, never before the issue date
    pub expires_on: NaiveDate,
    /// Fee in cents
    pub fee_cents: i64,
    /// Decoded status
    pub status: LicenseStatus,
}

/// `licenses` migration
#[derive(Debug, Clone, Copy, Default)]
pub struct LicenseMigration;

impl EntityMigration for LicenseMigration {
    type Legacy = LegacyLicense;
    type Target = License;

    fn entity(&self) -> &'static str {
        "licenses"
    }

    fn id_field(&self) -> &'static str {
        "license_no"
    }

    fn dependencies(&self) -> &'static [&'static str] {
        &["pets"]
    }

    fn legacy_id(&self, legacy: &LegacyLicense) -> LegacyId {
        LegacyId::Key(legacy.license_no.trim().to_string())
    }

    fn map(&self, legacy: &LegacyLicense, refs: &dyn ReferenceResolver) -> Result<License, MappingError> {
        let license_number = legacy.license_no.trim();
        if license_number.chars().count() != LICENSE_NO_LEN {
            return Err(MappingError::malformed(
                "license_no",
                legacy.license_no.as_str(),
                "a 7-character license number",
            ));
        }
        let pet = legacy.pet_id.ok_or_else(|| MappingError::missing("pet_id"))?;
        let status = LicenseStatus::from_code(&legacy.status)
            .ok_or_else(|| MappingError::invalid_enum("status", legacy.status.as_str()))?;

        Ok(License {
            license_number: license_number.to_string(),
            pet_id: refs.resolve("pets", &LegacyId::Int(pet)),
            issued_on: iso_date("issued_on", &legacy.issued_on)?,
            expires_on: iso_date("expires_on", &legacy.expires_on)?,
            fee_cents: legacy.fee_cents,
            status,
        })
    }

    fn validate(
        &self,
        mapped: &License,
        legacy: &LegacyLicense,
        _ctx: &MigrationContext,
    ) -> Result<(), ValidationRejection> {
        if mapped.pet_id.is_none() {
            let pet = legacy.pet_id.unwrap_or_default();
            return Err(ValidationRejection::orphan("pet_id", "pets", LegacyId::Int(pet)));
        }
        if mapped.expires_on < mapped.issued_on {
            return Err(ValidationRejection::out_of_range(
                "expires_on",
                mapped.expires_on,
                format!("before issue date {}", mapped.issued_on),
            ));
        }
        if mapped.fee_cents < 0 {
            return Err(ValidationRejection::out_of_range(
                "fee_cents",
                mapped.fee_cents,
                "fee cannot be negative",
            ));
        }
        Ok(())
    }
}
