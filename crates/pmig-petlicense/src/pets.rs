//! Pets, each owned by a migrated owner

use crate::codes::{non_blank, yes_no};
use chrono::Datelike;
use pmig_core::{
    EntityMigration, LegacyId, MappingError, MigrationContext, ReferenceResolver, TargetId,
    ValidationRejection,
};
use serde::{Deserialize, Serialize};

/// Earliest birth year accepted for a pet
pub const EARLIEST_BIRTH_YEAR: i32 = 1980;

/// Row of the legacy `pets` table
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyPet {
    /// Legacy primary key
    pub pet_id: i64,
    /// Legacy owner key
    #[serde(default)]
    pub owner_id: Option<i64>,
    /// Call name
    #[serde(default)]
    pub name: Option<String>,
    /// `D`, `C` or `O`
    pub species: String,
    /// Year of birth, if known
    #[serde(default)]
    pub birth_year: Option<i32>,
    /// `Y`/`N` spayed or neutered
    pub spayed: String,
}

/// Species code table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Species {
    /// `D`
    Dog,
    /// `C`
    Cat,
    /// `O`
    Other,
}

impl Species {
    fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "D" => Some(Self::Dog),
            "C" => Some(Self::Cat),
            "O" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Migrated pet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pet {
    /// Target id of the owner; `None` if the owner was never migrated
    pub owner_id: Option<TargetId>,
    /// Call name
    pub name: String,
    /// Decoded species
    pub species: Species,
    /// Year of birth, if known
    pub birth_year: Option<i32>,
    /// Spayed or neutered
    pub altered: bool,
}

/// `pets` migration
#[derive(Debug, Clone, Copy, Default)]
pub struct PetMigration;

impl EntityMigration for PetMigration {
    type Legacy = LegacyPet;
    type Target = Pet;

    fn entity(&self) -> &'static str {
        "pets"
    }

    fn id_field(&self) -> &'static str {
        "pet_id"
    }

    fn dependencies(&self) -> &'static [&'static str] {
        &["owners"]
    }

    fn legacy_id(&self, legacy: &LegacyPet) -> LegacyId {
        LegacyId::Int(legacy.pet_id)
    }

    fn map(&self, legacy: &LegacyPet, refs: &dyn ReferenceResolver) -> Result<Pet, MappingError> {
        let owner = legacy.owner_id.ok_or_else(|| MappingError::missing("owner_id"))?;
        let name = non_blank(legacy.name.as_deref()).ok_or_else(|| MappingError::missing("name"))?;
        let species = Species::from_code(&legacy.species)
            .ok_or_else(|| MappingError::invalid_enum("species", legacy.species.as_str()))?;

        Ok(Pet {
            owner_id: refs.resolve("owners", &LegacyId::Int(owner)),
            name,
            species,
            birth_year: legacy.birth_year,
            altered: yes_no("spayed", &legacy.spayed)?,
        })
    }

    fn validate(
        &self,
        mapped: &Pet,
        legacy: &LegacyPet,
        ctx: &MigrationContext,
    ) -> Result<(), ValidationRejection> {
        if mapped.owner_id.is_none() {
            // map() already failed when the column was empty
            let owner = legacy.owner_id.unwrap_or_default();
            return Err(ValidationRejection::orphan("owner_id", "owners", LegacyId::Int(owner)));
        }

        if let Some(year) = mapped.birth_year {
            let latest = ctx.as_of.year();
            if !(EARLIEST_BIRTH_YEAR..=latest).contains(&year) {
                return Err(ValidationRejection::out_of_range(
                    "birth_year",
                    year,
                    format!("must be between {EARLIEST_BIRTH_YEAR} and {latest}"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmig_core::{DynMigration, IdMapEntry, Prepared, SkipReason};
    use pmig_store::InMemoryIdMap;
    use pmig_test_utils::{fixed_context, pet_row};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn owners_with(ids: &[i64]) -> (InMemoryIdMap, Vec<TargetId>) {
        let mut map = InMemoryIdMap::new();
        let mut targets = Vec::new();
        for &id in ids {
            let target = TargetId::generate();
            map.insert(&IdMapEntry::new("owners", LegacyId::Int(id), target))
                .unwrap();
            targets.push(target);
        }
        (map, targets)
    }

    #[test]
    fn resolves_owner_and_decodes_codes() {
        let (map, targets) = owners_with(&[10]);
        let mut raw = pet_row(1, 10);
        raw["species"] = json!("c");
        raw["spayed"] = json!("N");

        let Prepared::Accepted { legacy_id, record } =
            PetMigration.prepare(&raw, &map, &fixed_context())
        else {
            panic!("pet should be accepted");
        };
        assert_eq!(legacy_id, LegacyId::Int(1));
        assert_eq!(record["owner_id"], json!(targets[0].to_string()));
        assert_eq!(record["species"], json!("Cat"));
        assert_eq!(record["altered"], json!(false));
    }

    #[test]
    fn unmigrated_owner_is_an_orphan() {
        let (map, _) = owners_with(&[10]);
        let raw = pet_row(2, 99);

        let Prepared::Skipped { legacy_id, reason } =
            PetMigration.prepare(&raw, &map, &fixed_context())
        else {
            panic!("pet should be skipped");
        };
        assert_eq!(legacy_id, Some(LegacyId::Int(2)));
        assert!(reason.is_orphan());
        assert_eq!(
            reason,
            SkipReason::Rejected(ValidationRejection::orphan(
                "owner_id",
                "owners",
                LegacyId::Int(99)
            ))
        );
    }

    #[test]
    fn missing_owner_column_is_a_mapping_error() {
        let (map, _) = owners_with(&[10]);
        let mut raw = pet_row(3, 10);
        raw["owner_id"] = json!(null);

        let Prepared::Skipped { reason, .. } = PetMigration.prepare(&raw, &map, &fixed_context())
        else {
            panic!("pet should be skipped");
        };
        assert_eq!(reason, SkipReason::Mapping(MappingError::missing("owner_id")));
    }

    #[test]
    fn unknown_species_is_a_mapping_error() {
        let (map, _) = owners_with(&[10]);
        let mut raw = pet_row(4, 10);
        raw["species"] = json!("F");

        let Prepared::Skipped { reason, .. } = PetMigration.prepare(&raw, &map, &fixed_context())
        else {
            panic!("pet should be skipped");
        };
        assert_eq!(reason, SkipReason::Mapping(MappingError::invalid_enum("species", "F")));
    }

    #[test]
    fn birth_year_bounded_by_reference_date() {
        let (map, _) = owners_with(&[10]);
        let ctx = fixed_context();

        for (year, ok) in [(1979, false), (1980, true), (2024, true), (2025, false)] {
            let mut raw = pet_row(5, 10);
            raw["birth_year"] = json!(year);
            let accepted = matches!(PetMigration.prepare(&raw, &map, &ctx), Prepared::Accepted { .. });
            assert_eq!(accepted, ok, "birth year {year}");
        }

        let mut raw = pet_row(6, 10);
        raw["birth_year"] = json!(null);
        assert!(matches!(PetMigration.prepare(&raw, &map, &ctx), Prepared::Accepted { .. }));
    }
}
