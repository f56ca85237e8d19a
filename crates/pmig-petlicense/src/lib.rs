//! PMIG PetLicense - owner, pet and license migrations
//!
//! Legacy tables and the order they migrate in:
//!
//! | entity     | legacy id    | depends on |
//! |------------|--------------|------------|
//! | `owners`   | `owner_id`   |            |
//! | `pets`     | `pet_id`     | `owners`   |
//! | `licenses` | `license_no` | `pets`     |

#![warn(unreachable_pub)]

mod codes;
pub mod licenses;
pub mod owners;
pub mod pets;

pub use licenses::{License, LicenseMigration, LicenseStatus, LegacyLicense};
pub use owners::{LegacyOwner, Owner, OwnerMigration};
pub use pets::{LegacyPet, Pet, PetMigration, Species};

use pmig_core::DynMigration;

/// Every PetLicense migration, in registration order
#[must_use]
pub fn registry() -> Vec<Box<dyn DynMigration>> {
    vec![
        Box::new(OwnerMigration),
        Box::new(PetMigration),
        Box::new(LicenseMigration),
    ]
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
