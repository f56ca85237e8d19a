//! PMIG Core - legacy record migration model
//!
//! The pieces every migration stage is assembled from:
//! - [`LegacyId`] / [`TargetId`] and the durable [`IdMapEntry`]
//! - the error taxonomy: [`MappingError`], [`ValidationRejection`],
//!   [`PersistenceError`], [`SourceError`], [`IdMapError`]
//! - the store seams: [`LegacySource`], [`RecordSink`], [`IdentifierMap`]
//! - [`EntityMigration`], a pure mapper plus validator for one legacy table
//!
//! # Example
//!
//! ```rust,ignore
//! use pmig_core::prelude::*;
//!
//! let prepared = owners.prepare(&raw_row, &id_map, &MigrationContext::today());
//! if let Prepared::Accepted { legacy_id, record } = prepared {
//!     sink.persist("owners", TargetId::generate(), &record).await?;
//! }
//! ```

#![warn(unreachable_pub)]

pub mod error;
pub mod migration;
pub mod ports;
pub mod types;

pub use error::{
    IdMapError, MappingError, MappingFailure, PersistenceError, SourceError, ValidationRejection,
};
pub use migration::{DynMigration, EntityMigration, Prepared, SkipReason};
pub use ports::{
    IdentifierMap, LayeredResolver, LegacySource, RecordSink, ReferenceResolver, SourceCatalog,
    SourceRow,
};
pub use types::{IdMapEntry, LegacyId, MigrationContext, TargetId};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for writing migrations and stores
    pub use crate::{
        DynMigration, EntityMigration, IdMapEntry, IdentifierMap, LegacyId, LegacySource,
        MappingError, MigrationContext, Prepared, RecordSink, ReferenceResolver, SkipReason,
        SourceRow, TargetId, ValidationRejection,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
