//! PMIG Pipeline - batch migration driver
//!
//! - [`MigrationRunner`]: drives one entity through
//!   read → map → validate → write → record mapping → report
//! - [`RunSummary`]: migrated / skipped / errored counts and per-record context
//! - [`MigrationPlan`]: runs entities parents-first
//!
//! # Example
//!
//! ```rust,ignore
//! use pmig_pipeline::{MigrationPlan, MigrationRunner, RunOptions};
//!
//! let plan = MigrationPlan::new(pmig_petlicense::registry())?;
//! let mut runner = MigrationRunner::new(&catalog, &mut sink, &mut id_map, RunOptions::new());
//! let summary = runner.run(plan.get("pets")?).await?;
//! println!("{}", summary.generate_text());
//! ```

#![warn(unreachable_pub)]

mod driver;
mod plan;
mod report;

pub use driver::{MigrationRunner, RunError, RunOptions, DEFAULT_BATCH_SIZE};
pub use plan::{MigrationPlan, PlanError, PlanReport};
pub use report::{RecordFailure, RunSummary, SkippedRecord};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
