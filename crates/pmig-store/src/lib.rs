//! PMIG Store - concrete legacy sources, sinks and identifier maps
//!
//! - [`InMemoryCatalog`] / [`JsonlCatalog`]: chunked readers over legacy tables
//! - [`InMemorySink`] / [`JsonlSink`]: destinations for accepted records
//! - [`InMemoryIdMap`] / [`JsonlIdMap`]: append-only identifier maps

#![warn(unreachable_pub)]

mod id_map;
mod sink;
mod source;

pub use id_map::{InMemoryIdMap, JsonlIdMap};
pub use sink::{InMemorySink, JsonlSink, StoredRecord};
pub use source::{InMemoryCatalog, InMemorySource, JsonlCatalog, JsonlSource};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
