//! In-memory catalog of policies, targets and bindings.
//!
//! The catalog is the source of truth the engine snapshots targets from. Every
//! mutation that can make a cached decision stale is reported to the registered
//! `CatalogListener`s before the mutating call returns.

mod loader;
mod store;

pub use store::{Catalog, CatalogListener};
