//! gatekeep policy engine.
//!
//! Evaluates the ordered bindings attached to a target for a user, one isolated
//! worker per binding, and folds the results under the target's ALL/ANY mode.
//! Also carries the catalog the bindings live in, the decision cache and its
//! invalidation, audit emission, and a small admin/ops HTTP surface.
//!
//! Consumed by the binary (`main.rs`) and by integration tests.

pub mod admin;
pub mod app_state;
pub mod audit;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod invalidation;
pub mod obs;
pub mod ops;
pub mod policies;
pub mod process;
pub mod router;

pub use engine::{EngineContext, PolicyEngine};
