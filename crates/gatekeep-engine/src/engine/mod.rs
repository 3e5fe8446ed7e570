//! Orchestration: resolve bindings, reuse cached decisions, dispatch workers,
//! wait with per-binding budgets and fold the results.

mod context;
mod orchestrator;

pub use crate::config::schema::TimeoutMode;
pub use context::EngineContext;
pub use orchestrator::PolicyEngine;
