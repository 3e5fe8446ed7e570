//! Isolated execution of a single binding.
//!
//! Each cache-miss binding runs in its own task. A panicking or hanging policy
//! only ever affects that task: the outer boundary converts panics into failing
//! results, and the orchestrator bounds how long it waits.

mod worker;

pub use worker::PolicyProcess;
