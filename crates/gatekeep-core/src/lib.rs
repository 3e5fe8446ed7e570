//! gatekeep core: value types, the policy capability, and the binding model.
//!
//! This crate defines the request/result contracts and error surface shared by
//! the evaluation engine, concrete policy implementations, and admin tooling.
//! It intentionally carries no runtime, cache, or transport dependencies so it
//! can be reused by out-of-tree policy crates.
//!
//! # Panic policy
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `GatekeepError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod cleanse;
pub mod error;
pub mod model;
pub mod types;

/// Shared result type.
pub use error::{GatekeepError, PolicyException, Result};
pub use model::{Binding, BindingSubject, Policy, PolicyCheck, PolicyEngineMode, Target};
pub use types::{PolicyRequest, PolicyResult, TransportContext, User};
