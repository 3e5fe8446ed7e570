//! Binding data model: what to check for a target, and how to weigh results.
//!
//! A `Target` owns an ordered set of `Binding`s. Each binding points at exactly
//! one of a policy, a group, or a user, and carries the metadata the engine
//! needs (order, timeout, negation, failure fallback).

mod binding;
mod policy;
mod target;

pub use binding::{Binding, BindingSubject, DEFAULT_BINDING_TIMEOUT};
pub use policy::{Policy, PolicyCheck, ABSTRACT_COMPONENT};
pub use target::{PolicyEngineMode, Target};
