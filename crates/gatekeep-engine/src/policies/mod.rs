//! Policy implementations known to this binary and the registry resolving them.
//!
//! Concrete predicates live outside the engine; the registry is how a deployment
//! plugs them in at startup.

pub mod dummy;
pub mod registry;

pub use dummy::DummyPolicy;
pub use registry::{PolicyFactory, PolicyRegistry};
