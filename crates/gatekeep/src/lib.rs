//! Top-level facade crate for gatekeep.
//!
//! Re-exports core types and the evaluation engine so users can depend on a single crate.

pub mod core {
    pub use gatekeep_core::*;
}

pub mod engine {
    pub use gatekeep_engine::*;
}
