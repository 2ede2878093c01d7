//! Shared helpers for promconf integration tests.

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::Harness;
