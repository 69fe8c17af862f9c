//! Dialectic Runtime
//!
//! Drives the nightly batch: one frozen load, six stages in fixed order,
//! notifications flushed after each stage commits.

pub mod orchestrator;

pub use orchestrator::*;
