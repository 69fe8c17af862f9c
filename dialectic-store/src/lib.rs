//! Dialectic Store
//!
//! The persistence side of the reconciliation job:
//! - [`GraphStore`]: the collaborator interface every stage reads and writes through
//! - [`MemoryStore`]: an in-memory implementation with failure injection
//! - [`GraphSnapshot`]: JSON snapshot files for offline runs

pub mod traits;
pub mod memory;
pub mod snapshot;

pub use traits::*;
pub use memory::*;
pub use snapshot::*;
