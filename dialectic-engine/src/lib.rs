//! Dialectic Engine
//!
//! The six stages of the nightly reconciliation job, in run order:
//! - **Components**: partitions the graph and opens bridge escrows
//! - **Evidence rank**: fixed-point rank and defeat status
//! - **Defeat**: notifies authors of newly defeated and dependent nodes
//! - **Karma**: pays rank-proportional karma to authors
//! - **Escrow**: clears matured bridge bounties
//! - **Source reputation**: updates source trust and fact weights
//!
//! Each stage implements [`BatchStage`], commits its own writes, and returns
//! its notifications unsent.

pub mod traits;
pub mod components;
pub mod evidence_rank;
pub mod defeat;
pub mod karma;
pub mod escrow;
pub mod source_reputation;

pub use traits::*;
pub use components::*;
pub use evidence_rank::*;
pub use defeat::*;
pub use karma::*;
pub use escrow::*;
pub use source_reputation::*;
