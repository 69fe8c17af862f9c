//! Dialectic Core - argumentation graph model for the nightly reconciliation job
//!
//! This crate provides the foundational primitives:
//! - I-nodes, schemes (S-nodes) and the edges joining them
//! - Escrow lifecycle for bridge bounties
//! - Karma buckets and epistemic notifications
//! - Engine configuration with TOML loading

pub mod graph;
pub mod karma;
pub mod notification;
pub mod config;

pub use graph::*;
pub use karma::*;
pub use notification::*;
pub use config::*;

/// Attacking mass must exceed supportive mass by more than this to defeat a node
pub const DEFEAT_MARGIN: f64 = 1.0;

/// Inner loop stops once the largest rank change falls below this
pub const CONVERGENCE_TOLERANCE: f64 = 0.001;

/// Inner loop iteration cap
pub const MAX_INNER_ITERATIONS: usize = 20;

/// Outer defeat-coresolution round cap
pub const MAX_OUTER_ROUNDS: usize = 3;

/// Bounty = round(size_a * size_b * BOUNTY_FACTOR)
pub const BOUNTY_FACTOR: f64 = 0.1;

/// Hours between bridge detection and escrow maturity
pub const ESCROW_WINDOW_HOURS: i64 = 72;

/// Karma yield per unit of evidence rank
pub const EMISSION_CONSTANT: f64 = 0.01;

/// Minimum conclusion rank for a matured bounty to pay out
pub const MIN_PAYOUT_RANK: f64 = 5.0;

/// Share of a stolen bounty credited to the attacker
pub const STOLEN_SHARE: f64 = 0.5;

/// Weight kept from the previous source score in the moving average
pub const REPUTATION_RETENTION: f64 = 0.9;

/// Guards the survival ratio against an empty denominator
pub const SURVIVAL_EPSILON: f64 = 1e-9;

/// Base weights closer than this are not rewritten
pub const WEIGHT_TOLERANCE: f64 = 0.001;

/// Default base weight for nodes that do not cite a source
pub const DEFAULT_BASE_WEIGHT: f64 = 1.0;
