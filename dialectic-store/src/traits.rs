//! Persistence collaborator interface
//!
//! Everything the batch reads or writes goes through [`GraphStore`]. Writers
//! take a whole stage's worth of updates so that each stage commits in one
//! batch; implementations validate the batch before applying any of it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use dialectic_core::{
    BridgedComponents, Edge, EscrowOutcome, EscrowStatus, KarmaDelta, Node, Notification,
    Scheme, Source,
};

/// Errors from the persistence layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Write {op} failed: {reason}")]
    Write { op: &'static str, reason: String },

    #[error("Unknown {kind}: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Scheme {scheme_id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        scheme_id: String,
        from: EscrowStatus,
        to: EscrowStatus,
    },

    #[error("Scheme {0} already carries a bounty")]
    BountyAlreadySet(String),

    #[error("Notification to {user_id} failed: {reason}")]
    Notification { user_id: String, reason: String },

    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot format error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// New component id for one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentAssignment {
    pub node_id: String,
    pub component_id: String,
}

/// A bridge escrow opened by component tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscrowOpening {
    pub scheme_id: String,
    pub bounty: i64,
    pub expires_at: DateTime<Utc>,
    pub bridged: BridgedComponents,
}

/// Final rank and defeat flag for one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankUpdate {
    pub node_id: String,
    pub evidence_rank: f64,
    pub is_defeated: bool,
}

/// A node having a defeated node among the premises of one of its schemes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamDependent {
    pub node_id: String,
    pub author_id: Option<String>,
    pub defeated_premise_id: String,
}

/// A pending escrow past its expiry, with the state of its conclusion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaturedEscrow {
    pub scheme: Scheme,
    pub conclusion_id: Option<String>,
    pub conclusion_defeated: bool,
    pub conclusion_rank: f64,
}

/// Terminal status for one matured escrow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowResolution {
    pub scheme_id: String,
    pub outcome: EscrowOutcome,
}

/// Karma owed to one user by settled escrows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KarmaCredit {
    pub user_id: String,
    pub delta: KarmaDelta,
}

/// A cited source with the rank mass of its citing nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceStanding {
    pub source: Source,
    pub survived_er: f64,
    pub total_er: f64,
}

/// New reputation and aggregates for one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceScoreUpdate {
    pub source_id: String,
    pub reputation_score: f64,
    pub survived_er: f64,
    pub total_er: f64,
}

/// New base weight for one fact node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseWeightUpdate {
    pub node_id: String,
    pub base_weight: f64,
}

/// Reads and batched writes the reconciliation job needs
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn load_nodes(&self) -> Result<Vec<Node>, StoreError>;

    /// All schemes, in no particular order
    async fn load_schemes(&self) -> Result<Vec<Scheme>, StoreError>;

    async fn load_edges(&self) -> Result<Vec<Edge>, StoreError>;

    /// Nodes persisted as defeated before this run
    async fn load_defeated_node_ids(&self) -> Result<HashSet<String>, StoreError>;

    async fn write_component_ids(
        &self,
        assignments: &[ComponentAssignment],
    ) -> Result<(), StoreError>;

    /// Moves each scheme from `none` to `pending` and fixes its bounty
    async fn open_escrows(&self, openings: &[EscrowOpening]) -> Result<(), StoreError>;

    async fn write_ranks(&self, updates: &[RankUpdate]) -> Result<(), StoreError>;

    /// Nodes that use any of `defeated` as a premise
    async fn load_upstream_dependents(
        &self,
        defeated: &[String],
    ) -> Result<Vec<UpstreamDependent>, StoreError>;

    /// Upserts the user's profile and bumps the global counters
    async fn apply_karma(&self, user_id: &str, delta: &KarmaDelta) -> Result<(), StoreError>;

    async fn load_matured_escrows(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<MaturedEscrow>, StoreError>;

    /// Moves each escrow out of `pending` and pays the credits, all or nothing
    async fn settle_escrows(
        &self,
        resolutions: &[EscrowResolution],
        credits: &[KarmaCredit],
    ) -> Result<(), StoreError>;

    /// Sources cited by at least one node
    async fn load_cited_sources(&self) -> Result<Vec<SourceStanding>, StoreError>;

    async fn write_source_scores(&self, updates: &[SourceScoreUpdate]) -> Result<(), StoreError>;

    async fn write_base_weights(&self, updates: &[BaseWeightUpdate]) -> Result<(), StoreError>;

    async fn send_notification(&self, notification: &Notification) -> Result<(), StoreError>;
}
