//! Common traits for reconciliation stages

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

use dialectic_core::{ArgumentGraph, EngineConfig, GraphIndex, Notification};
use dialectic_store::{GraphStore, StoreError};

use crate::{ComponentOutcome, RankOutcome, RankReport};

/// Errors from stage execution
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Stage {stage} needs the output of {missing}")]
    MissingInput {
        stage: &'static str,
        missing: &'static str,
    },
}

/// Frozen graph plus the outputs earlier stages hand to later ones
#[derive(Debug)]
pub struct BatchContext {
    pub run_id: Uuid,
    pub now: DateTime<Utc>,
    pub config: EngineConfig,
    pub graph: ArgumentGraph,
    pub index: GraphIndex,
    /// Defeat set persisted before this run started
    pub previous_defeated: HashSet<String>,
    pub components: Option<ComponentOutcome>,
    pub ranks: Option<RankOutcome>,
}

impl BatchContext {
    pub fn new(
        graph: ArgumentGraph,
        previous_defeated: HashSet<String>,
        config: EngineConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let index = graph.index();
        Self {
            run_id: Uuid::new_v4(),
            now,
            config,
            graph,
            index,
            previous_defeated,
            components: None,
            ranks: None,
        }
    }

    /// Take the snapshot every numerical stage works from
    pub async fn load(
        store: &dyn GraphStore,
        config: EngineConfig,
        now: DateTime<Utc>,
    ) -> Result<Self, StoreError> {
        let nodes = store.load_nodes().await?;
        let schemes = store.load_schemes().await?;
        let edges = store.load_edges().await?;
        let previous_defeated = store.load_defeated_node_ids().await?;

        Ok(Self::new(
            ArgumentGraph::new(nodes, schemes, edges),
            previous_defeated,
            config,
            now,
        ))
    }

    pub fn ranks_for(&self, stage: &'static str) -> Result<&RankOutcome, StageError> {
        self.ranks.as_ref().ok_or(StageError::MissingInput {
            stage,
            missing: "evidence_rank",
        })
    }
}

/// What a stage committed, for the run report
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageSummary {
    Components {
        components: usize,
        largest: usize,
        escrows_opened: usize,
    },
    EvidenceRank(RankReport),
    Defeat {
        newly_defeated: usize,
        dependents_notified: usize,
    },
    Karma {
        authors: usize,
        emitted: f64,
    },
    Escrow {
        stolen: usize,
        languished: usize,
        paid: usize,
    },
    SourceReputation {
        sources: usize,
        weights_rewritten: usize,
    },
}

/// Result of one stage: its summary and the notifications still to send
#[derive(Debug, Clone)]
pub struct StageOutput {
    pub summary: StageSummary,
    pub notifications: Vec<Notification>,
}

impl StageOutput {
    pub fn quiet(summary: StageSummary) -> Self {
        Self {
            summary,
            notifications: Vec::new(),
        }
    }
}

/// Common interface for the six reconciliation stages
#[async_trait]
pub trait BatchStage: Send + Sync {
    /// Stable stage name used in logs and reports
    fn name(&self) -> &'static str;

    /// Compute from the context, commit through the store, and hand back
    /// notifications for the orchestrator to flush
    async fn run(
        &self,
        ctx: &mut BatchContext,
        store: &dyn GraphStore,
    ) -> Result<StageOutput, StageError>;
}
