//! Batch Orchestrator
//!
//! Runs the nightly reconciliation job end to end:
//! - Loads the whole graph once into a frozen snapshot
//! - Runs the six stages in fixed order, each committing its own writes
//! - Flushes each stage's notifications after its writes succeed
//! - Reports progress after every stage
//!
//! Only one run may be in flight per orchestrator.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use dialectic_core::{EngineConfig, Notification};
use dialectic_engine::{
    BatchContext, BatchStage, ComponentTracker, DefeatResolver, EscrowClearinghouse,
    EvidenceRankStage, KarmaDistributor, SourceReputationUpdater, StageError, StageSummary,
};
use dialectic_store::{GraphStore, StoreError};

/// Errors that end a run
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("A batch run is already in progress")]
    AlreadyRunning,

    #[error("Failed to load graph: {0}")]
    Load(#[source] StoreError),

    #[error("Stage {stage} failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: StageError,
    },
}

/// Outcome of one committed stage
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub name: &'static str,
    pub summary: StageSummary,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    pub progress: u8,
}

/// Outcome of a complete run
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stages: Vec<StageReport>,
}

impl BatchReport {
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn notifications_sent(&self) -> usize {
        self.stages.iter().map(|s| s.notifications_sent).sum()
    }

    pub fn notifications_failed(&self) -> usize {
        self.stages.iter().map(|s| s.notifications_failed).sum()
    }
}

/// Send notifications with at most `max_concurrent` in flight.
/// Failures are logged and counted, never retried.
pub async fn flush_notifications(
    store: &dyn GraphStore,
    notifications: &[Notification],
    max_concurrent: usize,
) -> (usize, usize) {
    let results: Vec<bool> = stream::iter(notifications)
        .map(|notification| async move {
            match store.send_notification(notification).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        "Dropping {:?} notification for {}: {}",
                        notification.kind, notification.user_id, e
                    );
                    false
                }
            }
        })
        .buffer_unordered(max_concurrent.max(1))
        .collect()
        .await;

    let sent = results.iter().filter(|ok| **ok).count();
    (sent, results.len() - sent)
}

/// Entry point of the nightly job
pub struct BatchOrchestrator {
    store: Arc<dyn GraphStore>,
    config: EngineConfig,
    stages: Vec<Box<dyn BatchStage>>,
    in_flight: Mutex<()>,
}

impl BatchOrchestrator {
    pub fn new(store: Arc<dyn GraphStore>, config: EngineConfig) -> Self {
        let stages: Vec<Box<dyn BatchStage>> = vec![
            Box::new(ComponentTracker),
            Box::new(EvidenceRankStage),
            Box::new(DefeatResolver),
            Box::new(KarmaDistributor),
            Box::new(EscrowClearinghouse),
            Box::new(SourceReputationUpdater),
        ];
        debug!("Initialized {} stages", stages.len());

        Self {
            store,
            config,
            stages,
            in_flight: Mutex::new(()),
        }
    }

    /// Stage names in run order
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run one batch against the current time
    pub async fn run<F>(&self, progress: F) -> Result<BatchReport, BatchError>
    where
        F: Fn(u8) + Send + Sync,
    {
        self.run_at(Utc::now(), progress).await
    }

    /// Run one batch with `now` as the clock for escrow expiry and maturity
    pub async fn run_at<F>(&self, now: DateTime<Utc>, progress: F) -> Result<BatchReport, BatchError>
    where
        F: Fn(u8) + Send + Sync,
    {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| BatchError::AlreadyRunning)?;

        let started_at = Utc::now();
        let store = self.store.as_ref();

        let mut ctx = BatchContext::load(store, self.config.clone(), now)
            .await
            .map_err(|e| {
                error!("Graph load failed, nothing written: {}", e);
                BatchError::Load(e)
            })?;

        info!(
            "Batch {} starting: {} nodes, {} schemes, {} edges",
            ctx.run_id,
            ctx.graph.nodes.len(),
            ctx.graph.schemes.len(),
            ctx.graph.edges.len()
        );
        if ctx.index.dangling_edges > 0 {
            warn!("Ignoring {} edges with unknown endpoints", ctx.index.dangling_edges);
        }

        let total = self.stages.len();
        let mut reports = Vec::with_capacity(total);

        for (i, stage) in self.stages.iter().enumerate() {
            let name = stage.name();
            debug!("Stage {} starting", name);

            let output = stage.run(&mut ctx, store).await.map_err(|source| {
                error!("Stage {} failed: {}", name, source);
                BatchError::Stage {
                    stage: name,
                    source,
                }
            })?;

            let (sent, failed) = flush_notifications(
                store,
                &output.notifications,
                self.config.notification_concurrency,
            )
            .await;
            if failed > 0 {
                warn!("Stage {}: {} of {} notifications failed", name, failed, sent + failed);
            }

            let pct = ((i + 1) * 100 / total) as u8;
            progress(pct);
            info!("Stage {} done ({}%)", name, pct);

            reports.push(StageReport {
                name,
                summary: output.summary,
                notifications_sent: sent,
                notifications_failed: failed,
                progress: pct,
            });
        }

        info!("Batch {} complete", ctx.run_id);

        Ok(BatchReport {
            run_id: ctx.run_id,
            started_at,
            finished_at: Utc::now(),
            stages: reports,
        })
    }
}
