//! Defeat Resolver
//!
//! Diffs the engine's defeat set against the one persisted before the run.
//! - Newly defeated nodes: STREAM_HALTED to their author
//! - Nodes resting on a newly defeated premise: UPSTREAM_DEFEATED to theirs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, info};

use dialectic_core::{ArgumentGraph, Notification};
use dialectic_store::{GraphStore, UpstreamDependent};

use crate::{BatchContext, BatchStage, RankOutcome, StageError, StageOutput, StageSummary};

/// Indices of nodes defeated now but not before the run
pub fn newly_defeated(
    graph: &ArgumentGraph,
    outcome: &RankOutcome,
    previous: &HashSet<String>,
) -> Vec<usize> {
    graph
        .nodes
        .iter()
        .enumerate()
        .filter(|(i, node)| outcome.defeated[*i] && !previous.contains(&node.id))
        .map(|(i, _)| i)
        .collect()
}

pub fn halted_notifications(
    graph: &ArgumentGraph,
    newly: &[usize],
    preview_chars: usize,
    now: DateTime<Utc>,
) -> Vec<Notification> {
    newly
        .iter()
        .map(|&i| &graph.nodes[i])
        .filter_map(|node| {
            let author = node.author_id.as_deref()?;
            Some(Notification::stream_halted(
                author,
                &node.id,
                &node.preview(preview_chars),
                node.source_id.as_deref(),
                now,
            ))
        })
        .collect()
}

pub fn dependent_notifications(
    dependents: &[UpstreamDependent],
    now: DateTime<Utc>,
) -> Vec<Notification> {
    dependents
        .iter()
        .filter_map(|dep| {
            let author = dep.author_id.as_deref()?;
            Some(Notification::upstream_defeated(
                author,
                &dep.node_id,
                &dep.defeated_premise_id,
                now,
            ))
        })
        .collect()
}

/// Stage 3: notifications for changes in defeat status
pub struct DefeatResolver;

#[async_trait]
impl BatchStage for DefeatResolver {
    fn name(&self) -> &'static str {
        "defeat"
    }

    async fn run(
        &self,
        ctx: &mut BatchContext,
        store: &dyn GraphStore,
    ) -> Result<StageOutput, StageError> {
        let outcome = ctx.ranks_for(self.name())?;
        let newly = newly_defeated(&ctx.graph, outcome, &ctx.previous_defeated);

        if newly.is_empty() {
            debug!("No newly defeated nodes");
            return Ok(StageOutput::quiet(StageSummary::Defeat {
                newly_defeated: 0,
                dependents_notified: 0,
            }));
        }

        let mut notifications =
            halted_notifications(&ctx.graph, &newly, ctx.config.preview_chars, ctx.now);

        let defeated_ids: Vec<String> = newly.iter().map(|&i| ctx.graph.nodes[i].id.clone()).collect();
        let dependents = store.load_upstream_dependents(&defeated_ids).await?;
        let upstream = dependent_notifications(&dependents, ctx.now);
        let dependents_notified = upstream.len();
        notifications.extend(upstream);

        info!(
            "{} nodes newly defeated, {} upstream dependents to notify",
            newly.len(),
            dependents_notified
        );

        Ok(StageOutput {
            summary: StageSummary::Defeat {
                newly_defeated: newly.len(),
                dependents_notified,
            },
            notifications,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EvidenceRankStage;
    use dialectic_core::{Edge, EngineConfig, FactSubtype, Node, NotificationKind, Scheme};
    use dialectic_store::MemoryStore;

    /// "claim" is overwhelmed by "rebuttal" and props up "thesis"
    fn store() -> MemoryStore {
        MemoryStore::with_graph(
            vec![
                Node::new("claim")
                    .with_author("ann")
                    .with_votes(2)
                    .with_content("Tariffs lowered consumer prices across the board in 2019")
                    .citing("report", FactSubtype::DocumentRef),
                Node::new("rebuttal").with_author("bob").with_votes(30),
                Node::new("thesis").with_author("cy").with_votes(1),
                Node::new("orphan").with_votes(1),
            ],
            vec![
                Scheme::attack("s1"),
                Scheme::support("s2"),
                Scheme::support("s3"),
            ],
            vec![
                Edge::premise("s1", "rebuttal"),
                Edge::conclusion("s1", "claim"),
                Edge::premise("s2", "claim"),
                Edge::conclusion("s2", "thesis"),
                Edge::premise("s3", "claim"),
                Edge::conclusion("s3", "orphan"),
            ],
        )
    }

    async fn ranked(store: &MemoryStore) -> BatchContext {
        let config = EngineConfig {
            preview_chars: 7,
            ..EngineConfig::default()
        };
        let mut ctx = BatchContext::load(store, config, Utc::now()).await.unwrap();
        EvidenceRankStage.run(&mut ctx, store).await.unwrap();
        ctx
    }

    #[tokio::test]
    async fn test_newly_defeated_node_halts_stream() {
        let store = store();
        let mut ctx = ranked(&store).await;

        let output = DefeatResolver.run(&mut ctx, &store).await.unwrap();

        let halted: Vec<_> = output
            .notifications
            .iter()
            .filter(|n| n.kind == NotificationKind::StreamHalted)
            .collect();
        assert_eq!(halted.len(), 1);
        assert_eq!(halted[0].user_id, "ann");
        assert_eq!(halted[0].payload["node_id"], "claim");
        assert_eq!(halted[0].payload["preview"], "Tariffs...");
        assert_eq!(halted[0].payload["source_id"], "report");
    }

    #[tokio::test]
    async fn test_dependents_with_authors_are_told_which_premise_fell() {
        let store = store();
        let mut ctx = ranked(&store).await;

        let output = DefeatResolver.run(&mut ctx, &store).await.unwrap();

        let upstream: Vec<_> = output
            .notifications
            .iter()
            .filter(|n| n.kind == NotificationKind::UpstreamDefeated)
            .collect();
        assert_eq!(upstream.len(), 1);
        assert_eq!(upstream[0].user_id, "cy");
        assert_eq!(upstream[0].payload["node_id"], "thesis");
        assert_eq!(upstream[0].payload["defeated_premise_id"], "claim");
        assert!(matches!(
            output.summary,
            StageSummary::Defeat {
                newly_defeated: 1,
                dependents_notified: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_previously_defeated_nodes_stay_quiet() {
        let store = store();
        let mut ctx = ranked(&store).await;
        ctx.previous_defeated.insert("claim".to_string());

        let output = DefeatResolver.run(&mut ctx, &store).await.unwrap();
        assert!(output.notifications.is_empty());
    }

    #[tokio::test]
    async fn test_requires_rank_output() {
        let store = store();
        let mut ctx = BatchContext::load(&store, EngineConfig::default(), Utc::now())
            .await
            .unwrap();

        let err = DefeatResolver.run(&mut ctx, &store).await.unwrap_err();
        assert!(matches!(err, StageError::MissingInput { stage: "defeat", .. }));
    }
}
