//! Source Reputation Updater
//!
//! Moves each cited source's trust score toward the share of its citing
//! rank mass that survived defeat, then re-derives the base weight of every
//! fact node citing an updated source.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::info;

use dialectic_core::{ArgumentGraph, EngineConfig};
use dialectic_store::{BaseWeightUpdate, GraphStore, SourceScoreUpdate, SourceStanding};

use crate::{BatchContext, BatchStage, StageError, StageOutput, StageSummary};

/// survived / (total + ε), or 1.0 when nothing was at stake
pub fn survival_ratio(survived_er: f64, total_er: f64, epsilon: f64) -> f64 {
    if total_er < epsilon {
        1.0
    } else {
        survived_er / (total_er + epsilon)
    }
}

/// Exponential moving average clamped to [0, 1]
pub fn next_score(current: f64, ratio: f64, retention: f64) -> f64 {
    (retention * current + (1.0 - retention) * ratio).clamp(0.0, 1.0)
}

pub fn score_updates(standings: &[SourceStanding], config: &EngineConfig) -> Vec<SourceScoreUpdate> {
    standings
        .iter()
        .map(|standing| {
            let ratio = survival_ratio(
                standing.survived_er,
                standing.total_er,
                config.survival_epsilon,
            );
            SourceScoreUpdate {
                source_id: standing.source.id.clone(),
                reputation_score: next_score(
                    standing.source.reputation_score,
                    ratio,
                    config.reputation_retention,
                ),
                survived_er: standing.survived_er,
                total_er: standing.total_er,
            }
        })
        .collect()
}

/// Fact nodes whose weight moved by more than the tolerance
pub fn weight_updates(
    graph: &ArgumentGraph,
    scores: &HashMap<&str, f64>,
    tolerance: f64,
) -> Vec<BaseWeightUpdate> {
    graph
        .nodes
        .iter()
        .filter_map(|node| {
            let subtype = node.fact_subtype?;
            let score = *scores.get(node.source_id.as_deref()?)?;
            let base_weight = subtype.base_weight(score);
            ((base_weight - node.base_weight).abs() > tolerance).then(|| BaseWeightUpdate {
                node_id: node.id.clone(),
                base_weight,
            })
        })
        .collect()
}

/// Stage 6: source trust and fact weights
pub struct SourceReputationUpdater;

#[async_trait]
impl BatchStage for SourceReputationUpdater {
    fn name(&self) -> &'static str {
        "source_reputation"
    }

    async fn run(
        &self,
        ctx: &mut BatchContext,
        store: &dyn GraphStore,
    ) -> Result<StageOutput, StageError> {
        let standings = store.load_cited_sources().await?;
        let scores = score_updates(&standings, &ctx.config);
        if !scores.is_empty() {
            store.write_source_scores(&scores).await?;
        }

        let by_source: HashMap<&str, f64> = scores
            .iter()
            .map(|u| (u.source_id.as_str(), u.reputation_score))
            .collect();
        let weights = weight_updates(&ctx.graph, &by_source, ctx.config.weight_tolerance);
        if !weights.is_empty() {
            store.write_base_weights(&weights).await?;
        }

        info!(
            "Updated {} source scores, rewrote {} fact weights",
            scores.len(),
            weights.len()
        );

        Ok(StageOutput::quiet(StageSummary::SourceReputation {
            sources: scores.len(),
            weights_rewritten: weights.len(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dialectic_core::{FactSubtype, Node, Source};
    use dialectic_store::MemoryStore;

    #[test]
    fn test_empty_mass_counts_as_full_survival() {
        assert_eq!(survival_ratio(0.0, 0.0, 1e-9), 1.0);
        assert!((survival_ratio(5.0, 10.0, 1e-9) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_moving_average_is_clamped() {
        assert!((next_score(0.5, 0.0, 0.9) - 0.45).abs() < 1e-12);
        assert!((next_score(0.5, 1.0, 0.9) - 0.55).abs() < 1e-12);
        assert_eq!(next_score(1.0, 3.0, 0.9), 1.0);
    }

    #[test]
    fn test_small_weight_changes_are_not_written() {
        let graph = ArgumentGraph::new(
            vec![
                Node::new("doc")
                    .citing("s", FactSubtype::DocumentRef)
                    .with_weight(3.5),
                Node::new("paper")
                    .citing("s", FactSubtype::AcademicRef)
                    .with_weight(5.0),
                Node::new("untyped").with_weight(1.0),
            ],
            vec![],
            vec![],
        );
        let scores = HashMap::from([("s", 0.5)]);

        let updates = weight_updates(&graph, &scores, 0.001);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].node_id, "paper");
        assert_eq!(updates[0].base_weight, 7.5);
    }

    #[tokio::test]
    async fn test_stage_updates_scores_and_weights() {
        let mut alive = Node::new("alive")
            .with_votes(4)
            .citing("src", FactSubtype::AcademicRef)
            .with_weight(7.5);
        alive.evidence_rank = 30.0;
        let dead = Node::new("dead")
            .with_votes(10)
            .citing("src", FactSubtype::DocumentRef)
            .with_weight(3.0)
            .defeated();

        let store = MemoryStore::with_sources(
            vec![alive, dead],
            vec![],
            vec![],
            vec![Source::new("src", 0.5), Source::new("idle", 0.8)],
        );
        let mut ctx = BatchContext::load(&store, EngineConfig::default(), Utc::now())
            .await
            .unwrap();

        SourceReputationUpdater.run(&mut ctx, &store).await.unwrap();

        // survived 30, total 30 + 10 * 3.0
        let source = store.source("src").unwrap();
        assert!((source.reputation_score - 0.5).abs() < 1e-6);
        assert_eq!(source.total_er, 60.0);
        assert_eq!(store.source("idle").unwrap().reputation_score, 0.8);

        assert!((store.node("dead").unwrap().base_weight - 3.5).abs() < 1e-6);
        assert_eq!(store.node("alive").unwrap().base_weight, 7.5);
    }
}
