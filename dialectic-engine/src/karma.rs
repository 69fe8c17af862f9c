//! Karma Distributor
//!
//! Turns the rank of undefeated, authored, role-tagged nodes into karma:
//! each yields `emission_constant * evidence_rank` into the bucket matching
//! its role, summed per author.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::info;

use dialectic_core::{ArgumentGraph, KarmaBucket, KarmaDelta};
use dialectic_store::GraphStore;

use crate::{BatchContext, BatchStage, RankOutcome, StageError, StageOutput, StageSummary};

/// Per-author yield, ordered by author id
pub fn compute_payouts(
    graph: &ArgumentGraph,
    outcome: &RankOutcome,
    emission_constant: f64,
) -> BTreeMap<String, KarmaDelta> {
    let mut payouts: BTreeMap<String, KarmaDelta> = BTreeMap::new();

    for (i, node) in graph.nodes.iter().enumerate() {
        if outcome.defeated[i] {
            continue;
        }
        let (Some(author), Some(role)) = (node.author_id.as_ref(), node.node_role) else {
            continue;
        };

        payouts
            .entry(author.clone())
            .or_default()
            .credit(KarmaBucket::from(role), emission_constant * outcome.ranks[i]);
    }

    payouts
}

/// Stage 4: karma emission
pub struct KarmaDistributor;

#[async_trait]
impl BatchStage for KarmaDistributor {
    fn name(&self) -> &'static str {
        "karma"
    }

    async fn run(
        &self,
        ctx: &mut BatchContext,
        store: &dyn GraphStore,
    ) -> Result<StageOutput, StageError> {
        let outcome = ctx.ranks_for(self.name())?;
        let payouts = compute_payouts(&ctx.graph, outcome, ctx.config.emission_constant);

        let mut emitted = 0.0;
        for (author, delta) in &payouts {
            store.apply_karma(author, delta).await?;
            emitted += delta.total();
        }

        info!("Paid {:.4} karma to {} authors", emitted, payouts.len());

        Ok(StageOutput::quiet(StageSummary::Karma {
            authors: payouts.len(),
            emitted,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dialectic_core::{EngineConfig, Node, NodeRole};
    use dialectic_store::MemoryStore;

    use crate::RankReport;

    fn outcome(ranks: Vec<f64>, defeated: Vec<bool>) -> RankOutcome {
        RankOutcome {
            ranks,
            defeated,
            report: RankReport {
                relations: 0,
                rounds: Vec::new(),
                defeat_set_stable: true,
                defeated: 0,
                total_rank: 0.0,
            },
        }
    }

    #[test]
    fn test_root_rank_ten_pays_tenth_of_pioneer() {
        let graph = ArgumentGraph::new(
            vec![Node::new("r").with_author("ann").with_role(NodeRole::Root)],
            vec![],
            vec![],
        );
        let payouts = compute_payouts(&graph, &outcome(vec![10.0], vec![false]), 0.01);

        assert!((payouts["ann"].pioneer - 0.1).abs() < 1e-12);
        assert_eq!(payouts["ann"].builder, 0.0);
    }

    #[test]
    fn test_buckets_follow_role_and_skip_ineligible() {
        let graph = ArgumentGraph::new(
            vec![
                Node::new("s").with_author("ann").with_role(NodeRole::Support),
                Node::new("a").with_author("ann").with_role(NodeRole::Attack),
                Node::new("dead").with_author("ann").with_role(NodeRole::Root),
                Node::new("anon").with_role(NodeRole::Root),
                Node::new("roleless").with_author("bob"),
            ],
            vec![],
            vec![],
        );
        let ranks = outcome(
            vec![20.0, 50.0, 0.0, 40.0, 40.0],
            vec![false, false, true, false, false],
        );

        let payouts = compute_payouts(&graph, &ranks, 0.01);
        assert_eq!(payouts.len(), 1);
        let ann = payouts["ann"];
        assert!((ann.builder - 0.2).abs() < 1e-12);
        assert!((ann.critic - 0.5).abs() < 1e-12);
        assert_eq!(ann.pioneer, 0.0);
    }

    #[tokio::test]
    async fn test_stage_credits_profiles() {
        let store = MemoryStore::with_graph(
            vec![Node::new("r")
                .with_author("ann")
                .with_role(NodeRole::Root)
                .with_votes(10)],
            vec![],
            vec![],
        );
        let mut ctx = BatchContext::load(&store, EngineConfig::default(), Utc::now())
            .await
            .unwrap();
        ctx.ranks = Some(outcome(vec![10.0], vec![false]));

        KarmaDistributor.run(&mut ctx, &store).await.unwrap();

        let profile = store.karma("ann").unwrap();
        assert!((profile.pioneer - 0.1).abs() < 1e-12);
        assert!((store.global_karma().pioneer - 0.1).abs() < 1e-12);
    }
}
