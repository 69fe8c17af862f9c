//! Evidence Rank Engine
//!
//! Fixed-point computation of rank and defeat status over the
//! support/attack relations.
//!
//! Every (premise, conclusion) pair sharing a scheme becomes a directed
//! relation tagged with the scheme's direction. Each iteration recomputes
//! every node from the previous iteration's ranks and defeat flags only
//! (Jacobi update), using two buffers that swap roles:
//!
//! ```text
//! supportive = seed + Σ rank(p)   over undefeated SUPPORT premises
//! attacking  =        Σ rank(p)   over undefeated ATTACK premises
//! defeated   = attacking > supportive + margin
//! rank       = defeated ? 0 : max(0, supportive - attacking)
//! ```
//!
//! The inner loop runs until the largest rank change drops below the
//! tolerance or the iteration cap is hit. An outer loop re-runs it from the
//! last defeat set until that set stops changing, up to a fixed number of
//! rounds. Running out of rounds is reported, not corrected.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use dialectic_core::{ArgumentGraph, Direction, EngineConfig, GraphIndex};
use dialectic_store::{GraphStore, RankUpdate};

use crate::{BatchContext, BatchStage, StageError, StageOutput, StageSummary};

/// Incoming relations per conclusion, in compressed sparse row layout
#[derive(Debug, Clone)]
pub struct RelationGraph {
    offsets: Vec<usize>,
    premises: Vec<usize>,
    directions: Vec<Direction>,
}

impl RelationGraph {
    pub fn build(graph: &ArgumentGraph, index: &GraphIndex) -> Self {
        let node_count = graph.nodes.len();
        let mut triples = Vec::new();

        for (scheme, endpoints) in graph.schemes.iter().zip(&index.endpoints) {
            for &premise in &endpoints.premises {
                for &conclusion in &endpoints.conclusions {
                    if premise != conclusion {
                        triples.push((conclusion, premise, scheme.direction));
                    }
                }
            }
        }

        let mut offsets = vec![0; node_count + 1];
        for &(conclusion, _, _) in &triples {
            offsets[conclusion + 1] += 1;
        }
        for i in 0..node_count {
            offsets[i + 1] += offsets[i];
        }

        let mut cursor = offsets.clone();
        let mut premises = vec![0; triples.len()];
        let mut directions = vec![Direction::Support; triples.len()];
        for (conclusion, premise, direction) in triples {
            let slot = cursor[conclusion];
            premises[slot] = premise;
            directions[slot] = direction;
            cursor[conclusion] += 1;
        }

        Self {
            offsets,
            premises,
            directions,
        }
    }

    pub fn incoming(&self, node: usize) -> impl Iterator<Item = (usize, Direction)> + '_ {
        let range = self.offsets[node]..self.offsets[node + 1];
        self.premises[range.clone()]
            .iter()
            .copied()
            .zip(self.directions[range].iter().copied())
    }

    pub fn relation_count(&self) -> usize {
        self.premises.len()
    }
}

/// One buffer of the ping-pong pair
#[derive(Debug, Clone, PartialEq)]
pub struct RankState {
    pub ranks: Vec<f64>,
    pub defeated: Vec<bool>,
}

/// How one inner loop ended
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundReport {
    pub iterations: usize,
    /// Largest rank change of the last iteration
    pub max_delta: f64,
    /// Largest rank change of every iteration, in order
    pub deltas: Vec<f64>,
    pub converged: bool,
    /// Nodes whose defeat flag differs from the round's starting set
    pub defeat_changes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankReport {
    pub relations: usize,
    pub rounds: Vec<RoundReport>,
    /// False when the outer round cap was hit with the defeat set still moving
    pub defeat_set_stable: bool,
    pub defeated: usize,
    pub total_rank: f64,
}

/// Final ranks and defeat flags, aligned with the graph's nodes
#[derive(Debug, Clone)]
pub struct RankOutcome {
    pub ranks: Vec<f64>,
    pub defeated: Vec<bool>,
    pub report: RankReport,
}

pub struct EvidenceRankEngine<'a> {
    config: &'a EngineConfig,
    relations: RelationGraph,
    seeds: Vec<f64>,
}

impl<'a> EvidenceRankEngine<'a> {
    pub fn new(graph: &ArgumentGraph, index: &GraphIndex, config: &'a EngineConfig) -> Self {
        Self {
            config,
            relations: RelationGraph::build(graph, index),
            seeds: graph.nodes.iter().map(|n| n.seed()).collect(),
        }
    }

    /// Compute `next` from `prev`, returning the largest rank change
    pub fn step(&self, prev: &RankState, next: &mut RankState) -> f64 {
        let mut max_delta: f64 = 0.0;

        for node in 0..self.seeds.len() {
            let mut supportive = self.seeds[node];
            let mut attacking = 0.0;

            for (premise, direction) in self.relations.incoming(node) {
                if prev.defeated[premise] {
                    continue;
                }
                match direction {
                    Direction::Support => supportive += prev.ranks[premise],
                    Direction::Attack => attacking += prev.ranks[premise],
                }
            }

            let defeated = attacking > supportive + self.config.defeat_margin;
            let rank = if defeated {
                0.0
            } else {
                (supportive - attacking).max(0.0)
            };

            max_delta = max_delta.max((rank - prev.ranks[node]).abs());
            next.ranks[node] = rank;
            next.defeated[node] = defeated;
        }

        max_delta
    }

    /// Starting buffer: seeds for undefeated nodes, zero for defeated ones
    fn initial_state(&self, defeated: &[bool]) -> RankState {
        let ranks = self
            .seeds
            .iter()
            .zip(defeated)
            .map(|(&seed, &d)| if d { 0.0 } else { seed.max(0.0) })
            .collect();
        RankState {
            ranks,
            defeated: defeated.to_vec(),
        }
    }

    /// Run the inner loop from a fixed starting defeat set
    pub fn converge(&self, start_defeated: &[bool]) -> (RankState, RoundReport) {
        let mut current = self.initial_state(start_defeated);
        let mut next = current.clone();
        let mut iterations = 0;
        let mut max_delta = 0.0;
        let mut deltas = Vec::new();
        let mut converged = false;

        while iterations < self.config.max_inner_iterations {
            max_delta = self.step(&current, &mut next);
            std::mem::swap(&mut current, &mut next);
            deltas.push(max_delta);
            iterations += 1;

            if max_delta < self.config.convergence_tolerance {
                converged = true;
                break;
            }
        }

        let defeat_changes = current
            .defeated
            .iter()
            .zip(start_defeated)
            .filter(|(a, b)| a != b)
            .count();

        (
            current,
            RoundReport {
                iterations,
                max_delta,
                deltas,
                converged,
                defeat_changes,
            },
        )
    }

    /// Outer defeat-coresolution loop
    pub fn solve(&self, initial_defeated: &[bool]) -> RankOutcome {
        let mut defeated = initial_defeated.to_vec();
        let mut rounds = Vec::new();
        let mut state = self.initial_state(&defeated);
        let mut stable = false;

        for round in 0..self.config.max_outer_rounds {
            let (next, report) = self.converge(&defeated);
            debug!(
                "Rank round {}: {} iterations, max delta {:.6}, {} defeat changes",
                round + 1,
                report.iterations,
                report.max_delta,
                report.defeat_changes
            );
            if !report.converged {
                warn!(
                    "Rank round {} hit the iteration cap (max delta {:.6})",
                    round + 1,
                    report.max_delta
                );
            }

            stable = report.defeat_changes == 0;
            rounds.push(report);
            defeated.clone_from(&next.defeated);
            state = next;

            if stable {
                break;
            }
        }

        if !stable {
            warn!(
                "Defeat set still changing after {} rounds; keeping the last round",
                rounds.len()
            );
        }

        let report = RankReport {
            relations: self.relations.relation_count(),
            rounds,
            defeat_set_stable: stable,
            defeated: state.defeated.iter().filter(|d| **d).count(),
            total_rank: state.ranks.iter().sum(),
        };

        RankOutcome {
            ranks: state.ranks,
            defeated: state.defeated,
            report,
        }
    }
}

/// Stage 2: evidence rank and defeat status
pub struct EvidenceRankStage;

#[async_trait]
impl BatchStage for EvidenceRankStage {
    fn name(&self) -> &'static str {
        "evidence_rank"
    }

    async fn run(
        &self,
        ctx: &mut BatchContext,
        store: &dyn GraphStore,
    ) -> Result<StageOutput, StageError> {
        let initial: Vec<bool> = ctx.graph.nodes.iter().map(|n| n.is_defeated).collect();
        let outcome = EvidenceRankEngine::new(&ctx.graph, &ctx.index, &ctx.config).solve(&initial);

        let updates: Vec<RankUpdate> = ctx
            .graph
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| RankUpdate {
                node_id: node.id.clone(),
                evidence_rank: outcome.ranks[i],
                is_defeated: outcome.defeated[i],
            })
            .collect();
        store.write_ranks(&updates).await?;

        info!(
            "Ranked {} nodes over {} relations: {} defeated, {} rounds",
            updates.len(),
            outcome.report.relations,
            outcome.report.defeated,
            outcome.report.rounds.len()
        );

        let summary = StageSummary::EvidenceRank(outcome.report.clone());
        ctx.ranks = Some(outcome);
        Ok(StageOutput::quiet(summary))
    }
}
