//! Component Tracker
//!
//! Partitions nodes into connected components and opens bridge escrows.
//! - Reads: the frozen graph, including the partition persisted last run
//! - Writes: component ids, new escrows
//!
//! Each scheme is a hyperedge: all its premises and conclusions collapse
//! into one component. A component is named after its smallest node id, so
//! the names do not depend on the order schemes are loaded in.
//!
//! A scheme without an escrow is a bridge when its endpoints carry two or
//! more distinct component ids from the previous run. Nodes the previous run
//! never saw belong to no component yet and are left out of the span.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::{debug, info};

use dialectic_core::{ArgumentGraph, BridgedComponents, EngineConfig, GraphIndex};
use dialectic_store::{ComponentAssignment, EscrowOpening, GraphStore};

use crate::{BatchContext, BatchStage, StageError, StageOutput, StageSummary};

/// Union-find arena over dense node indices
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
    size: Vec<usize>,
}

impl UnionFind {
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
            size: vec![1; len],
        }
    }

    pub fn find(&mut self, mut x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[x] != root {
            let next = self.parent[x];
            self.parent[x] = root;
            x = next;
        }
        root
    }

    /// Merge the sets holding `a` and `b`, returning the surviving root
    pub fn union(&mut self, a: usize, b: usize) -> usize {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return ra;
        }
        let (root, child) = match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => (rb, ra),
            std::cmp::Ordering::Greater => (ra, rb),
            std::cmp::Ordering::Equal => {
                self.rank[ra] += 1;
                (ra, rb)
            }
        };
        self.parent[child] = root;
        self.size[root] += self.size[child];
        root
    }

    /// Size of the set containing `x`
    pub fn size_of(&mut self, x: usize) -> usize {
        let root = self.find(x);
        self.size[root]
    }
}

/// Partition and bridges found in one pass
#[derive(Debug, Clone)]
pub struct ComponentOutcome {
    /// Component id per node, aligned with the graph's nodes
    pub component_ids: Vec<String>,
    pub sizes: HashMap<String, usize>,
    pub bridges: Vec<EscrowOpening>,
}

impl ComponentOutcome {
    pub fn component_count(&self) -> usize {
        self.sizes.len()
    }

    pub fn largest(&self) -> usize {
        self.sizes.values().copied().max().unwrap_or(0)
    }
}

/// bounty = round(size_a * size_b * factor)
pub fn bridge_bounty(size_a: usize, size_b: usize, factor: f64) -> i64 {
    ((size_a * size_b) as f64 * factor).round() as i64
}

/// Node count per component id persisted by the previous run
pub fn previous_partition(graph: &ArgumentGraph) -> HashMap<&str, usize> {
    let mut sizes: HashMap<&str, usize> = HashMap::new();
    for id in graph.nodes.iter().filter_map(|n| n.component_id.as_deref()) {
        *sizes.entry(id).or_default() += 1;
    }
    sizes
}

/// Schemes without an escrow spanning two or more previous components
pub fn detect_bridges(
    graph: &ArgumentGraph,
    index: &GraphIndex,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Vec<EscrowOpening> {
    let previous = previous_partition(graph);
    let expires_at = now + Duration::hours(config.escrow_window_hours);
    let mut bridges = Vec::new();

    for (scheme, endpoints) in graph.schemes.iter().zip(&index.endpoints) {
        if scheme.has_escrow() {
            continue;
        }

        let mut spanned: Vec<&str> = endpoints
            .all()
            .into_iter()
            .filter_map(|n| graph.nodes[n].component_id.as_deref())
            .collect();
        spanned.sort_unstable();
        spanned.dedup();

        let [a, b, ..] = spanned[..] else {
            continue;
        };
        let size = |id: &str| previous.get(id).copied().unwrap_or(0);
        let bounty = bridge_bounty(size(a), size(b), config.bounty_factor);
        if bounty <= 0 {
            continue;
        }

        debug!(
            "Scheme {} bridges {} and {} (bounty {})",
            scheme.id, a, b, bounty
        );
        bridges.push(EscrowOpening {
            scheme_id: scheme.id.clone(),
            bounty,
            expires_at,
            bridged: BridgedComponents {
                first: a.to_string(),
                second: b.to_string(),
            },
        });
    }

    bridges
}

pub fn track_components(
    graph: &ArgumentGraph,
    index: &GraphIndex,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> ComponentOutcome {
    let mut sets = UnionFind::new(graph.nodes.len());
    for endpoints in &index.endpoints {
        let endpoints = endpoints.all();
        if let Some((&first, rest)) = endpoints.split_first() {
            for &node in rest {
                sets.union(first, node);
            }
        }
    }

    // smallest node id per root
    let mut names: HashMap<usize, &str> = HashMap::new();
    for (i, node) in graph.nodes.iter().enumerate() {
        let root = sets.find(i);
        names
            .entry(root)
            .and_modify(|name| {
                if node.id.as_str() < *name {
                    *name = node.id.as_str();
                }
            })
            .or_insert(node.id.as_str());
    }

    let mut component_ids = Vec::with_capacity(graph.nodes.len());
    let mut sizes: HashMap<String, usize> = HashMap::new();
    for node in 0..graph.nodes.len() {
        let id = names[&sets.find(node)].to_string();
        *sizes.entry(id.clone()).or_default() += 1;
        component_ids.push(id);
    }

    ComponentOutcome {
        component_ids,
        sizes,
        bridges: detect_bridges(graph, index, config, now),
    }
}

/// Stage 1: component ids and bridge escrows
pub struct ComponentTracker;

#[async_trait]
impl BatchStage for ComponentTracker {
    fn name(&self) -> &'static str {
        "components"
    }

    async fn run(
        &self,
        ctx: &mut BatchContext,
        store: &dyn GraphStore,
    ) -> Result<StageOutput, StageError> {
        let outcome = track_components(&ctx.graph, &ctx.index, &ctx.config, ctx.now);

        let assignments: Vec<ComponentAssignment> = ctx
            .graph
            .nodes
            .iter()
            .zip(&outcome.component_ids)
            .map(|(node, component_id)| ComponentAssignment {
                node_id: node.id.clone(),
                component_id: component_id.clone(),
            })
            .collect();

        store.write_component_ids(&assignments).await?;
        if !outcome.bridges.is_empty() {
            store.open_escrows(&outcome.bridges).await?;
        }

        info!(
            "Tracked {} components (largest {}), opened {} escrows",
            outcome.component_count(),
            outcome.largest(),
            outcome.bridges.len()
        );

        let summary = StageSummary::Components {
            components: outcome.component_count(),
            largest: outcome.largest(),
            escrows_opened: outcome.bridges.len(),
        };
        ctx.components = Some(outcome);

        Ok(StageOutput::quiet(summary))
    }
}
