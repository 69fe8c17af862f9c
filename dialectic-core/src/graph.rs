//! Argumentation hypergraph model
//!
//! The graph is built by upstream collaborators between batch runs:
//! - I-nodes carry content, votes and the computed rank/defeat fields
//! - Schemes (S-nodes) relate premises to conclusions as SUPPORT or ATTACK
//! - Edges attach nodes to schemes in a premise or conclusion role
//!
//! The batch only ever rewrites the computed fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::DEFAULT_BASE_WEIGHT;

/// Rhetorical function of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeRole {
    Root,
    Support,
    Attack,
}

/// Kind of sourced fact a node asserts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FactSubtype {
    DocumentRef,
    AcademicRef,
}

impl FactSubtype {
    /// Base weight for a fact citing a source with the given reputation
    pub fn base_weight(self, reputation: f64) -> f64 {
        match self {
            FactSubtype::DocumentRef => 2.0 + 3.0 * reputation,
            FactSubtype::AcademicRef => 5.0 + 5.0 * reputation,
        }
    }
}

/// An argumentative unit (I-node)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,

    #[serde(default)]
    pub author_id: Option<String>,

    #[serde(default)]
    pub content: String,

    /// User-facing vote signal, may be negative
    #[serde(default)]
    pub vote_score: i64,

    /// Intrinsic credibility weight
    #[serde(default = "default_base_weight")]
    pub base_weight: f64,

    #[serde(default)]
    pub evidence_rank: f64,

    #[serde(default)]
    pub is_defeated: bool,

    #[serde(default)]
    pub component_id: Option<String>,

    #[serde(default)]
    pub node_role: Option<NodeRole>,

    #[serde(default)]
    pub source_id: Option<String>,

    #[serde(default)]
    pub fact_subtype: Option<FactSubtype>,
}

fn default_base_weight() -> f64 {
    DEFAULT_BASE_WEIGHT
}

impl Node {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            author_id: None,
            content: String::new(),
            vote_score: 0,
            base_weight: DEFAULT_BASE_WEIGHT,
            evidence_rank: 0.0,
            is_defeated: false,
            component_id: None,
            node_role: None,
            source_id: None,
            fact_subtype: None,
        }
    }

    pub fn with_author(mut self, author_id: &str) -> Self {
        self.author_id = Some(author_id.to_string());
        self
    }

    pub fn with_content(mut self, content: &str) -> Self {
        self.content = content.to_string();
        self
    }

    pub fn with_votes(mut self, vote_score: i64) -> Self {
        self.vote_score = vote_score;
        self
    }

    pub fn with_weight(mut self, base_weight: f64) -> Self {
        self.base_weight = base_weight;
        self
    }

    pub fn with_role(mut self, role: NodeRole) -> Self {
        self.node_role = Some(role);
        self
    }

    pub fn citing(mut self, source_id: &str, subtype: FactSubtype) -> Self {
        self.source_id = Some(source_id.to_string());
        self.fact_subtype = Some(subtype);
        self
    }

    pub fn defeated(mut self) -> Self {
        self.is_defeated = true;
        self.evidence_rank = 0.0;
        self
    }

    /// Rank mass the node contributes on its own: max(0, votes) * base_weight
    pub fn seed(&self) -> f64 {
        self.vote_score.max(0) as f64 * self.base_weight
    }

    /// First `max_chars` characters of the content, with an ellipsis when cut
    pub fn preview(&self, max_chars: usize) -> String {
        let mut chars = self.content.chars();
        let head: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            format!("{}...", head)
        } else {
            head
        }
    }
}

/// Direction of a scheme's relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Support,
    Attack,
}

/// Escrow lifecycle of a bridge scheme: none -> pending -> resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowStatus {
    #[default]
    None,
    Pending,
    Stolen,
    Languished,
    Paid,
}

impl EscrowStatus {
    pub fn can_transition_to(self, next: EscrowStatus) -> bool {
        matches!(
            (self, next),
            (EscrowStatus::None, EscrowStatus::Pending)
                | (EscrowStatus::Pending, EscrowStatus::Stolen)
                | (EscrowStatus::Pending, EscrowStatus::Languished)
                | (EscrowStatus::Pending, EscrowStatus::Paid)
        )
    }

    pub fn is_resolved(self) -> bool {
        matches!(
            self,
            EscrowStatus::Stolen | EscrowStatus::Languished | EscrowStatus::Paid
        )
    }
}

/// Terminal outcome of a matured escrow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowOutcome {
    Stolen,
    Languished,
    Paid,
}

impl EscrowOutcome {
    pub fn status(self) -> EscrowStatus {
        match self {
            EscrowOutcome::Stolen => EscrowStatus::Stolen,
            EscrowOutcome::Languished => EscrowStatus::Languished,
            EscrowOutcome::Paid => EscrowStatus::Paid,
        }
    }
}

/// The two components a bridge scheme joined when it was detected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgedComponents {
    pub first: String,
    pub second: String,
}

/// A relation construct (S-node)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scheme {
    pub id: String,

    pub direction: Direction,

    #[serde(default)]
    pub escrow_status: EscrowStatus,

    /// Set once at bridge detection, never recomputed
    #[serde(default)]
    pub pending_bounty: Option<i64>,

    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub bridged_components: Option<BridgedComponents>,

    #[serde(default)]
    pub author_id: Option<String>,

    #[serde(default)]
    pub attacking_author_id: Option<String>,
}

impl Scheme {
    pub fn new(id: &str, direction: Direction) -> Self {
        Self {
            id: id.to_string(),
            direction,
            escrow_status: EscrowStatus::None,
            pending_bounty: None,
            expires_at: None,
            bridged_components: None,
            author_id: None,
            attacking_author_id: None,
        }
    }

    pub fn support(id: &str) -> Self {
        Self::new(id, Direction::Support)
    }

    pub fn attack(id: &str) -> Self {
        Self::new(id, Direction::Attack)
    }

    pub fn with_author(mut self, author_id: &str) -> Self {
        self.author_id = Some(author_id.to_string());
        self
    }

    pub fn with_attacker(mut self, author_id: &str) -> Self {
        self.attacking_author_id = Some(author_id.to_string());
        self
    }

    /// A scheme already holding an escrow in some state
    pub fn has_escrow(&self) -> bool {
        self.escrow_status != EscrowStatus::None
    }
}

/// Role of a node on a scheme edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeRole {
    Premise,
    Conclusion,
}

/// Links a scheme to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub scheme_id: String,
    pub node_id: String,
    pub role: EdgeRole,
}

impl Edge {
    pub fn premise(scheme_id: &str, node_id: &str) -> Self {
        Self {
            scheme_id: scheme_id.to_string(),
            node_id: node_id.to_string(),
            role: EdgeRole::Premise,
        }
    }

    pub fn conclusion(scheme_id: &str, node_id: &str) -> Self {
        Self {
            scheme_id: scheme_id.to_string(),
            node_id: node_id.to_string(),
            role: EdgeRole::Conclusion,
        }
    }
}

/// An external source cited by fact nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,

    /// Trust score in [0, 1]
    pub reputation_score: f64,

    /// Rank mass of undefeated citing nodes
    #[serde(default)]
    pub survived_er: f64,

    /// Rank mass of all citing nodes
    #[serde(default)]
    pub total_er: f64,
}

impl Source {
    pub fn new(id: &str, reputation_score: f64) -> Self {
        Self {
            id: id.to_string(),
            reputation_score,
            survived_er: 0.0,
            total_er: 0.0,
        }
    }
}

/// Premises and conclusions of one scheme, as dense node indices
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemeEndpoints {
    pub premises: Vec<usize>,
    pub conclusions: Vec<usize>,
}

impl SchemeEndpoints {
    /// Every endpoint, premises first, without repeats
    pub fn all(&self) -> Vec<usize> {
        let mut seen = Vec::with_capacity(self.premises.len() + self.conclusions.len());
        for &idx in self.premises.iter().chain(&self.conclusions) {
            if !seen.contains(&idx) {
                seen.push(idx);
            }
        }
        seen
    }
}

/// Frozen copy of the whole hypergraph, taken once at the start of a run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArgumentGraph {
    pub nodes: Vec<Node>,
    pub schemes: Vec<Scheme>,
    pub edges: Vec<Edge>,
}

impl ArgumentGraph {
    pub fn new(nodes: Vec<Node>, schemes: Vec<Scheme>, edges: Vec<Edge>) -> Self {
        Self {
            nodes,
            schemes,
            edges,
        }
    }

    /// Resolve string ids into dense indices
    pub fn index(&self) -> GraphIndex {
        let node_index: HashMap<String, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
        let scheme_index: HashMap<&str, usize> = self
            .schemes
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.as_str(), i))
            .collect();

        let mut endpoints = vec![SchemeEndpoints::default(); self.schemes.len()];
        let mut dangling_edges = 0;

        for edge in &self.edges {
            let (Some(&scheme), Some(&node)) = (
                scheme_index.get(edge.scheme_id.as_str()),
                node_index.get(&edge.node_id),
            ) else {
                dangling_edges += 1;
                continue;
            };

            let slot = match edge.role {
                EdgeRole::Premise => &mut endpoints[scheme].premises,
                EdgeRole::Conclusion => &mut endpoints[scheme].conclusions,
            };
            if !slot.contains(&node) {
                slot.push(node);
            }
        }

        GraphIndex {
            node_index,
            endpoints,
            dangling_edges,
        }
    }
}

/// Dense-index view of an [`ArgumentGraph`]
#[derive(Debug, Clone)]
pub struct GraphIndex {
    pub node_index: HashMap<String, usize>,
    /// Aligned with `ArgumentGraph::schemes`
    pub endpoints: Vec<SchemeEndpoints>,
    /// Edges naming an unknown scheme or node
    pub dangling_edges: usize,
}
