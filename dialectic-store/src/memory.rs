//! In-memory graph store
//!
//! Backs offline runs from snapshot files and serves as the fake
//! collaborator in tests. Failures can be injected per operation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use dialectic_core::{
    BridgedComponents, Direction, Edge, EdgeRole, EscrowStatus, KarmaDelta, KarmaProfile, Node,
    Notification, Scheme, Source,
};

use crate::{
    BaseWeightUpdate, ComponentAssignment, EscrowOpening, EscrowResolution, GraphSnapshot,
    GraphStore, KarmaCredit, MaturedEscrow, RankUpdate, SourceScoreUpdate, SourceStanding,
    StoreError, UpstreamDependent,
};

/// Write operation names accepted by [`MemoryStore::fail_write`]
pub mod ops {
    pub const COMPONENT_IDS: &str = "component_ids";
    pub const ESCROW_OPENINGS: &str = "escrow_openings";
    pub const RANKS: &str = "ranks";
    pub const KARMA: &str = "karma";
    pub const ESCROW_RESOLUTIONS: &str = "escrow_resolutions";
    pub const SOURCE_SCORES: &str = "source_scores";
    pub const BASE_WEIGHTS: &str = "base_weights";
}

#[derive(Debug, Default)]
struct FailurePlan {
    loads: bool,
    writes: HashSet<&'static str>,
    notify_users: HashSet<String>,
}

#[derive(Debug, Default)]
struct GraphState {
    nodes: Vec<Node>,
    node_index: HashMap<String, usize>,
    schemes: Vec<Scheme>,
    scheme_index: HashMap<String, usize>,
    edges: Vec<Edge>,
    sources: Vec<Source>,
    source_index: HashMap<String, usize>,
}

impl GraphState {
    fn new(nodes: Vec<Node>, schemes: Vec<Scheme>, edges: Vec<Edge>, sources: Vec<Source>) -> Self {
        let node_index = nodes.iter().enumerate().map(|(i, n)| (n.id.clone(), i)).collect();
        let scheme_index = schemes.iter().enumerate().map(|(i, s)| (s.id.clone(), i)).collect();
        let source_index = sources.iter().enumerate().map(|(i, s)| (s.id.clone(), i)).collect();
        Self {
            nodes,
            node_index,
            schemes,
            scheme_index,
            edges,
            sources,
            source_index,
        }
    }

    fn node_slot(&self, id: &str) -> Result<usize, StoreError> {
        self.node_index.get(id).copied().ok_or_else(|| StoreError::NotFound {
            kind: "node",
            id: id.to_string(),
        })
    }

    fn scheme_slot(&self, id: &str) -> Result<usize, StoreError> {
        self.scheme_index.get(id).copied().ok_or_else(|| StoreError::NotFound {
            kind: "scheme",
            id: id.to_string(),
        })
    }

    fn source_slot(&self, id: &str) -> Result<usize, StoreError> {
        self.source_index.get(id).copied().ok_or_else(|| StoreError::NotFound {
            kind: "source",
            id: id.to_string(),
        })
    }

    /// Premise and conclusion node ids of a scheme, in edge order
    fn endpoints(&self, scheme_id: &str) -> (Vec<&str>, Vec<&str>) {
        let mut premises = Vec::new();
        let mut conclusions = Vec::new();
        for edge in self.edges.iter().filter(|e| e.scheme_id == scheme_id) {
            if !self.node_index.contains_key(&edge.node_id) {
                continue;
            }
            match edge.role {
                EdgeRole::Premise => premises.push(edge.node_id.as_str()),
                EdgeRole::Conclusion => conclusions.push(edge.node_id.as_str()),
            }
        }
        (premises, conclusions)
    }
}

/// Thread-safe store holding the whole graph in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    graph: RwLock<GraphState>,
    karma: DashMap<String, KarmaProfile>,
    global_karma: Mutex<KarmaDelta>,
    notifications: DashMap<String, Vec<Notification>>,
    failures: Mutex<FailurePlan>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_graph(nodes: Vec<Node>, schemes: Vec<Scheme>, edges: Vec<Edge>) -> Self {
        Self::with_sources(nodes, schemes, edges, Vec::new())
    }

    pub fn with_sources(
        nodes: Vec<Node>,
        schemes: Vec<Scheme>,
        edges: Vec<Edge>,
        sources: Vec<Source>,
    ) -> Self {
        Self {
            graph: RwLock::new(GraphState::new(nodes, schemes, edges, sources)),
            ..Self::default()
        }
    }

    pub fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        let store = Self::with_sources(
            snapshot.nodes,
            snapshot.schemes,
            snapshot.edges,
            snapshot.sources,
        );
        for profile in snapshot.karma {
            store.karma.insert(profile.user_id.clone(), profile);
        }
        *store.global_karma.lock() = snapshot.global_karma;
        for notification in snapshot.notifications {
            store
                .notifications
                .entry(notification.user_id.clone())
                .or_default()
                .push(notification);
        }
        store
    }

    pub fn to_snapshot(&self) -> GraphSnapshot {
        let graph = self.graph.read();

        let mut karma: Vec<KarmaProfile> = self.karma.iter().map(|e| e.value().clone()).collect();
        karma.sort_by(|a, b| a.user_id.cmp(&b.user_id));

        let mut inboxes: Vec<(String, Vec<Notification>)> = self
            .notifications
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        inboxes.sort_by(|a, b| a.0.cmp(&b.0));

        GraphSnapshot {
            nodes: graph.nodes.clone(),
            schemes: graph.schemes.clone(),
            edges: graph.edges.clone(),
            sources: graph.sources.clone(),
            karma,
            global_karma: *self.global_karma.lock(),
            notifications: inboxes.into_iter().flat_map(|(_, n)| n).collect(),
        }
    }

    pub fn node(&self, id: &str) -> Option<Node> {
        let graph = self.graph.read();
        graph.node_index.get(id).map(|&i| graph.nodes[i].clone())
    }

    pub fn scheme(&self, id: &str) -> Option<Scheme> {
        let graph = self.graph.read();
        graph.scheme_index.get(id).map(|&i| graph.schemes[i].clone())
    }

    pub fn source(&self, id: &str) -> Option<Source> {
        let graph = self.graph.read();
        graph.source_index.get(id).map(|&i| graph.sources[i].clone())
    }

    pub fn karma(&self, user_id: &str) -> Option<KarmaProfile> {
        self.karma.get(user_id).map(|p| p.value().clone())
    }

    pub fn global_karma(&self) -> KarmaDelta {
        *self.global_karma.lock()
    }

    pub fn notifications_for(&self, user_id: &str) -> Vec<Notification> {
        self.notifications
            .get(user_id)
            .map(|n| n.value().clone())
            .unwrap_or_default()
    }

    pub fn notification_count(&self) -> usize {
        self.notifications.iter().map(|e| e.value().len()).sum()
    }

    /// Changes a node's votes, as the upstream pipeline would between runs
    pub fn set_vote_score(&self, node_id: &str, vote_score: i64) -> Result<(), StoreError> {
        let mut graph = self.graph.write();
        let slot = graph.node_slot(node_id)?;
        graph.nodes[slot].vote_score = vote_score;
        Ok(())
    }

    pub fn fail_loads(&self, fail: bool) {
        self.failures.lock().loads = fail;
    }

    /// Make the named write (see [`ops`]) fail until cleared
    pub fn fail_write(&self, op: &'static str) {
        self.failures.lock().writes.insert(op);
    }

    pub fn clear_write_failures(&self) {
        self.failures.lock().writes.clear();
    }

    pub fn fail_notifications_for(&self, user_id: &str) {
        self.failures.lock().notify_users.insert(user_id.to_string());
    }

    fn credit_karma(&self, user_id: &str, delta: &KarmaDelta) {
        self.karma
            .entry(user_id.to_string())
            .or_insert_with(|| KarmaProfile::new(user_id))
            .apply(delta);
        self.global_karma.lock().add(delta);
    }

    fn check_load(&self) -> Result<(), StoreError> {
        if self.failures.lock().loads {
            return Err(StoreError::Unavailable("injected load failure".to_string()));
        }
        Ok(())
    }

    fn check_write(&self, op: &'static str) -> Result<(), StoreError> {
        if self.failures.lock().writes.contains(op) {
            return Err(StoreError::Write {
                op,
                reason: "injected write failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn load_nodes(&self) -> Result<Vec<Node>, StoreError> {
        self.check_load()?;
        Ok(self.graph.read().nodes.clone())
    }

    async fn load_schemes(&self) -> Result<Vec<Scheme>, StoreError> {
        self.check_load()?;
        Ok(self.graph.read().schemes.clone())
    }

    async fn load_edges(&self) -> Result<Vec<Edge>, StoreError> {
        self.check_load()?;
        Ok(self.graph.read().edges.clone())
    }

    async fn load_defeated_node_ids(&self) -> Result<HashSet<String>, StoreError> {
        self.check_load()?;
        Ok(self
            .graph
            .read()
            .nodes
            .iter()
            .filter(|n| n.is_defeated)
            .map(|n| n.id.clone())
            .collect())
    }

    async fn write_component_ids(
        &self,
        assignments: &[ComponentAssignment],
    ) -> Result<(), StoreError> {
        self.check_write(ops::COMPONENT_IDS)?;
        let mut graph = self.graph.write();
        let slots = assignments
            .iter()
            .map(|a| graph.node_slot(&a.node_id))
            .collect::<Result<Vec<_>, _>>()?;
        for (slot, assignment) in slots.into_iter().zip(assignments) {
            graph.nodes[slot].component_id = Some(assignment.component_id.clone());
        }
        debug!("Wrote {} component ids", assignments.len());
        Ok(())
    }

    async fn open_escrows(&self, openings: &[EscrowOpening]) -> Result<(), StoreError> {
        self.check_write(ops::ESCROW_OPENINGS)?;
        let mut graph = self.graph.write();

        let mut slots = Vec::with_capacity(openings.len());
        for opening in openings {
            let slot = graph.scheme_slot(&opening.scheme_id)?;
            let scheme = &graph.schemes[slot];
            if scheme.pending_bounty.is_some() {
                return Err(StoreError::BountyAlreadySet(scheme.id.clone()));
            }
            if !scheme.escrow_status.can_transition_to(EscrowStatus::Pending) {
                return Err(StoreError::InvalidTransition {
                    scheme_id: scheme.id.clone(),
                    from: scheme.escrow_status,
                    to: EscrowStatus::Pending,
                });
            }
            slots.push(slot);
        }

        for (slot, opening) in slots.into_iter().zip(openings) {
            let scheme = &mut graph.schemes[slot];
            scheme.escrow_status = EscrowStatus::Pending;
            scheme.pending_bounty = Some(opening.bounty);
            scheme.expires_at = Some(opening.expires_at);
            scheme.bridged_components = Some(BridgedComponents {
                first: opening.bridged.first.clone(),
                second: opening.bridged.second.clone(),
            });
        }
        Ok(())
    }

    async fn write_ranks(&self, updates: &[RankUpdate]) -> Result<(), StoreError> {
        self.check_write(ops::RANKS)?;
        let mut graph = self.graph.write();
        let slots = updates
            .iter()
            .map(|u| graph.node_slot(&u.node_id))
            .collect::<Result<Vec<_>, _>>()?;
        for (slot, update) in slots.into_iter().zip(updates) {
            let node = &mut graph.nodes[slot];
            node.evidence_rank = update.evidence_rank;
            node.is_defeated = update.is_defeated;
        }
        debug!("Wrote {} ranks", updates.len());
        Ok(())
    }

    async fn load_upstream_dependents(
        &self,
        defeated: &[String],
    ) -> Result<Vec<UpstreamDependent>, StoreError> {
        self.check_load()?;
        let graph = self.graph.read();
        let defeated: HashSet<&str> = defeated.iter().map(String::as_str).collect();

        let mut seen = HashSet::new();
        let mut dependents = Vec::new();

        for scheme in graph.schemes.iter().filter(|s| s.direction == Direction::Support) {
            let (premises, conclusions) = graph.endpoints(&scheme.id);
            for premise in premises.into_iter().filter(|p| defeated.contains(p)) {
                for &conclusion in &conclusions {
                    if conclusion == premise || !seen.insert((conclusion, premise)) {
                        continue;
                    }
                    let node = &graph.nodes[graph.node_index[conclusion]];
                    dependents.push(UpstreamDependent {
                        node_id: conclusion.to_string(),
                        author_id: node.author_id.clone(),
                        defeated_premise_id: premise.to_string(),
                    });
                }
            }
        }

        Ok(dependents)
    }

    async fn apply_karma(&self, user_id: &str, delta: &KarmaDelta) -> Result<(), StoreError> {
        self.check_write(ops::KARMA)?;
        self.credit_karma(user_id, delta);
        Ok(())
    }

    async fn load_matured_escrows(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<MaturedEscrow>, StoreError> {
        self.check_load()?;
        let graph = self.graph.read();

        let matured = graph
            .schemes
            .iter()
            .filter(|s| s.escrow_status == EscrowStatus::Pending)
            .filter(|s| s.expires_at.is_some_and(|at| at <= now))
            .map(|scheme| {
                let (_, conclusions) = graph.endpoints(&scheme.id);
                let conclusion = conclusions
                    .first()
                    .map(|id| &graph.nodes[graph.node_index[*id]]);
                MaturedEscrow {
                    scheme: scheme.clone(),
                    conclusion_id: conclusion.map(|n| n.id.clone()),
                    conclusion_defeated: conclusion.is_some_and(|n| n.is_defeated),
                    conclusion_rank: conclusion.map_or(0.0, |n| n.evidence_rank),
                }
            })
            .collect();

        Ok(matured)
    }

    async fn settle_escrows(
        &self,
        resolutions: &[EscrowResolution],
        credits: &[KarmaCredit],
    ) -> Result<(), StoreError> {
        self.check_write(ops::ESCROW_RESOLUTIONS)?;
        if !credits.is_empty() {
            self.check_write(ops::KARMA)?;
        }
        let mut graph = self.graph.write();

        let mut slots = Vec::with_capacity(resolutions.len());
        for resolution in resolutions {
            let slot = graph.scheme_slot(&resolution.scheme_id)?;
            let scheme = &graph.schemes[slot];
            let next = resolution.outcome.status();
            if !scheme.escrow_status.can_transition_to(next) {
                return Err(StoreError::InvalidTransition {
                    scheme_id: scheme.id.clone(),
                    from: scheme.escrow_status,
                    to: next,
                });
            }
            slots.push(slot);
        }

        for (slot, resolution) in slots.into_iter().zip(resolutions) {
            graph.schemes[slot].escrow_status = resolution.outcome.status();
        }
        for credit in credits {
            self.credit_karma(&credit.user_id, &credit.delta);
        }
        debug!(
            "Settled {} escrows, credited {} users",
            resolutions.len(),
            credits.len()
        );
        Ok(())
    }

    /// Defeated citing nodes have rank 0, so they count toward `total_er`
    /// with their seed mass, the rank they would have carried unopposed.
    async fn load_cited_sources(&self) -> Result<Vec<SourceStanding>, StoreError> {
        self.check_load()?;
        let graph = self.graph.read();

        let mut citing: HashMap<&str, Vec<&Node>> = HashMap::new();
        for node in &graph.nodes {
            if let Some(source_id) = node.source_id.as_deref() {
                citing.entry(source_id).or_default().push(node);
            }
        }

        let standings = graph
            .sources
            .iter()
            .filter_map(|source| {
                let nodes = citing.get(source.id.as_str())?;
                let mut survived_er = 0.0;
                let mut total_er = 0.0;
                for node in nodes {
                    if node.is_defeated {
                        total_er += node.seed();
                    } else {
                        survived_er += node.evidence_rank;
                        total_er += node.evidence_rank;
                    }
                }
                Some(SourceStanding {
                    source: source.clone(),
                    survived_er,
                    total_er,
                })
            })
            .collect();

        Ok(standings)
    }

    async fn write_source_scores(&self, updates: &[SourceScoreUpdate]) -> Result<(), StoreError> {
        self.check_write(ops::SOURCE_SCORES)?;
        let mut graph = self.graph.write();
        let slots = updates
            .iter()
            .map(|u| graph.source_slot(&u.source_id))
            .collect::<Result<Vec<_>, _>>()?;
        for (slot, update) in slots.into_iter().zip(updates) {
            let source = &mut graph.sources[slot];
            source.reputation_score = update.reputation_score;
            source.survived_er = update.survived_er;
            source.total_er = update.total_er;
        }
        Ok(())
    }

    async fn write_base_weights(&self, updates: &[BaseWeightUpdate]) -> Result<(), StoreError> {
        self.check_write(ops::BASE_WEIGHTS)?;
        let mut graph = self.graph.write();
        let slots = updates
            .iter()
            .map(|u| graph.node_slot(&u.node_id))
            .collect::<Result<Vec<_>, _>>()?;
        for (slot, update) in slots.into_iter().zip(updates) {
            graph.nodes[slot].base_weight = update.base_weight;
        }
        Ok(())
    }

    async fn send_notification(&self, notification: &Notification) -> Result<(), StoreError> {
        if self.failures.lock().notify_users.contains(&notification.user_id) {
            return Err(StoreError::Notification {
                user_id: notification.user_id.clone(),
                reason: "injected send failure".to_string(),
            });
        }
        self.notifications
            .entry(notification.user_id.clone())
            .or_default()
            .push(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use dialectic_core::{EscrowOutcome, FactSubtype, KarmaBucket};

    fn support_store() -> MemoryStore {
        MemoryStore::with_graph(
            vec![
                Node::new("p").with_author("ann").with_votes(3),
                Node::new("c").with_author("bob").with_votes(2),
                Node::new("x").with_author("cy"),
            ],
            vec![Scheme::support("s1"), Scheme::attack("s2")],
            vec![
                Edge::premise("s1", "p"),
                Edge::conclusion("s1", "c"),
                Edge::premise("s2", "p"),
                Edge::conclusion("s2", "x"),
            ],
        )
    }

    fn opening(scheme_id: &str, expires_at: DateTime<Utc>) -> EscrowOpening {
        EscrowOpening {
            scheme_id: scheme_id.to_string(),
            bounty: 4,
            expires_at,
            bridged: BridgedComponents {
                first: "a".to_string(),
                second: "b".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_upstream_dependents_follow_support_only() {
        let store = support_store();
        let dependents = store
            .load_upstream_dependents(&["p".to_string()])
            .await
            .unwrap();

        assert_eq!(dependents.len(), 1);
        assert_eq!(dependents[0].node_id, "c");
        assert_eq!(dependents[0].author_id.as_deref(), Some("bob"));
        assert_eq!(dependents[0].defeated_premise_id, "p");
    }

    #[tokio::test]
    async fn test_bounty_cannot_be_reassigned() {
        let store = support_store();
        let now = Utc::now();

        store.open_escrows(&[opening("s1", now)]).await.unwrap();
        let err = store.open_escrows(&[opening("s1", now)]).await.unwrap_err();
        assert!(matches!(err, StoreError::BountyAlreadySet(_)));

        let scheme = store.scheme("s1").unwrap();
        assert_eq!(scheme.escrow_status, EscrowStatus::Pending);
        assert_eq!(scheme.pending_bounty, Some(4));
    }

    #[tokio::test]
    async fn test_matured_escrows_and_one_way_resolution() {
        let store = support_store();
        let now = Utc::now();
        store
            .open_escrows(&[
                opening("s1", now - Duration::hours(1)),
                opening("s2", now + Duration::hours(1)),
            ])
            .await
            .unwrap();

        let matured = store.load_matured_escrows(now).await.unwrap();
        assert_eq!(matured.len(), 1);
        assert_eq!(matured[0].scheme.id, "s1");
        assert_eq!(matured[0].conclusion_id.as_deref(), Some("c"));

        let resolution = EscrowResolution {
            scheme_id: "s1".to_string(),
            outcome: EscrowOutcome::Paid,
        };
        store
            .settle_escrows(&[resolution.clone()], &[])
            .await
            .unwrap();
        let err = store.settle_escrows(&[resolution], &[]).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
        assert!(store.load_matured_escrows(now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_settlement_commits_status_and_credit_together() {
        let store = support_store();
        let now = Utc::now();
        store
            .open_escrows(&[opening("s1", now - Duration::hours(1))])
            .await
            .unwrap();
        let resolution = EscrowResolution {
            scheme_id: "s1".to_string(),
            outcome: EscrowOutcome::Paid,
        };
        let credit = KarmaCredit {
            user_id: "ann".to_string(),
            delta: KarmaDelta::single(KarmaBucket::Pioneer, 4.0),
        };

        store.fail_write(ops::KARMA);
        let err = store
            .settle_escrows(&[resolution.clone()], &[credit.clone()])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Write { op: "karma", .. }));
        assert_eq!(store.scheme("s1").unwrap().escrow_status, EscrowStatus::Pending);
        assert!(store.karma("ann").is_none());

        store.clear_write_failures();
        store.settle_escrows(&[resolution], &[credit]).await.unwrap();
        assert_eq!(store.scheme("s1").unwrap().escrow_status, EscrowStatus::Paid);
        assert_eq!(store.karma("ann").unwrap().pioneer, 4.0);
        assert_eq!(store.global_karma().pioneer, 4.0);
    }

    #[tokio::test]
    async fn test_batch_write_is_all_or_nothing() {
        let store = support_store();
        let updates = vec![
            RankUpdate {
                node_id: "p".to_string(),
                evidence_rank: 9.0,
                is_defeated: false,
            },
            RankUpdate {
                node_id: "ghost".to_string(),
                evidence_rank: 1.0,
                is_defeated: false,
            },
        ];

        let err = store.write_ranks(&updates).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: "node", .. }));
        assert_eq!(store.node("p").unwrap().evidence_rank, 0.0);
    }

    #[tokio::test]
    async fn test_cited_sources_split_by_defeat() {
        let mut defeated = Node::new("d")
            .with_votes(4)
            .citing("src", FactSubtype::DocumentRef)
            .defeated();
        defeated.base_weight = 2.0;
        let mut alive = Node::new("a").citing("src", FactSubtype::DocumentRef);
        alive.evidence_rank = 12.0;

        let store = MemoryStore::with_sources(
            vec![defeated, alive, Node::new("plain")],
            vec![],
            vec![],
            vec![Source::new("src", 0.5), Source::new("uncited", 0.5)],
        );

        let standings = store.load_cited_sources().await.unwrap();
        assert_eq!(standings.len(), 1);
        assert_eq!(standings[0].survived_er, 12.0);
        assert_eq!(standings[0].total_er, 20.0);
    }

    #[tokio::test]
    async fn test_karma_updates_profile_and_global() {
        let store = MemoryStore::new();
        let delta = KarmaDelta::single(KarmaBucket::Builder, 1.5);

        store.apply_karma("ann", &delta).await.unwrap();
        store.apply_karma("ann", &delta).await.unwrap();
        store.apply_karma("bob", &delta).await.unwrap();

        assert_eq!(store.karma("ann").unwrap().builder, 3.0);
        assert_eq!(store.global_karma().builder, 4.5);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = support_store();
        store.fail_loads(true);
        assert!(matches!(
            store.load_nodes().await,
            Err(StoreError::Unavailable(_))
        ));
        store.fail_loads(false);

        store.fail_write(ops::RANKS);
        assert!(store.write_ranks(&[]).await.is_err());
        store.clear_write_failures();
        assert!(store.write_ranks(&[]).await.is_ok());

        store.fail_notifications_for("ann");
        let note = Notification::bounty_paid("ann", "s1", 3, Utc::now());
        assert!(store.send_notification(&note).await.is_err());
        assert_eq!(store.notification_count(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip_keeps_karma_and_inbox() {
        let store = support_store();
        store
            .apply_karma("ann", &KarmaDelta::single(KarmaBucket::Pioneer, 2.0))
            .await
            .unwrap();
        store
            .send_notification(&Notification::bounty_paid("ann", "s1", 2, Utc::now()))
            .await
            .unwrap();

        let restored = MemoryStore::from_snapshot(store.to_snapshot());
        assert_eq!(restored.karma("ann").unwrap().pioneer, 2.0);
        assert_eq!(restored.global_karma().pioneer, 2.0);
        assert_eq!(restored.notifications_for("ann").len(), 1);
        assert_eq!(restored.node("c").unwrap().author_id.as_deref(), Some("bob"));
    }
}
