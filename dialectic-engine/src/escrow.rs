//! Escrow Clearinghouse
//!
//! Resolves pending bridge escrows once they mature. Outcomes are checked
//! in order and exactly one applies:
//! - conclusion defeated: stolen, the attacker takes a share as critic karma
//! - conclusion rank below the payout threshold: languished
//! - otherwise: paid, the scheme author takes the bounty as pioneer karma
//!
//! Statuses and karma credits commit in one store call. A failed commit
//! leaves every escrow pending for the next run, and a committed one is
//! never matured again, so nothing is lost or paid twice.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info};

use dialectic_core::{EngineConfig, EscrowOutcome, KarmaBucket, KarmaDelta, Notification};
use dialectic_store::{EscrowResolution, GraphStore, KarmaCredit, MaturedEscrow};

use crate::{BatchContext, BatchStage, StageError, StageOutput, StageSummary};

pub fn decide(escrow: &MaturedEscrow, config: &EngineConfig) -> EscrowOutcome {
    if escrow.conclusion_defeated {
        EscrowOutcome::Stolen
    } else if escrow.conclusion_rank < config.min_payout_rank {
        EscrowOutcome::Languished
    } else {
        EscrowOutcome::Paid
    }
}

/// Everything one matured escrow produces
#[derive(Debug, Clone)]
pub struct Settlement {
    pub resolution: EscrowResolution,
    pub credits: Vec<(String, KarmaDelta)>,
    pub notifications: Vec<Notification>,
}

pub fn settle(escrow: &MaturedEscrow, config: &EngineConfig, now: DateTime<Utc>) -> Settlement {
    let scheme = &escrow.scheme;
    let bounty = scheme.pending_bounty.unwrap_or(0);
    let outcome = decide(escrow, config);

    let mut credits = Vec::new();
    let mut notifications = Vec::new();

    match outcome {
        EscrowOutcome::Stolen => {
            let earned = bounty as f64 * config.stolen_share;
            if let Some(attacker) = scheme.attacking_author_id.as_deref() {
                credits.push((
                    attacker.to_string(),
                    KarmaDelta::single(KarmaBucket::Critic, earned),
                ));
                notifications.push(Notification::bounty_stolen(
                    attacker, &scheme.id, earned, true, now,
                ));
            }
            if let Some(author) = scheme.author_id.as_deref() {
                notifications.push(Notification::bounty_stolen(
                    author,
                    &scheme.id,
                    bounty as f64,
                    false,
                    now,
                ));
            }
        }
        EscrowOutcome::Languished => {
            if let Some(author) = scheme.author_id.as_deref() {
                notifications.push(Notification::bounty_languished(
                    author,
                    &scheme.id,
                    escrow.conclusion_rank,
                    config.min_payout_rank,
                    now,
                ));
            }
        }
        EscrowOutcome::Paid => {
            if let Some(author) = scheme.author_id.as_deref() {
                credits.push((
                    author.to_string(),
                    KarmaDelta::single(KarmaBucket::Pioneer, bounty as f64),
                ));
                notifications.push(Notification::bounty_paid(author, &scheme.id, bounty, now));
            }
        }
    }

    Settlement {
        resolution: EscrowResolution {
            scheme_id: scheme.id.clone(),
            outcome,
        },
        credits,
        notifications,
    }
}

/// Stage 5: matured escrows
pub struct EscrowClearinghouse;

#[async_trait]
impl BatchStage for EscrowClearinghouse {
    fn name(&self) -> &'static str {
        "escrow"
    }

    async fn run(
        &self,
        ctx: &mut BatchContext,
        store: &dyn GraphStore,
    ) -> Result<StageOutput, StageError> {
        let matured = store.load_matured_escrows(ctx.now).await?;
        if matured.is_empty() {
            debug!("No matured escrows");
            return Ok(StageOutput::quiet(StageSummary::Escrow {
                stolen: 0,
                languished: 0,
                paid: 0,
            }));
        }

        let settlements: Vec<Settlement> = matured
            .iter()
            .map(|escrow| settle(escrow, &ctx.config, ctx.now))
            .collect();

        let resolutions: Vec<EscrowResolution> =
            settlements.iter().map(|s| s.resolution.clone()).collect();

        let mut owed: BTreeMap<String, KarmaDelta> = BTreeMap::new();
        for (user, delta) in settlements.iter().flat_map(|s| &s.credits) {
            owed.entry(user.clone()).or_default().add(delta);
        }
        let credits: Vec<KarmaCredit> = owed
            .into_iter()
            .map(|(user_id, delta)| KarmaCredit { user_id, delta })
            .collect();
        store.settle_escrows(&resolutions, &credits).await?;

        let count = |outcome: EscrowOutcome| {
            resolutions.iter().filter(|r| r.outcome == outcome).count()
        };
        let summary = StageSummary::Escrow {
            stolen: count(EscrowOutcome::Stolen),
            languished: count(EscrowOutcome::Languished),
            paid: count(EscrowOutcome::Paid),
        };
        info!("Cleared {} matured escrows: {:?}", resolutions.len(), summary);

        Ok(StageOutput {
            summary,
            notifications: settlements.into_iter().flat_map(|s| s.notifications).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use dialectic_core::{Edge, EscrowStatus, Node, NotificationKind, Scheme};
    use dialectic_store::{ops, MemoryStore};

    fn matured(defeated: bool, rank: f64) -> MaturedEscrow {
        let mut scheme = Scheme::support("bridge")
            .with_author("ann")
            .with_attacker("bob");
        scheme.escrow_status = EscrowStatus::Pending;
        scheme.pending_bounty = Some(6);
        MaturedEscrow {
            scheme,
            conclusion_id: Some("c".to_string()),
            conclusion_defeated: defeated,
            conclusion_rank: rank,
        }
    }

    #[test]
    fn test_defeat_always_means_stolen() {
        let config = EngineConfig::default();
        for rank in [0.0, 4.9, 5.0, 500.0] {
            assert_eq!(decide(&matured(true, rank), &config), EscrowOutcome::Stolen);
        }
    }

    #[test]
    fn test_threshold_splits_languished_and_paid() {
        let config = EngineConfig::default();
        assert_eq!(decide(&matured(false, 4.99), &config), EscrowOutcome::Languished);
        assert_eq!(decide(&matured(false, 5.0), &config), EscrowOutcome::Paid);
    }

    #[test]
    fn test_stolen_splits_bounty() {
        let settlement = settle(&matured(true, 50.0), &EngineConfig::default(), Utc::now());

        assert_eq!(settlement.credits.len(), 1);
        assert_eq!(settlement.credits[0].0, "bob");
        assert_eq!(settlement.credits[0].1.critic, 3.0);

        let kinds: Vec<_> = settlement.notifications.iter().map(|n| n.kind).collect();
        assert_eq!(kinds, vec![NotificationKind::BountyStolen; 2]);
        assert_eq!(settlement.notifications[0].payload["amount_earned"], 3.0);
        assert_eq!(settlement.notifications[1].user_id, "ann");
        assert_eq!(settlement.notifications[1].payload["amount_lost"], 6.0);
    }

    #[test]
    fn test_languished_pays_nothing() {
        let settlement = settle(&matured(false, 2.5), &EngineConfig::default(), Utc::now());
        assert!(settlement.credits.is_empty());
        assert_eq!(settlement.notifications.len(), 1);
        assert_eq!(settlement.notifications[0].kind, NotificationKind::BountyLanguished);
        assert_eq!(settlement.notifications[0].payload["rank_achieved"], 2.5);
        assert_eq!(settlement.notifications[0].payload["threshold"], 5.0);
    }

    #[tokio::test]
    async fn test_stage_resolves_only_matured_pending_escrows() {
        let now = Utc::now();
        let mut due = Scheme::support("due").with_author("ann");
        due.escrow_status = EscrowStatus::Pending;
        due.pending_bounty = Some(4);
        due.expires_at = Some(now - Duration::minutes(5));

        let mut later = Scheme::support("later").with_author("ann");
        later.escrow_status = EscrowStatus::Pending;
        later.pending_bounty = Some(4);
        later.expires_at = Some(now + Duration::hours(5));

        let mut winner = Node::new("c");
        winner.evidence_rank = 12.0;

        let store = MemoryStore::with_graph(
            vec![Node::new("p"), winner],
            vec![due, later],
            vec![
                Edge::premise("due", "p"),
                Edge::conclusion("due", "c"),
                Edge::premise("later", "p"),
                Edge::conclusion("later", "c"),
            ],
        );
        let mut ctx = BatchContext::load(&store, EngineConfig::default(), now)
            .await
            .unwrap();

        let output = EscrowClearinghouse.run(&mut ctx, &store).await.unwrap();

        assert_eq!(store.scheme("due").unwrap().escrow_status, EscrowStatus::Paid);
        assert_eq!(store.scheme("later").unwrap().escrow_status, EscrowStatus::Pending);
        assert_eq!(store.karma("ann").unwrap().pioneer, 4.0);
        assert_eq!(output.notifications.len(), 1);
        assert_eq!(output.notifications[0].kind, NotificationKind::BountyPaid);

        let again = EscrowClearinghouse.run(&mut ctx, &store).await.unwrap();
        assert!(again.notifications.is_empty());
        assert_eq!(store.karma("ann").unwrap().pioneer, 4.0);
    }

    #[tokio::test]
    async fn test_failed_credit_keeps_escrow_for_next_run() {
        let now = Utc::now();
        let mut due = Scheme::support("due").with_author("ann");
        due.escrow_status = EscrowStatus::Pending;
        due.pending_bounty = Some(4);
        due.expires_at = Some(now - Duration::minutes(5));

        let mut winner = Node::new("c");
        winner.evidence_rank = 12.0;

        let store = MemoryStore::with_graph(
            vec![Node::new("p"), winner],
            vec![due],
            vec![Edge::premise("due", "p"), Edge::conclusion("due", "c")],
        );
        let mut ctx = BatchContext::load(&store, EngineConfig::default(), now)
            .await
            .unwrap();

        store.fail_write(ops::KARMA);
        assert!(EscrowClearinghouse.run(&mut ctx, &store).await.is_err());
        assert_eq!(store.scheme("due").unwrap().escrow_status, EscrowStatus::Pending);
        assert!(store.karma("ann").is_none());

        store.clear_write_failures();
        let output = EscrowClearinghouse.run(&mut ctx, &store).await.unwrap();
        assert_eq!(store.scheme("due").unwrap().escrow_status, EscrowStatus::Paid);
        assert_eq!(store.karma("ann").unwrap().pioneer, 4.0);
        assert_eq!(output.notifications.len(), 1);
        assert_eq!(output.notifications[0].kind, NotificationKind::BountyPaid);
    }
}
