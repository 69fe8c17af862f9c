//! Epistemic notifications raised by the batch
//!
//! Each constructor fixes the payload shape for its kind so that every
//! stage emits the same fields for the same event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Notification type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    /// The recipient's own node was defeated
    StreamHalted,
    /// A premise the recipient's node depends on was defeated
    UpstreamDefeated,
    BountyStolen,
    BountyLanguished,
    BountyPaid,
}

/// A pending message to one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: String,
    pub kind: NotificationKind,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(user_id: &str, kind: NotificationKind, payload: Value, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind,
            payload,
            created_at: now,
        }
    }

    pub fn stream_halted(
        user_id: &str,
        node_id: &str,
        preview: &str,
        source_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        Self::new(
            user_id,
            NotificationKind::StreamHalted,
            json!({
                "node_id": node_id,
                "preview": preview,
                "source_id": source_id,
            }),
            now,
        )
    }

    pub fn upstream_defeated(
        user_id: &str,
        dependent_id: &str,
        defeated_premise_id: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self::new(
            user_id,
            NotificationKind::UpstreamDefeated,
            json!({
                "node_id": dependent_id,
                "defeated_premise_id": defeated_premise_id,
            }),
            now,
        )
    }

    /// `earned` distinguishes the attacker's copy from the scheme author's
    pub fn bounty_stolen(
        user_id: &str,
        scheme_id: &str,
        amount: f64,
        earned: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let payload = if earned {
            json!({ "scheme_id": scheme_id, "amount_earned": amount })
        } else {
            json!({ "scheme_id": scheme_id, "amount_lost": amount })
        };
        Self::new(user_id, NotificationKind::BountyStolen, payload, now)
    }

    pub fn bounty_languished(
        user_id: &str,
        scheme_id: &str,
        rank_achieved: f64,
        threshold: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self::new(
            user_id,
            NotificationKind::BountyLanguished,
            json!({
                "scheme_id": scheme_id,
                "rank_achieved": rank_achieved,
                "threshold": threshold,
            }),
            now,
        )
    }

    pub fn bounty_paid(user_id: &str, scheme_id: &str, amount: i64, now: DateTime<Utc>) -> Self {
        Self::new(
            user_id,
            NotificationKind::BountyPaid,
            json!({ "scheme_id": scheme_id, "amount": amount }),
            now,
        )
    }
}
