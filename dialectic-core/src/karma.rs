//! Karma buckets and per-user profiles

use serde::{Deserialize, Serialize};

use crate::NodeRole;

/// Which counter a yield lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KarmaBucket {
    /// ROOT-node yield and paid bounties
    Pioneer,
    /// SUPPORT-node yield
    Builder,
    /// ATTACK-node yield and stolen bounties
    Critic,
}

impl From<NodeRole> for KarmaBucket {
    fn from(role: NodeRole) -> Self {
        match role {
            NodeRole::Root => KarmaBucket::Pioneer,
            NodeRole::Support => KarmaBucket::Builder,
            NodeRole::Attack => KarmaBucket::Critic,
        }
    }
}

/// An increment across the three buckets
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KarmaDelta {
    pub pioneer: f64,
    pub builder: f64,
    pub critic: f64,
}

impl KarmaDelta {
    pub fn single(bucket: KarmaBucket, amount: f64) -> Self {
        let mut delta = Self::default();
        delta.credit(bucket, amount);
        delta
    }

    pub fn credit(&mut self, bucket: KarmaBucket, amount: f64) {
        match bucket {
            KarmaBucket::Pioneer => self.pioneer += amount,
            KarmaBucket::Builder => self.builder += amount,
            KarmaBucket::Critic => self.critic += amount,
        }
    }

    pub fn add(&mut self, other: &KarmaDelta) {
        self.pioneer += other.pioneer;
        self.builder += other.builder;
        self.critic += other.critic;
    }

    pub fn total(&self) -> f64 {
        self.pioneer + self.builder + self.critic
    }

    pub fn is_zero(&self) -> bool {
        self.pioneer == 0.0 && self.builder == 0.0 && self.critic == 0.0
    }
}

/// Accumulated reputation of one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KarmaProfile {
    pub user_id: String,
    #[serde(default)]
    pub pioneer: f64,
    #[serde(default)]
    pub builder: f64,
    #[serde(default)]
    pub critic: f64,
}

impl KarmaProfile {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            pioneer: 0.0,
            builder: 0.0,
            critic: 0.0,
        }
    }

    pub fn apply(&mut self, delta: &KarmaDelta) {
        self.pioneer += delta.pioneer;
        self.builder += delta.builder;
        self.critic += delta.critic;
    }
}
