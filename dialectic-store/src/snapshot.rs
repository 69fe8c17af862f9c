//! JSON snapshot files
//!
//! A snapshot holds everything a [`crate::MemoryStore`] keeps, so a batch can
//! be run offline against an exported graph and its results inspected.

use serde::{Deserialize, Serialize};
use std::path::Path;

use dialectic_core::{Edge, KarmaDelta, KarmaProfile, Node, Notification, Scheme, Source};

use crate::StoreError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<Node>,

    #[serde(default)]
    pub schemes: Vec<Scheme>,

    #[serde(default)]
    pub edges: Vec<Edge>,

    #[serde(default)]
    pub sources: Vec<Source>,

    #[serde(default)]
    pub karma: Vec<KarmaProfile>,

    /// Platform-wide karma counters
    #[serde(default)]
    pub global_karma: KarmaDelta,

    #[serde(default)]
    pub notifications: Vec<Notification>,
}

impl GraphSnapshot {
    pub fn from_json_str(content: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn to_json_string(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), StoreError> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_snapshot_parses() {
        let snapshot = GraphSnapshot::from_json_str(
            r#"{
                "nodes": [{"id": "a", "vote_score": 3}],
                "schemes": [{"id": "s1", "direction": "SUPPORT"}],
                "edges": [{"scheme_id": "s1", "node_id": "a", "role": "premise"}]
            }"#,
        )
        .unwrap();

        assert_eq!(snapshot.nodes.len(), 1);
        assert_eq!(snapshot.nodes[0].base_weight, 1.0);
        assert!(snapshot.sources.is_empty());
        assert!(snapshot.global_karma.is_zero());
    }

    #[test]
    fn test_malformed_snapshot_is_serde_error() {
        let err = GraphSnapshot::from_json_str("{\"nodes\": 4}").unwrap_err();
        assert!(matches!(err, StoreError::Serde(_)));
    }
}
