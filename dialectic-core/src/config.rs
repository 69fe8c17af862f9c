//! Engine configuration
//!
//! Every numeric constant of the reconciliation job lives here so that a
//! TOML file can tune a deployment without a rebuild. Missing keys fall
//! back to the crate-level defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::{
    BOUNTY_FACTOR, CONVERGENCE_TOLERANCE, DEFEAT_MARGIN, EMISSION_CONSTANT,
    ESCROW_WINDOW_HOURS, MAX_INNER_ITERATIONS, MAX_OUTER_ROUNDS, MIN_PAYOUT_RANK,
    REPUTATION_RETENTION, STOLEN_SHARE, SURVIVAL_EPSILON, WEIGHT_TOLERANCE,
};

/// Errors from loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Tunables for all six stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub defeat_margin: f64,
    pub convergence_tolerance: f64,
    pub max_inner_iterations: usize,
    pub max_outer_rounds: usize,
    pub bounty_factor: f64,
    pub escrow_window_hours: i64,
    pub emission_constant: f64,
    pub min_payout_rank: f64,
    pub stolen_share: f64,
    pub reputation_retention: f64,
    pub survival_epsilon: f64,
    pub weight_tolerance: f64,
    /// Characters of node content carried in STREAM_HALTED
    pub preview_chars: usize,
    /// Notification sends in flight at once
    pub notification_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            defeat_margin: DEFEAT_MARGIN,
            convergence_tolerance: CONVERGENCE_TOLERANCE,
            max_inner_iterations: MAX_INNER_ITERATIONS,
            max_outer_rounds: MAX_OUTER_ROUNDS,
            bounty_factor: BOUNTY_FACTOR,
            escrow_window_hours: ESCROW_WINDOW_HOURS,
            emission_constant: EMISSION_CONSTANT,
            min_payout_rank: MIN_PAYOUT_RANK,
            stolen_share: STOLEN_SHARE,
            reputation_retention: REPUTATION_RETENTION,
            survival_epsilon: SURVIVAL_EPSILON,
            weight_tolerance: WEIGHT_TOLERANCE,
            preview_chars: 100,
            notification_concurrency: 8,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn with_defeat_margin(mut self, margin: f64) -> Self {
        self.defeat_margin = margin;
        self
    }

    pub fn with_iteration_limits(mut self, inner: usize, outer: usize) -> Self {
        self.max_inner_iterations = inner;
        self.max_outer_rounds = outer;
        self
    }

    pub fn with_notification_concurrency(mut self, concurrency: usize) -> Self {
        self.notification_concurrency = concurrency;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: &str) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            }
        }

        if self.defeat_margin < 0.0 {
            return Err(invalid("defeat_margin", "must be non-negative"));
        }
        if self.convergence_tolerance <= 0.0 {
            return Err(invalid("convergence_tolerance", "must be positive"));
        }
        if self.max_inner_iterations == 0 {
            return Err(invalid("max_inner_iterations", "must be at least 1"));
        }
        if self.max_outer_rounds == 0 {
            return Err(invalid("max_outer_rounds", "must be at least 1"));
        }
        if self.escrow_window_hours < 0 {
            return Err(invalid("escrow_window_hours", "must be non-negative"));
        }
        if !(0.0..=1.0).contains(&self.stolen_share) {
            return Err(invalid("stolen_share", "must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.reputation_retention) {
            return Err(invalid("reputation_retention", "must be within [0, 1]"));
        }
        if self.survival_epsilon <= 0.0 {
            return Err(invalid("survival_epsilon", "must be positive"));
        }
        if self.notification_concurrency == 0 {
            return Err(invalid("notification_concurrency", "must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.defeat_margin, 1.0);
        assert_eq!(config.max_inner_iterations, 20);
        assert_eq!(config.max_outer_rounds, 3);
        assert_eq!(config.escrow_window_hours, 72);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str("min_payout_rank = 7.5\n").unwrap();
        assert_eq!(config.min_payout_rank, 7.5);
        assert_eq!(config.emission_constant, 0.01);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = EngineConfig::from_toml_str("stolen_share = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "stolen_share", .. }));

        let err = EngineConfig::from_toml_str("max_outer_rounds = \"three\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = EngineConfig::default().with_defeat_margin(2.0);
        let rendered = config.to_toml_string().unwrap();
        assert_eq!(EngineConfig::from_toml_str(&rendered).unwrap(), config);
    }
}
