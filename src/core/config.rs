//! Solver configuration with documented constants
//!
//! Every tolerance and bound the solver relies on lives here. A config is
//! owned by each processor and copied into simulators cloned from it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SolverError};

/// Configuration for the rate solver and changepoint scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Maximum number of steps a simulator takes before stopping
    ///
    /// Acts as a circuit breaker for oscillating solutions, e.g. two
    /// converters that keep enabling and disabling each other.
    pub iteration_limit: usize,

    /// Relative tolerance for empty/full detection and threshold comparison
    ///
    /// Scaled by `max(1, magnitude)` of the quantity it is compared against.
    pub epsilon: f64,

    /// Maximum number of rationing passes per resolve
    ///
    /// Rates only decrease between passes, so resolution converges; this
    /// bounds the slow asymptotic cases.
    pub max_rationing_passes: usize,

    /// Zero-length updates tolerated before the vessel is flagged stuck
    pub max_stalled_updates: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            iteration_limit: 100,
            epsilon: 1e-9,
            max_rationing_passes: 64,
            max_stalled_updates: 3,
        }
    }
}

impl SolverConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_iteration_limit(mut self, limit: usize) -> Self {
        self.iteration_limit = limit;
        self
    }

    /// Parse a config from a TOML string; missing fields take defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SolverConfig =
            toml::from_str(content).map_err(|e| SolverError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SolverError::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if !(self.epsilon.is_finite() && self.epsilon > 0.0 && self.epsilon < 1e-3) {
            return Err(SolverError::InvalidConfig(format!(
                "epsilon ({}) must be in (0, 1e-3)",
                self.epsilon
            )));
        }

        if self.iteration_limit == 0 {
            return Err(SolverError::InvalidConfig(
                "iteration_limit must be at least 1".into(),
            ));
        }

        if self.max_rationing_passes == 0 {
            return Err(SolverError::InvalidConfig(
                "max_rationing_passes must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Absolute tolerance for a quantity of the given magnitude
    pub fn tolerance(&self, magnitude: f64) -> f64 {
        if magnitude.is_finite() {
            self.epsilon * magnitude.abs().max(1.0)
        } else {
            self.epsilon
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SolverConfig::default().validate().is_ok());
        assert_eq!(SolverConfig::default().iteration_limit, 100);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SolverConfig::from_toml_str("iteration_limit = 12\n").unwrap();
        assert_eq!(config.iteration_limit, 12);
        assert_eq!(config.max_rationing_passes, 64);
    }

    #[test]
    fn test_rejects_bad_epsilon() {
        let result = SolverConfig::from_toml_str("epsilon = 0.5\n");
        assert!(matches!(result, Err(SolverError::InvalidConfig(_))));
    }

    #[test]
    fn test_tolerance_scales_with_magnitude() {
        let config = SolverConfig::default();
        assert_eq!(config.tolerance(0.5), 1e-9);
        assert!((config.tolerance(1000.0) - 1e-6).abs() < 1e-15);
        assert_eq!(config.tolerance(f64::INFINITY), 1e-9);
    }
}
