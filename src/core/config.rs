//! Run configuration
//!
//! Everything here can come from a JSON file, from CLI flags, or both (flags
//! win). Missing JSON fields fall back to the defaults below.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::error::{Error, Result};

/// Which contraction strategy drives each round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Majority-direction hooking followed by pointer jumping
    #[default]
    Deterministic,
    /// Quota-based edge sampling with a sequential union-find prefix
    Sampling,
    /// Coin-toss hooking: tails roots hook onto a heads neighbour
    RandomMate,
}

impl Strategy {
    pub fn name(self) -> &'static str {
        match self {
            Strategy::Deterministic => "deterministic",
            Strategy::Sampling => "sampling",
            Strategy::RandomMate => "random-mate",
        }
    }
}

/// Sparsification parameters for the sampling strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    /// Sample size exponent: a round samples about `N^(1 + epsilon/2)` edges
    pub epsilon: f64,
    /// Oversampling slack, also drives the sparsity threshold
    pub delta: f64,
    /// Confidence term inside the sparsity threshold logarithm
    pub confidence: f64,
    /// Stop a round's prefix contraction once this many components remain
    pub target_size: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            epsilon: 0.09,
            delta: 0.2,
            confidence: 0.9,
            target_size: 1,
        }
    }
}

impl SamplingParams {
    /// Workers holding at most this many edges hand over their whole shard
    ///
    /// `floor(3 / delta^2 * ln(workers / confidence))`, clamped at zero.
    pub fn sparsity_threshold(&self, workers: usize) -> u64 {
        let value = 3.0 / (self.delta * self.delta) * (workers as f64 / self.confidence).ln();
        if value.is_finite() && value > 0.0 {
            value.floor() as u64
        } else {
            0
        }
    }

    /// `min(ceil(initial_vertices^(1 + epsilon/2) * (1 + delta)), available)`
    pub fn edges_to_sample(&self, initial_vertices: u32, available: u64) -> u64 {
        let wanted = (initial_vertices as f64).powf(1.0 + self.epsilon / 2.0) * (1.0 + self.delta);
        let wanted = if wanted.is_finite() {
            wanted.ceil() as u64
        } else {
            u64::MAX
        };
        wanted.min(available)
    }
}

/// Complete configuration for one connected-components run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CcConfig {
    /// Number of ranks taking part in every collective
    pub workers: usize,
    pub strategy: Strategy,
    /// Base seed; each rank derives its own generator from it
    pub seed: u64,
    pub sampling: SamplingParams,
}

impl Default for CcConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            strategy: Strategy::Deterministic,
            seed: 0x5EED,
            sampling: SamplingParams::default(),
        }
    }
}

impl CcConfig {
    /// Load a config from a JSON file and validate it
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: CcConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be at least 1".to_string()));
        }
        if !(self.sampling.epsilon > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "epsilon must be positive, got {}",
                self.sampling.epsilon
            )));
        }
        if !(self.sampling.delta > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "delta must be positive, got {}",
                self.sampling.delta
            )));
        }
        if !(self.sampling.confidence > 0.0 && self.sampling.confidence < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "confidence must lie in (0, 1), got {}",
                self.sampling.confidence
            )));
        }
        Ok(())
    }

    /// Seed for the generator owned by `rank`
    pub fn rank_seed(&self, rank: usize) -> u64 {
        self.seed ^ (rank as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_constants() {
        let config = CcConfig::default();
        assert_eq!(config.workers, 1);
        assert_eq!(config.strategy, Strategy::Deterministic);
        assert_eq!(config.sampling.epsilon, 0.09);
        assert_eq!(config.sampling.delta, 0.2);
        assert_eq!(config.sampling.target_size, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sparsity_threshold() {
        let params = SamplingParams::default();
        // 3 / 0.04 * ln(4 / 0.9) = 75 * 1.4917 = 111.88
        assert_eq!(params.sparsity_threshold(4), 111);
        // 75 * ln(1.111) = 7.9
        assert_eq!(params.sparsity_threshold(1), 7);
    }

    #[test]
    fn test_sparsity_threshold_rounds_small_values_down() {
        let params = SamplingParams {
            confidence: 0.999,
            ..Default::default()
        };
        // 75 * ln(1 / 0.999) = 0.075
        assert_eq!(params.sparsity_threshold(1), 0);
    }

    #[test]
    fn test_sparsity_threshold_clamps_at_zero() {
        let params = SamplingParams {
            confidence: 2.0,
            ..Default::default()
        };
        // 75 * ln(1 / 2) is negative
        assert_eq!(params.sparsity_threshold(1), 0);
        // ln(0) is not finite
        assert_eq!(SamplingParams::default().sparsity_threshold(0), 0);
    }

    #[test]
    fn test_edges_to_sample_is_capped_by_availability() {
        let params = SamplingParams::default();
        assert_eq!(params.edges_to_sample(1000, 50), 50);
        // 1000^1.045 * 1.2 = 1637.4
        let wanted = params.edges_to_sample(1000, u64::MAX);
        assert!((1630..=1645).contains(&wanted), "got {wanted}");
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = CcConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_bad_confidence() {
        let mut config = CcConfig::default();
        config.sampling.confidence = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rank_seeds_differ() {
        let config = CcConfig::default();
        assert_eq!(config.rank_seed(0), config.seed);
        assert_ne!(config.rank_seed(1), config.rank_seed(2));
    }

    #[test]
    fn test_from_json_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"workers": 3, "strategy": "sampling", "sampling": {{"delta": 0.25}}}}"#
        )
        .unwrap();

        let config = CcConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.strategy, Strategy::Sampling);
        assert_eq!(config.sampling.delta, 0.25);
        assert_eq!(config.sampling.epsilon, 0.09);
        assert_eq!(config.seed, 0x5EED);
    }

    #[test]
    fn test_strategy_names_match_serde() {
        for strategy in [Strategy::Deterministic, Strategy::Sampling, Strategy::RandomMate] {
            let json = serde_json::to_string(&strategy).unwrap();
            assert_eq!(json, format!("\"{}\"", strategy.name()));
        }
        let parsed: Strategy = serde_json::from_str("\"random-mate\"").unwrap();
        assert_eq!(parsed, Strategy::RandomMate);
    }

    #[test]
    fn test_from_json_file_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            CcConfig::from_json_file(file.path()),
            Err(Error::Json(_))
        ));
    }
}
