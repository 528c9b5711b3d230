//! Evaluator configuration.

use thiserror::Error;

/// Round limit used by [`EvalConfig::default`].
pub const DEFAULT_MAX_ROUNDS: usize = 10_000;

/// How rules are re-evaluated after the first round of a stratum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Strategy {
    /// Join at least one body atom against the previous round's delta
    #[default]
    SemiNaive,
    /// Rejoin every rule against the full relations each round
    Naive,
}

/// Settings for [`Evaluator`](crate::eval::Evaluator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EvalConfig {
    /// Evaluation strategy for recursive strata
    pub strategy: Strategy,
    /// Maximum productive rounds per stratum, not counting the final round
    /// that finds nothing; `None` means no limit
    pub max_rounds: Option<usize>,
    /// Record the stratum and round that first derived each tuple
    pub track_provenance: bool,
    /// Measure cumulative join time per rule
    pub collect_timings: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            max_rounds: Some(DEFAULT_MAX_ROUNDS),
            track_provenance: false,
            collect_timings: false,
        }
    }
}

impl EvalConfig {
    /// Set the evaluation strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the round limit per stratum.
    #[must_use]
    pub fn with_max_rounds(mut self, max_rounds: Option<usize>) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Turn provenance tracking on or off.
    #[must_use]
    pub fn with_provenance(mut self, enabled: bool) -> Self {
        self.track_provenance = enabled;
        self
    }

    /// Turn per-rule timings on or off.
    #[must_use]
    pub fn with_timings(mut self, enabled: bool) -> Self {
        self.collect_timings = enabled;
        self
    }

    /// Check the settings for values that can never work.
    ///
    /// # Errors
    ///
    /// A round limit of zero is rejected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rounds == Some(0) {
            return Err(ConfigError::ZeroRoundLimit);
        }
        Ok(())
    }

    /// Read a configuration from JSON; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON or invalid settings.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

/// Invalid evaluator configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `max_rounds` was `Some(0)`.
    #[error("max_rounds must be at least 1")]
    ZeroRoundLimit,
    /// The JSON text could not be read.
    #[cfg(feature = "serde")]
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}
