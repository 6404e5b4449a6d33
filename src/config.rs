//! Run configuration.
//!
//! Every section derives `serde` with defaults for missing keys, so a TOML file
//! only needs to name what it changes:
//!
//! ```toml
//! seed = 7
//! tick_cap = 1800
//!
//! [population]
//! keep_top = 4
//! stagnation_threshold = 4
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::population::PopulationConfig;
use crate::scenario::{ArenaConfig, ObstacleConfig};

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration for an evolution run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Seed for the shared random generator. `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Fixed simulation step in seconds.
    pub dt: f32,
    /// Ticks after which a round ends even if individuals survive.
    pub tick_cap: Option<u64>,
    /// Directory receiving generation snapshots. `None` disables snapshots.
    pub snapshot_dir: Option<PathBuf>,
    pub population: PopulationConfig,
    pub obstacle: ObstacleConfig,
    pub arena: ArenaConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: None,
            dt: 1.0 / 30.0,
            tick_cap: Some(30 * 60),
            snapshot_dir: None,
            population: PopulationConfig::default(),
            obstacle: ObstacleConfig::default(),
            arena: ArenaConfig::default(),
        }
    }
}

impl RunConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    ///
    /// # Errors
    ///
    /// See [`from_toml`](Self::from_toml); I/O failures are [`ConfigError::Io`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if the config cannot be represented.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.dt > 0.0 && self.dt.is_finite()) {
            return Err(ConfigError::Invalid(format!("dt must be positive, got {}", self.dt)));
        }
        if self.tick_cap == Some(0) {
            return Err(ConfigError::Invalid("tick_cap must be at least 1".into()));
        }
        self.population.validate()?;
        self.obstacle.validate()?;
        self.arena.validate()?;
        Ok(())
    }

    /// Population settings with the run seed applied.
    #[must_use]
    pub fn seeded_population(&self) -> PopulationConfig {
        PopulationConfig {
            seed: self.seed.or(self.population.seed),
            ..self.population.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        RunConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = RunConfig::from_toml(
            r#"
            seed = 7
            tick_cap = 600

            [population]
            keep_top = 3
            stagnation_threshold = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.seed, Some(7));
        assert_eq!(config.tick_cap, Some(600));
        assert_eq!(config.population.keep_top, 3);
        assert_eq!(config.population.stagnation_threshold, 4);
        assert_eq!(
            config.population.refresh_count,
            PopulationConfig::default().refresh_count
        );
        assert_eq!(config.seeded_population().seed, Some(7));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = RunConfig::default();
        config.seed = Some(99);
        config.snapshot_dir = Some(PathBuf::from("snapshots"));
        config.population.grow_sample = 12;

        let text = config.to_toml().unwrap();
        let restored = RunConfig::from_toml(&text).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = RunConfig::from_toml("[population]\nkeep_top = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = RunConfig::from_toml("dt = -1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = RunConfig::from_toml("[population]\nweight_min = 2.0\nweight_max = 1.0\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_unbounded_mutation_ranges_rejected() {
        let err = RunConfig::from_toml("[population]\nweight_min = -3.0e38\nweight_max = 3.0e38\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = RunConfig::from_toml("[population]\ndelta_min = -inf\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let config = RunConfig::from_toml("[population]\nhigh_score_floor = -10.0\n").unwrap();
        assert_eq!(config.population.high_score_floor, -10.0);
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            RunConfig::from_toml("seed = ").unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, "seed = 3\n").unwrap();
        assert_eq!(RunConfig::load(&path).unwrap().seed, Some(3));
    }
}
