//! Retrieval configuration, persisted as TOML.
//!
//! Every tunable of the query pipeline lives here. Missing sections and
//! fields fall back to their defaults, so a config file only needs the
//! values it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::retrieve::activation::ActivationParams;
use crate::retrieve::propagation::PropagationParams;
use crate::retrieve::ranker::{RankParams, Vocabulary};

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

fn default_embedding_dimension() -> usize {
    384
}

fn default_top_k() -> usize {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Dimension of the hashing embedder.
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,
    /// Results returned when the caller does not ask for a count.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub activation: ActivationParams,
    #[serde(default)]
    pub propagation: PropagationParams,
    #[serde(default)]
    pub ranking: RankParams,
    #[serde(default)]
    pub vocabulary: Vocabulary,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            embedding_dimension: default_embedding_dimension(),
            top_k: default_top_k(),
            activation: ActivationParams::default(),
            propagation: PropagationParams::default(),
            ranking: RankParams::default(),
            vocabulary: Vocabulary::default(),
        }
    }
}

impl RetrievalConfig {
    /// Check value ranges.
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |message: String| Err(ConfigError::Invalid { message });

        if self.embedding_dimension == 0 {
            return invalid("embedding_dimension must be > 0".into());
        }
        if self.top_k == 0 {
            return invalid("top_k must be > 0".into());
        }
        if self.activation.top_r == 0 {
            return invalid("activation.top_r must be > 0".into());
        }
        let d = self.propagation.damping;
        if !(d > 0.0 && d <= 1.0) {
            return invalid(format!("propagation.damping must be in (0, 1], got {d}"));
        }
        let tol = self.propagation.tolerance;
        if !(tol > 0.0) {
            return invalid(format!("propagation.tolerance must be > 0, got {tol}"));
        }
        let beta = self.ranking.beta;
        if !(0.0..=1.0).contains(&beta) {
            return invalid(format!("ranking.beta must be in [0, 1], got {beta}"));
        }
        for (name, w) in [
            ("ranking.gamma", self.ranking.gamma),
            ("ranking.delta", self.ranking.delta),
            ("ranking.topic_weight", self.ranking.topic_weight),
            ("ranking.detail_weight", self.ranking.detail_weight),
        ] {
            if !(w >= 0.0) || !w.is_finite() {
                return invalid(format!("{name} must be a finite value >= 0, got {w}"));
            }
        }
        Ok(())
    }

    /// Load from a TOML file and validate.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded retrieval config");
        Ok(config)
    }

    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: "<memory>".into(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = RetrievalConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.activation.top_r, 100);
        assert_eq!(cfg.propagation.max_iters, 50);
        assert_eq!(cfg.ranking.min_filtered, 3);
        assert!(cfg.vocabulary.detail_terms.iter().any(|t| t == "vancomycin"));
    }

    #[test]
    fn config_roundtrip_toml() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("retrieval.toml");

        let mut cfg = RetrievalConfig::default();
        cfg.ranking.beta = 0.5;
        cfg.activation.rounds = 2;
        cfg.vocabulary.negative_terms = vec!["gout".into()];
        cfg.save(&path).unwrap();

        assert_eq!(RetrievalConfig::load(&path).unwrap(), cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("partial.toml");
        std::fs::write(&path, "top_k = 3\n[ranking]\ngamma = 2.0\n").unwrap();

        let cfg = RetrievalConfig::load(&path).unwrap();
        assert_eq!(cfg.top_k, 3);
        assert_eq!(cfg.ranking.gamma, 2.0);
        assert_eq!(cfg.ranking.beta, 0.30);
        assert_eq!(cfg.embedding_dimension, 384);
        assert_eq!(cfg.vocabulary, Vocabulary::default());
    }

    #[test]
    fn out_of_range_values_are_invalid() {
        let mut cfg = RetrievalConfig::default();
        cfg.ranking.beta = 1.5;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { .. })));

        let mut cfg = RetrievalConfig::default();
        cfg.propagation.damping = 0.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { .. })));

        let mut cfg = RetrievalConfig::default();
        cfg.propagation.tolerance = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = RetrievalConfig::default();
        cfg.activation.top_r = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = RetrievalConfig::default();
        cfg.embedding_dimension = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bad_toml_is_parse_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        std::fs::write(&path, "top_k = \"many\"").unwrap();
        assert!(matches!(
            RetrievalConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        assert!(matches!(
            RetrievalConfig::load(Path::new("/nonexistent/retrieval.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
