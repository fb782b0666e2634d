//! Booster Configuration
//!
//! Defines the configuration of the gradient booster and the JSON IO shared by
//! everything in the crate that can be saved and loaded.
use crate::errors::CausalError;
use crate::objective::Objective;
use crate::tree::TreeParams;
use crate::utils::{validate_float_parameter, validate_positive_float_parameter};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn default_n_estimators() -> usize {
    100
}
fn default_learning_rate() -> f64 {
    0.1
}
fn default_max_depth() -> usize {
    4
}
fn default_max_bin() -> u16 {
    255
}
fn default_lambda() -> f64 {
    1.0
}
fn default_min_child_weight() -> f64 {
    1e-3
}
fn default_min_samples_leaf() -> usize {
    5
}
fn default_subsample() -> f64 {
    1.0
}
fn default_log_iterations() -> usize {
    0
}

/// Configuration for the `GradientBooster`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoosterConfig {
    /// Learning objective.
    pub objective: Objective,
    /// Number of boosting rounds.
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    /// Shrinkage applied to every tree.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Maximum depth of each tree.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Maximum number of bins for discretization.
    #[serde(default = "default_max_bin")]
    pub max_bin: u16,
    /// L2 regularization on leaf weights.
    #[serde(default = "default_lambda")]
    pub lambda: f64,
    /// Minimum gain required to split a node.
    #[serde(default)]
    pub gamma: f64,
    /// Minimum hessian sum in a child node.
    #[serde(default = "default_min_child_weight")]
    pub min_child_weight: f64,
    /// Minimum number of rows in a child node.
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,
    /// Fraction of rows sampled for each tree.
    #[serde(default = "default_subsample")]
    pub subsample: f64,
    /// Seed for random number generation.
    #[serde(default)]
    pub seed: u64,
    /// Logging frequency (every N iterations).
    #[serde(default = "default_log_iterations")]
    pub log_iterations: usize,
}

impl Default for BoosterConfig {
    fn default() -> Self {
        BoosterConfig {
            objective: Objective::SquaredLoss,
            n_estimators: default_n_estimators(),
            learning_rate: default_learning_rate(),
            max_depth: default_max_depth(),
            max_bin: default_max_bin(),
            lambda: default_lambda(),
            gamma: 0.0,
            min_child_weight: default_min_child_weight(),
            min_samples_leaf: default_min_samples_leaf(),
            subsample: default_subsample(),
            seed: 0,
            log_iterations: default_log_iterations(),
        }
    }
}

impl BoosterConfig {
    /// Check parameter ranges before fitting.
    pub fn validate(&self) -> Result<(), CausalError> {
        validate_float_parameter(self.learning_rate, f64::MIN_POSITIVE, 1.0, "learning_rate")?;
        validate_float_parameter(self.subsample, f64::MIN_POSITIVE, 1.0, "subsample")?;
        validate_positive_float_parameter(self.lambda, "lambda")?;
        validate_positive_float_parameter(self.gamma, "gamma")?;
        validate_positive_float_parameter(self.min_child_weight, "min_child_weight")?;
        if self.max_bin < 2 {
            return Err(CausalError::InvalidParameter(
                "max_bin".to_string(),
                "a value of at least 2".to_string(),
                self.max_bin.to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_child_weight: self.min_child_weight,
            min_samples_leaf: self.min_samples_leaf,
            lambda: self.lambda,
            gamma: self.gamma,
            eta: self.learning_rate,
        }
    }
}

/// IO
pub trait ModelIO: Serialize + DeserializeOwned + Sized {
    /// Save as a json object to a file.
    ///
    /// * `path` - Path to save to.
    fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CausalError> {
        fs::write(path, self.json_dump()?).map_err(|e| CausalError::UnableToWrite(e.to_string()))
    }

    /// Dump as a json object
    fn json_dump(&self) -> Result<String, CausalError> {
        serde_json::to_string(self).map_err(|e| CausalError::UnableToWrite(e.to_string()))
    }

    /// Load from Json string
    ///
    /// * `json_str` - String object, which can be serialized to json.
    fn from_json(json_str: &str) -> Result<Self, CausalError> {
        serde_json::from_str::<Self>(json_str).map_err(|e| CausalError::UnableToRead(e.to_string()))
    }

    /// Load from a path to a json object.
    ///
    /// * `path` - Path to load from.
    fn load<P: AsRef<Path>>(path: P) -> Result<Self, CausalError> {
        let json_str = fs::read_to_string(path).map_err(|e| CausalError::UnableToRead(e.to_string()))?;
        Self::from_json(&json_str)
    }
}

impl ModelIO for BoosterConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_booster_config_default() {
        let config = BoosterConfig::default();
        assert_eq!(config.n_estimators, 100);
        assert_eq!(config.max_bin, 255);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_booster_config_io_json() {
        let config = BoosterConfig {
            objective: Objective::LogLoss,
            ..Default::default()
        };
        let json = config.json_dump().unwrap();
        let config2 = BoosterConfig::from_json(&json).unwrap();
        assert_eq!(config, config2);
    }

    #[test]
    fn test_booster_config_io_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("booster.json");
        let config = BoosterConfig::default();
        config.save(&file_path).unwrap();
        let config2 = BoosterConfig::load(&file_path).unwrap();
        assert_eq!(config, config2);
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let json = r#"{"objective": "LogLoss", "max_depth": 2}"#;
        let config = BoosterConfig::from_json(json).unwrap();
        assert_eq!(config.max_depth, 2);
        assert_eq!(config.n_estimators, 100);
        assert_eq!(config.objective, Objective::LogLoss);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = BoosterConfig {
            subsample: 0.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CausalError::InvalidParameter(..))));
        let config = BoosterConfig {
            max_bin: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
