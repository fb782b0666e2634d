//! Causal Configuration
//!
//! Settings of the causal model and of the bias minimization step. Every field has a
//! default, so a JSON document only needs the fields it changes.
use crate::booster::config::ModelIO;
use crate::causal::metalearners::MetalearnerKind;
use crate::constants::{
    EFFECT_COL, MATCHING_SEED, NA_CAT_VALUE, NA_CONT_VALUE, OUTCOME_COL, PROPENSITY_N_FOLD, PROPENSITY_SEED, SEED,
    TEXT_COL, TREATMENT_COL,
};
use crate::errors::CausalError;
use crate::utils::items_to_strings;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

fn default_treatment_col() -> String {
    TREATMENT_COL.to_string()
}
fn default_outcome_col() -> String {
    OUTCOME_COL.to_string()
}
fn default_text_col() -> String {
    TEXT_COL.to_string()
}
fn default_effect_col() -> String {
    EFFECT_COL.to_string()
}
fn default_na_cont_value() -> f64 {
    NA_CONT_VALUE
}
fn default_na_cat_value() -> String {
    NA_CAT_VALUE.to_string()
}
fn default_seed() -> u64 {
    SEED
}
fn default_n_fold() -> usize {
    PROPENSITY_N_FOLD
}
fn default_propensity_seed() -> u64 {
    PROPENSITY_SEED
}
fn default_matching_seed() -> u64 {
    MATCHING_SEED
}

/// What bias minimization does when matching finds no valid pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchFailurePolicy {
    /// Return `CausalError::MatchingFailed`.
    Propagate,
    /// Keep every row and mark the sample as unmatched.
    #[default]
    KeepUnmatched,
}

impl FromStr for MatchFailurePolicy {
    type Err = CausalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Propagate" => Ok(MatchFailurePolicy::Propagate),
            "KeepUnmatched" => Ok(MatchFailurePolicy::KeepUnmatched),
            _ => Err(CausalError::ParseString(
                s.to_string(),
                "MatchFailurePolicy".to_string(),
                items_to_strings(vec!["Propagate", "KeepUnmatched"]),
            )),
        }
    }
}

/// Settings of the propensity model and the matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasConfig {
    /// Cross-validation folds of the propensity model.
    #[serde(default = "default_n_fold")]
    pub n_fold: usize,
    #[serde(default = "default_propensity_seed")]
    pub propensity_seed: u64,
    #[serde(default = "default_matching_seed")]
    pub matching_seed: u64,
    #[serde(default)]
    pub on_failure: MatchFailurePolicy,
}

impl Default for BiasConfig {
    fn default() -> Self {
        BiasConfig {
            n_fold: default_n_fold(),
            propensity_seed: default_propensity_seed(),
            matching_seed: default_matching_seed(),
            on_failure: MatchFailurePolicy::default(),
        }
    }
}

/// Configuration of a `CausalModel`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalConfig {
    /// Column holding the treatment indicator.
    #[serde(default = "default_treatment_col")]
    pub treatment_col: String,
    /// Column holding the outcome.
    #[serde(default = "default_outcome_col")]
    pub outcome_col: String,
    /// Free-text column, carried along but never used as a feature.
    #[serde(default = "default_text_col")]
    pub text_col: String,
    /// Columns left out of the features.
    #[serde(default)]
    pub ignore_cols: Vec<String>,
    /// Column the per-row effects are written to.
    #[serde(default = "default_effect_col")]
    pub effect_col: String,
    /// Log preprocessing decisions, timings and balance tables at `info` level. Off by
    /// default; the matching fallback warning is logged either way.
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub metalearner: MetalearnerKind,
    /// Fill value of missing numeric features.
    #[serde(default = "default_na_cont_value")]
    pub na_cont_value: f64,
    /// Fill value of missing categorical features.
    #[serde(default = "default_na_cat_value")]
    pub na_cat_value: String,
    /// Seed of the default learners.
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub bias: BiasConfig,
}

impl Default for CausalConfig {
    fn default() -> Self {
        CausalConfig {
            treatment_col: default_treatment_col(),
            outcome_col: default_outcome_col(),
            text_col: default_text_col(),
            ignore_cols: Vec::new(),
            effect_col: default_effect_col(),
            verbose: false,
            metalearner: MetalearnerKind::default(),
            na_cont_value: default_na_cont_value(),
            na_cat_value: default_na_cat_value(),
            seed: default_seed(),
            bias: BiasConfig::default(),
        }
    }
}

impl ModelIO for CausalConfig {}

impl CausalConfig {
    pub fn set_treatment_col(mut self, treatment_col: &str) -> Self {
        self.treatment_col = treatment_col.to_string();
        self
    }

    pub fn set_outcome_col(mut self, outcome_col: &str) -> Self {
        self.outcome_col = outcome_col.to_string();
        self
    }

    pub fn set_text_col(mut self, text_col: &str) -> Self {
        self.text_col = text_col.to_string();
        self
    }

    /// Set the columns left out of the features.
    pub fn set_ignore_cols(mut self, ignore_cols: &[&str]) -> Self {
        self.ignore_cols = ignore_cols.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn set_effect_col(mut self, effect_col: &str) -> Self {
        self.effect_col = effect_col.to_string();
        self
    }

    pub fn set_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn set_metalearner(mut self, metalearner: MetalearnerKind) -> Self {
        self.metalearner = metalearner;
        self
    }

    /// Set the fill values of missing numeric and categorical features.
    pub fn set_missing_values(mut self, na_cont_value: f64, na_cat_value: &str) -> Self {
        self.na_cont_value = na_cont_value;
        self.na_cat_value = na_cat_value.to_string();
        self
    }

    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn set_bias(mut self, bias: BiasConfig) -> Self {
        self.bias = bias;
        self
    }

    pub fn set_match_failure_policy(mut self, on_failure: MatchFailurePolicy) -> Self {
        self.bias.on_failure = on_failure;
        self
    }

    /// Columns never encoded as features.
    pub(crate) fn excluded_cols(&self) -> Vec<String> {
        let mut cols = vec![
            self.treatment_col.clone(),
            self.outcome_col.clone(),
            self.text_col.clone(),
            self.effect_col.clone(),
        ];
        cols.extend(self.ignore_cols.iter().cloned());
        cols
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let cfg = CausalConfig::default();
        assert_eq!(cfg.treatment_col, "treatment");
        assert_eq!(cfg.outcome_col, "outcome");
        assert_eq!(cfg.text_col, "text");
        assert_eq!(cfg.effect_col, "treatment_effect");
        assert!(cfg.ignore_cols.is_empty());
        assert!(!cfg.verbose);
        assert_eq!(cfg.metalearner, MetalearnerKind::TLearner);
        assert_eq!(cfg.na_cont_value, -1.0);
        assert_eq!(cfg.na_cat_value, "MISSING");
        assert_eq!(cfg.bias.n_fold, 3);
        assert_eq!(cfg.bias.propensity_seed, 42);
        assert_eq!(cfg.bias.matching_seed, 423);
        assert_eq!(cfg.bias.on_failure, MatchFailurePolicy::KeepUnmatched);
    }

    #[test]
    fn test_partial_json() {
        let json = r#"{"treatment_col": "group", "ignore_cols": ["id"], "bias": {"on_failure": "Propagate"}}"#;
        let cfg = CausalConfig::from_json(json).unwrap();
        assert_eq!(cfg.treatment_col, "group");
        assert_eq!(cfg.outcome_col, "outcome");
        assert_eq!(cfg.ignore_cols, vec!["id".to_string()]);
        assert_eq!(cfg.bias.on_failure, MatchFailurePolicy::Propagate);
        assert_eq!(cfg.bias.matching_seed, 423);
    }

    #[test]
    fn test_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("causal.json");
        let cfg = CausalConfig::default()
            .set_verbose(true)
            .set_metalearner(MetalearnerKind::XLearner)
            .set_ignore_cols(&["id"]);
        cfg.save(&path).unwrap();
        assert_eq!(CausalConfig::load(&path).unwrap(), cfg);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let res = CausalConfig::load(dir.path().join("nope.json"));
        assert!(matches!(res, Err(CausalError::UnableToRead(_))));
    }

    #[test]
    fn test_excluded_cols() {
        let cfg = CausalConfig::default().set_ignore_cols(&["id"]);
        let excluded = cfg.excluded_cols();
        assert!(excluded.contains(&"text".to_string()));
        assert!(excluded.contains(&"id".to_string()));
        assert_eq!(excluded.len(), 5);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("Propagate".parse::<MatchFailurePolicy>().unwrap(), MatchFailurePolicy::Propagate);
        assert!("Ignore".parse::<MatchFailurePolicy>().is_err());
    }
}
