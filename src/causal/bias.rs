//! Bias minimization
//!
//! Propensity-score matching of treated and control rows. The matched subsample is an
//! independent copy of the features, treatment and outcome, with covariate balance
//! reported before and after matching.
use crate::causal::balance::BalanceTable;
use crate::causal::config::{BiasConfig, MatchFailurePolicy};
use crate::causal::matching::NearestNeighborMatch;
use crate::causal::propensity::{ElasticNetPropensityModel, PropensityModel};
use crate::data::FeatureMatrix;
use crate::dataset::{Column, Dataset};
use crate::errors::CausalError;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Name of the propensity column of a matched sample table.
pub const PROPENSITY_COL: &str = "ps";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatchStatus {
    Matched { n_treated: usize, n_control: usize },
    /// Matching failed and every row was kept.
    Unmatched { reason: String },
}

/// Rows kept by bias minimization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedSample {
    pub features: FeatureMatrix,
    pub treatment: Vec<f64>,
    pub outcome: Vec<f64>,
    pub propensity: Vec<f64>,
    /// Source row of each kept row.
    pub rows: Vec<usize>,
    pub status: MatchStatus,
    pub balance_before: BalanceTable,
    pub balance_after: BalanceTable,
}

impl MatchedSample {
    pub fn is_matched(&self) -> bool {
        matches!(self.status, MatchStatus::Matched { .. })
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// The sample as a table: features, then treatment, outcome and propensity.
    pub fn to_dataset(&self, treatment_col: &str, outcome_col: &str) -> Result<Dataset, CausalError> {
        let mut columns: Vec<Column> = self
            .features
            .names()
            .iter()
            .filter_map(|name| {
                self.features
                    .column(name)
                    .map(|v| Column::new(name.as_str(), v.to_vec()))
            })
            .collect();
        columns.push(Column::new(treatment_col, self.treatment.clone()));
        columns.push(Column::new(outcome_col, self.outcome.clone()));
        columns.push(Column::new(PROPENSITY_COL, self.propensity.clone()));
        Dataset::new(columns)
    }
}

pub struct BiasMinimizer {
    pub config: BiasConfig,
    pub verbose: bool,
}

impl BiasMinimizer {
    pub fn new(config: BiasConfig, verbose: bool) -> Self {
        BiasMinimizer { config, verbose }
    }

    /// Match with an elastic-net propensity model seeded from the configuration.
    ///
    /// * `features` - Encoded covariates.
    /// * `treatment` - 0/1 treatment of each row.
    /// * `outcome` - Outcome of each row.
    /// * `caliper` - Maximum propensity distance in standard deviations, `None` for no limit.
    pub fn minimize(
        &self,
        features: &FeatureMatrix,
        treatment: &[f64],
        outcome: &[f64],
        caliper: Option<f64>,
    ) -> Result<MatchedSample, CausalError> {
        let mut model = ElasticNetPropensityModel::new(self.config.n_fold, self.config.propensity_seed);
        self.minimize_with(&mut model, features, treatment, outcome, caliper)
    }

    /// Match with a caller-supplied propensity model.
    pub fn minimize_with(
        &self,
        model: &mut dyn PropensityModel,
        features: &FeatureMatrix,
        treatment: &[f64],
        outcome: &[f64],
        caliper: Option<f64>,
    ) -> Result<MatchedSample, CausalError> {
        let n = features.rows();
        if treatment.len() != n || outcome.len() != n {
            return Err(CausalError::InvalidDataset(format!(
                "features have {} rows but treatment has {} and outcome has {}",
                n,
                treatment.len(),
                outcome.len()
            )));
        }
        let start = Instant::now();
        if self.verbose {
            info!("Starting bias minimization on {} rows.", n);
        }

        let propensity = model.fit_predict(&features.as_matrix(), treatment)?;
        let matcher = NearestNeighborMatch::new(false, 1, caliper, self.config.matching_seed);
        let balance_before = BalanceTable::new(features, treatment)?;

        let (rows, status) = match matcher.match_rows(&propensity, treatment) {
            Ok(matched) => {
                let status = MatchStatus::Matched {
                    n_treated: matched.treated.len(),
                    n_control: matched.control.len(),
                };
                (matched.rows(), status)
            }
            Err(CausalError::MatchingFailed(reason)) => match self.config.on_failure {
                MatchFailurePolicy::Propagate => return Err(CausalError::MatchingFailed(reason)),
                MatchFailurePolicy::KeepUnmatched => {
                    warn!("Matching failed ({}), keeping all {} rows unmatched.", reason, n);
                    ((0..n).collect(), MatchStatus::Unmatched { reason })
                }
            },
            Err(e) => return Err(e),
        };

        let matched_features = features.select_rows(&rows);
        let matched_treatment: Vec<f64> = rows.iter().map(|&i| treatment[i]).collect();
        let balance_after = BalanceTable::new(&matched_features, &matched_treatment)?;

        if self.verbose {
            info!("Balance before matching:\n{}", balance_before);
            info!("Balance after matching:\n{}", balance_after);
            info!(
                "Finished bias minimization, kept {} of {} rows in {} seconds.",
                rows.len(),
                n,
                start.elapsed().as_secs_f64()
            );
        }

        Ok(MatchedSample {
            features: matched_features,
            treatment: matched_treatment,
            outcome: rows.iter().map(|&i| outcome[i]).collect(),
            propensity: rows.iter().map(|&i| propensity[i]).collect(),
            rows,
            status,
            balance_before,
            balance_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Treatment is more likely for large x, so the raw groups are imbalanced on x.
    fn confounded(n: usize) -> (FeatureMatrix, Vec<f64>, Vec<f64>) {
        let x: Vec<f64> = (0..n).map(|i| (i % 50) as f64 / 10.0).collect();
        let w: Vec<f64> = (0..n)
            .map(|i| {
                let xi = (i % 50) as f64 / 10.0;
                if (xi > 2.5 && i % 4 != 0) || (xi <= 2.5 && i % 4 == 0) {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        let y: Vec<f64> = x.iter().zip(&w).map(|(a, b)| a + b).collect();
        let features = FeatureMatrix::from_columns(vec![("x".to_string(), x)], n).unwrap();
        (features, w, y)
    }

    #[test]
    fn test_matching_shrinks_and_balances() {
        let (features, w, y) = confounded(200);
        let bm = BiasMinimizer::new(BiasConfig::default(), false);
        let sample = bm.minimize(&features, &w, &y, Some(0.2)).unwrap();
        assert!(sample.is_matched());
        assert!(sample.n_rows() <= 200);
        assert_eq!(sample.features.rows(), sample.n_rows());
        assert_eq!(sample.treatment.len(), sample.outcome.len());
        let n1 = sample.treatment.iter().filter(|v| **v == 1.0).count();
        assert_eq!(n1 * 2, sample.n_rows());
        assert!(sample.balance_after.max_abs_smd() < sample.balance_before.max_abs_smd());
    }

    #[test]
    fn test_rows_point_back_to_source() {
        let (features, w, y) = confounded(100);
        let bm = BiasMinimizer::new(BiasConfig::default(), false);
        let sample = bm.minimize(&features, &w, &y, None).unwrap();
        for (k, &i) in sample.rows.iter().enumerate() {
            assert_eq!(sample.outcome[k], y[i]);
            assert_eq!(sample.treatment[k], w[i]);
        }
    }

    #[test]
    fn test_failure_policies() {
        let (features, _, y) = confounded(100);
        let cfg = BiasConfig {
            on_failure: MatchFailurePolicy::Propagate,
            ..Default::default()
        };
        let strict = BiasMinimizer::new(cfg, false);
        let single = vec![1.0; 100];
        let res = strict.minimize_with(&mut FixedScore(0.5), &features, &single, &y, None);
        assert!(matches!(res, Err(CausalError::MatchingFailed(_))));

        let lenient = BiasMinimizer::new(BiasConfig::default(), false);
        let sample = lenient
            .minimize_with(&mut FixedScore(0.5), &features, &single, &y, None)
            .unwrap();
        assert!(!sample.is_matched());
        assert_eq!(sample.n_rows(), 100);
    }

    #[test]
    fn test_to_dataset() {
        let (features, w, y) = confounded(60);
        let bm = BiasMinimizer::new(BiasConfig::default(), false);
        let sample = bm.minimize(&features, &w, &y, None).unwrap();
        let ds = sample.to_dataset("treatment", "outcome").unwrap();
        assert_eq!(ds.column_names(), vec!["x", "treatment", "outcome", "ps"]);
        assert_eq!(ds.n_rows(), sample.n_rows());
    }

    #[test]
    fn test_sample_json_round_trip() {
        let (features, w, y) = confounded(80);
        let x = features.column("x").unwrap().to_vec();
        let with_constant =
            FeatureMatrix::from_columns(vec![("x".to_string(), x), ("flag".to_string(), vec![1.0; 80])], 80).unwrap();
        let bm = BiasMinimizer::new(BiasConfig::default(), false);
        let sample = bm.minimize(&with_constant, &w, &y, Some(0.2)).unwrap();
        assert!(sample.balance_before.features[1].smd.is_nan());

        let json = serde_json::to_string(&sample).unwrap();
        let loaded: MatchedSample = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.rows, sample.rows);
        assert_eq!(loaded.features, sample.features);
        assert_eq!(loaded.propensity, sample.propensity);
        assert_eq!(loaded.status, sample.status);
        assert!(loaded.balance_before.features[1].smd.is_nan());
        assert_eq!(loaded.balance_after.features[0], sample.balance_after.features[0]);
    }

    struct FixedScore(f64);

    impl PropensityModel for FixedScore {
        fn fit(&mut self, _x: &crate::data::Matrix<f64>, _w: &[f64]) -> Result<(), CausalError> {
            Ok(())
        }
        fn predict(&self, x: &crate::data::Matrix<f64>) -> Result<Vec<f64>, CausalError> {
            Ok(vec![self.0; x.rows])
        }
    }
}
