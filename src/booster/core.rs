use crate::binning::bin_matrix;
use crate::booster::config::{BoosterConfig, ModelIO};
use crate::data::Matrix;
use crate::errors::CausalError;
use crate::learner::Estimator;
use crate::objective::{Objective, ObjectiveFunction};
use crate::tree::Tree;
use crate::utils::nan_as_null;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Gradient Booster object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBooster {
    pub cfg: BoosterConfig,
    /// NaN until fitted.
    #[serde(with = "nan_as_null")]
    pub base_score: f64,
    pub trees: Vec<Tree>,
}

impl Default for GradientBooster {
    fn default() -> Self {
        GradientBooster {
            cfg: BoosterConfig::default(),
            base_score: f64::NAN,
            trees: Vec::new(),
        }
    }
}

impl ModelIO for GradientBooster {}

impl GradientBooster {
    /// Gradient Booster object
    ///
    /// * `cfg` - Booster configuration, validated here.
    pub fn new(cfg: BoosterConfig) -> Result<Self, CausalError> {
        cfg.validate()?;
        Ok(GradientBooster {
            cfg,
            ..Default::default()
        })
    }

    /// Booster optimizing log loss, predicting the probability of class 1.
    pub fn classifier() -> Self {
        GradientBooster::default().set_objective(Objective::LogLoss)
    }

    /// Booster optimizing squared error.
    pub fn regressor() -> Self {
        GradientBooster::default().set_objective(Objective::SquaredLoss)
    }

    pub fn is_fitted(&self) -> bool {
        !self.base_score.is_nan()
    }

    /// Fit the gradient booster on a provided dataset.
    ///
    /// * `data` - Column-major training features.
    /// * `y` - Target, one value per row.
    /// * `sample_weight` - Instance weights to use when training the model.
    pub fn fit(&mut self, data: &Matrix<f64>, y: &[f64], sample_weight: Option<&[f64]>) -> Result<(), CausalError> {
        self.cfg.validate()?;
        if data.rows == 0 {
            return Err(CausalError::InvalidDataset("cannot fit a booster on zero rows".to_string()));
        }
        if y.len() != data.rows || sample_weight.is_some_and(|w| w.len() != data.rows) {
            return Err(CausalError::InvalidDataset(format!(
                "target and weights must have {} values",
                data.rows
            )));
        }
        if self.cfg.objective == Objective::LogLoss && y.iter().any(|v| !(0.0..=1.0).contains(v)) {
            return Err(CausalError::InvalidParameter(
                "y".to_string(),
                "values in [0, 1] for LogLoss".to_string(),
                "values outside that range".to_string(),
            ));
        }

        let start = Instant::now();
        let objective_fn = &self.cfg.objective;
        let params = self.cfg.tree_params();
        let binned = bin_matrix(data, self.cfg.max_bin)?;
        let mut rng = StdRng::seed_from_u64(self.cfg.seed);

        self.trees = Vec::with_capacity(self.cfg.n_estimators);
        self.base_score = objective_fn.initial_value(y, sample_weight);
        let mut yhat = vec![self.base_score; y.len()];

        for i in 0..self.cfg.n_estimators {
            let (grad, hess) = objective_fn.gradient(y, &yhat, sample_weight);
            let index: Vec<usize> = if self.cfg.subsample < 1.0 {
                (0..data.rows).filter(|_| rng.gen::<f64>() < self.cfg.subsample).collect()
            } else {
                (0..data.rows).collect()
            };
            if index.is_empty() {
                continue;
            }

            let mut tree = Tree::new();
            tree.fit(&binned, index, &grad, &hess, &params);
            let preds = tree.predict(data, true);
            yhat.par_iter_mut().zip(preds.par_iter()).for_each(|(a, b)| *a += b);

            if self.cfg.log_iterations > 0 && i % self.cfg.log_iterations == 0 {
                let loss = objective_fn.loss(y, &yhat, sample_weight);
                info!(
                    "round {:0?}, tree.nodes: {:1?}, tree.leaves: {:2?}, loss: {:3?}",
                    i,
                    tree.nodes.len(),
                    tree.n_leaves(),
                    loss.iter().sum::<f64>() / loss.len() as f64,
                );
            }
            self.trees.push(tree);
        }

        if self.cfg.log_iterations > 0 {
            info!(
                "Finished training a booster with {0} trees in {1} seconds.",
                self.trees.len(),
                start.elapsed().as_secs_f64()
            );
        }
        Ok(())
    }

    /// Raw scores (log-odds for `LogLoss`).
    ///
    /// * `data` - Features to predict on.
    /// * `parallel` - Predict rows in parallel.
    pub fn predict_raw(&self, data: &Matrix<f64>, parallel: bool) -> Vec<f64> {
        let mut init = vec![self.base_score; data.rows];
        for tree in &self.trees {
            let preds = tree.predict(data, parallel);
            init.iter_mut().zip(preds).for_each(|(a, b)| *a += b);
        }
        init
    }

    /// Predictions on the scale of the target (probabilities for `LogLoss`).
    ///
    /// * `data` - Features to predict on.
    /// * `parallel` - Predict rows in parallel.
    pub fn predict(&self, data: &Matrix<f64>, parallel: bool) -> Vec<f64> {
        let objective_fn = &self.cfg.objective;
        self.predict_raw(data, parallel)
            .into_iter()
            .map(|r| objective_fn.transform(r))
            .collect()
    }
}

impl Estimator for GradientBooster {
    fn fit(&mut self, x: &Matrix<f64>, y: &[f64], sample_weight: Option<&[f64]>) -> Result<(), CausalError> {
        GradientBooster::fit(self, x, y, sample_weight)
    }

    fn predict(&self, x: &Matrix<f64>) -> Result<Vec<f64>, CausalError> {
        if !self.is_fitted() {
            return Err(CausalError::NotFitted("predict".to_string()));
        }
        Ok(GradientBooster::predict(self, x, true))
    }

    fn boxed_clone(&self) -> Box<dyn Estimator> {
        Box::new(GradientBooster {
            cfg: self.cfg.clone(),
            ..Default::default()
        })
    }
}
