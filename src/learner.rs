//! Learner
//!
//! The interface every base learner of the metalearners satisfies, and the
//! task-dependent default learner.
use crate::booster::GradientBooster;
use crate::data::Matrix;
use crate::errors::CausalError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Learning task decided by the outcome column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Task {
    /// Binary outcome.
    Classification,
    /// Numeric outcome.
    Regression,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Classification => write!(f, "classification"),
            Task::Regression => write!(f, "regression"),
        }
    }
}

/// A supervised base learner.
pub trait Estimator: Send + Sync {
    /// Fit on features `x` and target `y`.
    ///
    /// * `x` - Column-major features.
    /// * `y` - Target, one value per row of `x`.
    /// * `sample_weight` - Optional weight of each row.
    fn fit(&mut self, x: &Matrix<f64>, y: &[f64], sample_weight: Option<&[f64]>) -> Result<(), CausalError>;

    /// Predict every row of `x`. Classifiers return the probability of class 1.
    fn predict(&self, x: &Matrix<f64>) -> Result<Vec<f64>, CausalError>;

    /// A fresh, unfitted copy carrying the same settings.
    fn boxed_clone(&self) -> Box<dyn Estimator>;
}

impl Clone for Box<dyn Estimator> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

/// Gradient-boosted classifier or regressor, depending on `task`.
pub fn default_learner(task: Task, seed: u64) -> Box<dyn Estimator> {
    match task {
        Task::Classification => Box::new(GradientBooster::classifier().set_seed(seed)),
        Task::Regression => Box::new(GradientBooster::regressor().set_seed(seed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::Objective;

    #[test]
    fn test_default_learner_fits_task() {
        let x = vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let m = Matrix::new(&x, 10, 1);
        let y = vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0];

        let mut clf = default_learner(Task::Classification, 0);
        clf.fit(&m, &y, None).unwrap();
        let p = clf.predict(&m).unwrap();
        assert!(p.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(p[9] > p[0]);
    }

    #[test]
    fn test_boxed_clone_is_unfitted() {
        let booster = GradientBooster::regressor().set_n_estimators(5);
        assert_eq!(booster.cfg.objective, Objective::SquaredLoss);
        let boxed: Box<dyn Estimator> = Box::new(booster);
        let x = vec![1.0, 2.0];
        let m = Matrix::new(&x, 2, 1);
        let copy = boxed.clone();
        assert!(matches!(copy.predict(&m), Err(CausalError::NotFitted(_))));
    }

    #[test]
    fn test_task_display() {
        assert_eq!(Task::Classification.to_string(), "classification");
        assert_eq!(Task::Regression.to_string(), "regression");
    }
}
