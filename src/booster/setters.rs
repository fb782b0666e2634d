use crate::booster::GradientBooster;
use crate::objective::Objective;

impl GradientBooster {
    // Set methods for parameters

    /// Set the objective on the booster.
    /// * `objective` - The objective type of the booster.
    pub fn set_objective(mut self, objective: Objective) -> Self {
        self.cfg.objective = objective;
        self
    }

    /// Set the number of boosting rounds.
    /// * `n_estimators` - Number of trees to grow.
    pub fn set_n_estimators(mut self, n_estimators: usize) -> Self {
        self.cfg.n_estimators = n_estimators;
        self
    }

    /// Set the learning rate on the booster.
    /// * `learning_rate` - Shrinkage applied to each tree's leaf weights.
    pub fn set_learning_rate(mut self, learning_rate: f64) -> Self {
        self.cfg.learning_rate = learning_rate;
        self
    }

    /// Set the maximum depth of the trees.
    /// * `max_depth` - Maximum depth, the root is depth 0.
    pub fn set_max_depth(mut self, max_depth: usize) -> Self {
        self.cfg.max_depth = max_depth;
        self
    }

    /// Set the number of bins on the booster.
    /// * `max_bin` - Number of bins to calculate to partition the data. Setting this to
    ///   a smaller number, will result in faster training time, while potentially sacrificing
    ///   accuracy. If there are more bins, than unique values in a column, all unique values
    ///   will be used.
    pub fn set_max_bin(mut self, max_bin: u16) -> Self {
        self.cfg.max_bin = max_bin;
        self
    }

    /// Set the L2 regularization on the leaf weights.
    pub fn set_lambda(mut self, lambda: f64) -> Self {
        self.cfg.lambda = lambda;
        self
    }

    /// Set the minimum split gain.
    pub fn set_gamma(mut self, gamma: f64) -> Self {
        self.cfg.gamma = gamma;
        self
    }

    /// Set the minimum hessian sum of a child node.
    pub fn set_min_child_weight(mut self, min_child_weight: f64) -> Self {
        self.cfg.min_child_weight = min_child_weight;
        self
    }

    /// Set the minimum number of rows of a child node.
    pub fn set_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.cfg.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Set the row subsampling rate.
    /// * `subsample` - Fraction of rows drawn for each tree, in (0, 1].
    pub fn set_subsample(mut self, subsample: f64) -> Self {
        self.cfg.subsample = subsample;
        self
    }

    /// Set the seed on the booster.
    /// * `seed` - Integer value used to seed any randomness used in the algorithm.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.cfg.seed = seed;
        self
    }

    /// Set log_iterations on the booster.
    /// * `log_iterations` - The number of log iterations of the booster.
    pub fn set_log_iterations(mut self, log_iterations: usize) -> Self {
        self.cfg.log_iterations = log_iterations;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setters_chain() {
        let booster = GradientBooster::default()
            .set_objective(Objective::LogLoss)
            .set_n_estimators(7)
            .set_learning_rate(0.05)
            .set_max_depth(2)
            .set_max_bin(32)
            .set_lambda(2.0)
            .set_gamma(0.1)
            .set_min_child_weight(1.0)
            .set_min_samples_leaf(3)
            .set_subsample(0.8)
            .set_seed(11)
            .set_log_iterations(1);
        assert_eq!(booster.cfg.objective, Objective::LogLoss);
        assert_eq!(booster.cfg.n_estimators, 7);
        assert_eq!(booster.cfg.max_bin, 32);
        assert_eq!(booster.cfg.seed, 11);
        assert_eq!(booster.cfg.subsample, 0.8);
        assert!(booster.cfg.validate().is_ok());
    }
}
