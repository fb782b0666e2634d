//! Propensity
//!
//! Models of the probability that a row received the treatment. The elastic-net
//! logistic model picks its penalty by stratified k-fold log loss and refits on all rows.
use crate::constants::PROPENSITY_CLIP;
use crate::data::Matrix;
use crate::errors::CausalError;
use crate::utils::{mean, sigmoid, std_dev, validate_float_parameter};
use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub trait PropensityModel {
    /// Fit on features `x` and binary treatment `w`.
    fn fit(&mut self, x: &Matrix<f64>, w: &[f64]) -> Result<(), CausalError>;
    /// Clipped propensity score of every row of `x`.
    fn predict(&self, x: &Matrix<f64>) -> Result<Vec<f64>, CausalError>;
    fn fit_predict(&mut self, x: &Matrix<f64>, w: &[f64]) -> Result<Vec<f64>, CausalError> {
        self.fit(x, w)?;
        self.predict(x)
    }
}

/// Split rows into `k` folds, dealing each label's shuffled rows round-robin so every
/// fold sees both labels in proportion.
pub fn stratified_folds(labels: &[f64], k: usize, seed: u64) -> Vec<Vec<usize>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut folds = vec![Vec::new(); k];
    let mut next = 0;
    for label in [0.0, 1.0] {
        let mut rows: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == label).collect();
        rows.shuffle(&mut rng);
        for i in rows {
            folds[next % k].push(i);
            next += 1;
        }
    }
    folds
}

/// Logistic regression coefficients on standardized features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticFit {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
    pub coef: Vec<f64>,
    pub intercept: f64,
    pub alpha: f64,
    pub l1_ratio: f64,
}

impl LogisticFit {
    fn predict_standardized(&self, z: &Matrix<f64>) -> Vec<f64> {
        (0..z.rows)
            .map(|i| {
                let eta = self.intercept + (0..z.cols).map(|j| self.coef[j] * z.get(i, j)).sum::<f64>();
                sigmoid(eta)
            })
            .collect()
    }
}

#[inline]
fn soft_threshold(v: f64, t: f64) -> f64 {
    if v > t {
        v - t
    } else if v < -t {
        v + t
    } else {
        0.0
    }
}

/// Column means and standard deviations. Constant columns get a unit scale.
fn standardization(x: &Matrix<f64>) -> (Vec<f64>, Vec<f64>) {
    (0..x.cols)
        .map(|j| {
            let col = x.get_col(j);
            let s = std_dev(col, 0);
            (mean(col), if s > 0.0 && s.is_finite() { s } else { 1.0 })
        })
        .unzip()
}

fn standardize(x: &Matrix<f64>, means: &[f64], scales: &[f64]) -> Vec<f64> {
    (0..x.cols)
        .flat_map(|j| x.get_col(j).iter().map(move |v| (v - means[j]) / scales[j]))
        .collect()
}

/// Elastic-net penalized logistic regression of the treatment on the features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticNetPropensityModel {
    pub n_fold: usize,
    pub seed: u64,
    /// Penalty strengths searched.
    pub alphas: Vec<f64>,
    /// Share of the penalty that is L1, searched.
    pub l1_ratios: Vec<f64>,
    pub max_iter: usize,
    pub tol: f64,
    pub fitted: Option<LogisticFit>,
}

impl Default for ElasticNetPropensityModel {
    fn default() -> Self {
        ElasticNetPropensityModel {
            n_fold: 3,
            seed: 42,
            alphas: vec![1e-4, 1e-3, 1e-2, 1e-1],
            l1_ratios: vec![0.0, 0.25, 0.5, 0.75, 1.0],
            max_iter: 500,
            tol: 1e-6,
            fitted: None,
        }
    }
}

impl ElasticNetPropensityModel {
    pub fn new(n_fold: usize, seed: u64) -> Self {
        ElasticNetPropensityModel {
            n_fold,
            seed,
            ..Default::default()
        }
    }

    pub fn set_alphas(mut self, alphas: Vec<f64>) -> Self {
        self.alphas = alphas;
        self
    }

    pub fn set_l1_ratios(mut self, l1_ratios: Vec<f64>) -> Self {
        self.l1_ratios = l1_ratios;
        self
    }

    pub fn set_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    fn validate(&self) -> Result<(), CausalError> {
        if self.alphas.is_empty() || self.l1_ratios.is_empty() {
            return Err(CausalError::InvalidParameter(
                "alphas, l1_ratios".to_string(),
                "at least one value each".to_string(),
                "an empty grid".to_string(),
            ));
        }
        for a in &self.alphas {
            validate_float_parameter(*a, 0.0, f64::INFINITY, "alphas")?;
        }
        for r in &self.l1_ratios {
            validate_float_parameter(*r, 0.0, 1.0, "l1_ratios")?;
        }
        Ok(())
    }

    /// Proximal gradient descent on standardized rows `index` of `z`.
    fn fit_penalized(&self, z: &Matrix<f64>, w: &[f64], index: &[usize], alpha: f64, l1_ratio: f64) -> (Vec<f64>, f64) {
        let p = z.cols;
        let n = index.len() as f64;
        let l2 = alpha * (1.0 - l1_ratio);
        let l1 = alpha * l1_ratio;
        // Lipschitz bound of the smooth part for standardized columns plus intercept.
        let step = 1.0 / (0.25 * (p as f64 + 1.0) + l2);

        let mut coef = vec![0.0; p];
        let mut intercept = 0.0;
        for _ in 0..self.max_iter {
            let resid: Vec<f64> = index
                .iter()
                .map(|&i| {
                    let eta = intercept + (0..p).map(|j| coef[j] * z.get(i, j)).sum::<f64>();
                    sigmoid(eta) - w[i]
                })
                .collect();

            let mut max_change: f64 = 0.0;
            for j in 0..p {
                let col = z.get_col(j);
                let grad = index.iter().zip(&resid).map(|(&i, r)| col[i] * r).sum::<f64>() / n + l2 * coef[j];
                let updated = soft_threshold(coef[j] - step * grad, step * l1);
                max_change = max_change.max((updated - coef[j]).abs());
                coef[j] = updated;
            }
            let grad0 = resid.iter().sum::<f64>() / n;
            let updated = intercept - step * grad0;
            max_change = max_change.max((updated - intercept).abs());
            intercept = updated;

            if max_change < self.tol {
                break;
            }
        }
        (coef, intercept)
    }

    fn cv_log_loss(&self, z: &Matrix<f64>, w: &[f64], folds: &[Vec<usize>], alpha: f64, l1_ratio: f64) -> f64 {
        let mut total = 0.0;
        let mut count = 0usize;
        for (k, test) in folds.iter().enumerate() {
            let train: Vec<usize> = folds
                .iter()
                .enumerate()
                .filter(|(f, _)| *f != k)
                .flat_map(|(_, rows)| rows.iter().copied())
                .collect();
            let (coef, intercept) = self.fit_penalized(z, w, &train, alpha, l1_ratio);
            for &i in test {
                let eta = intercept + (0..z.cols).map(|j| coef[j] * z.get(i, j)).sum::<f64>();
                let p = sigmoid(eta).clamp(1e-15, 1.0 - 1e-15);
                total -= w[i] * p.ln() + (1.0 - w[i]) * (1.0 - p).ln();
                count += 1;
            }
        }
        total / count.max(1) as f64
    }
}

impl PropensityModel for ElasticNetPropensityModel {
    fn fit(&mut self, x: &Matrix<f64>, w: &[f64]) -> Result<(), CausalError> {
        self.validate()?;
        if w.len() != x.rows {
            return Err(CausalError::InvalidDataset(format!(
                "treatment has {} values but the features have {} rows",
                w.len(),
                x.rows
            )));
        }
        let n_treated = w.iter().filter(|v| **v == 1.0).count();
        let n_control = w.iter().filter(|v| **v == 0.0).count();
        if n_treated + n_control != w.len() || n_treated == 0 || n_control == 0 {
            return Err(CausalError::InvalidDataset(
                "propensity model needs a 0/1 treatment with both groups present".to_string(),
            ));
        }

        let (means, scales) = standardization(x);
        let z_data = standardize(x, &means, &scales);
        let z = Matrix::new(&z_data, x.rows, x.cols);

        let grid: Vec<(f64, f64)> = self
            .alphas
            .iter()
            .flat_map(|a| self.l1_ratios.iter().map(move |r| (*a, *r)))
            .collect();
        let k = self.n_fold.min(n_treated.min(n_control));
        let (alpha, l1_ratio) = if k >= 2 && grid.len() > 1 {
            let folds = stratified_folds(w, k, self.seed);
            let losses: Vec<f64> = grid
                .par_iter()
                .map(|(a, r)| self.cv_log_loss(&z, w, &folds, *a, *r))
                .collect();
            // First minimum wins ties.
            let best = losses
                .iter()
                .enumerate()
                .fold(0, |b, (i, l)| if *l < losses[b] { i } else { b });
            debug!("propensity grid search chose {:?} with log loss {}", grid[best], losses[best]);
            grid[best]
        } else {
            grid[0]
        };

        let all: Vec<usize> = (0..x.rows).collect();
        let (coef, intercept) = self.fit_penalized(&z, w, &all, alpha, l1_ratio);
        self.fitted = Some(LogisticFit {
            means,
            scales,
            coef,
            intercept,
            alpha,
            l1_ratio,
        });
        Ok(())
    }

    fn predict(&self, x: &Matrix<f64>) -> Result<Vec<f64>, CausalError> {
        let fit = self
            .fitted
            .as_ref()
            .ok_or_else(|| CausalError::NotFitted("propensity predict".to_string()))?;
        if x.cols != fit.coef.len() {
            return Err(CausalError::FeatureMismatch(fit.coef.len(), x.cols));
        }
        let z_data = standardize(x, &fit.means, &fit.scales);
        let z = Matrix::new(&z_data, x.rows, x.cols);
        Ok(fit
            .predict_standardized(&z)
            .into_iter()
            .map(|p| p.clamp(PROPENSITY_CLIP, 1.0 - PROPENSITY_CLIP))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logistic_data(n: usize) -> (Vec<f64>, Vec<f64>) {
        // x0 drives treatment, x1 is noise-free but irrelevant.
        let x0: Vec<f64> = (0..n).map(|i| i as f64 / n as f64 * 6.0 - 3.0).collect();
        let x1: Vec<f64> = (0..n).map(|i| ((i * 7) % 11) as f64).collect();
        let w: Vec<f64> = x0
            .iter()
            .enumerate()
            .map(|(i, v)| if *v + if i % 5 == 0 { 2.0 } else { 0.0 } > 0.0 { 1.0 } else { 0.0 })
            .collect();
        let mut data = x0;
        data.extend(x1);
        (data, w)
    }

    #[test]
    fn test_scores_are_clipped_and_ordered() {
        let (data, w) = logistic_data(120);
        let x = Matrix::new(&data, 120, 2);
        let mut pm = ElasticNetPropensityModel::new(3, 42);
        let ps = pm.fit_predict(&x, &w).unwrap();
        assert_eq!(ps.len(), 120);
        assert!(ps.iter().all(|p| *p >= PROPENSITY_CLIP && *p <= 1.0 - PROPENSITY_CLIP));
        assert!(ps[119] > 0.5 && ps[0] < 0.5);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (data, w) = logistic_data(90);
        let x = Matrix::new(&data, 90, 2);
        let a = ElasticNetPropensityModel::new(3, 42).fit_predict(&x, &w).unwrap();
        let b = ElasticNetPropensityModel::new(3, 42).fit_predict(&x, &w).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_group_fails() {
        let data = vec![1.0, 2.0, 3.0];
        let x = Matrix::new(&data, 3, 1);
        let mut pm = ElasticNetPropensityModel::default();
        assert!(matches!(pm.fit(&x, &[1.0, 1.0, 1.0]), Err(CausalError::InvalidDataset(_))));
    }

    #[test]
    fn test_predict_before_fit() {
        let data = vec![1.0];
        let x = Matrix::new(&data, 1, 1);
        let pm = ElasticNetPropensityModel::default();
        assert!(matches!(pm.predict(&x), Err(CausalError::NotFitted(_))));
    }

    #[test]
    fn test_stratified_folds_cover_rows_once() {
        let labels = vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0];
        let folds = stratified_folds(&labels, 3, 1);
        let mut all: Vec<usize> = folds.iter().flatten().copied().collect();
        all.sort();
        assert_eq!(all, (0..7).collect::<Vec<_>>());
        assert!(folds.iter().all(|f| f.iter().any(|&i| labels[i] == 0.0)));
    }

    #[test]
    fn test_strong_l1_zeroes_coefficients() {
        let (data, w) = logistic_data(60);
        let x = Matrix::new(&data, 60, 2);
        let mut pm = ElasticNetPropensityModel::default()
            .set_alphas(vec![10.0])
            .set_l1_ratios(vec![1.0]);
        pm.fit(&x, &w).unwrap();
        let fit = pm.fitted.as_ref().unwrap();
        assert!(fit.coef.iter().all(|c| *c == 0.0));
    }
}
