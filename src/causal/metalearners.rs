//! Meta-learners for Heterogeneous Treatment Effect (HTE) estimation.
//!
//! Implements the T-Learner, X-Learner and R-Learner on top of any `Estimator`, and a
//! registry that picks one by task and kind.
use crate::booster::GradientBooster;
use crate::causal::propensity::stratified_folds;
use crate::constants::{CONTROL_NAME, PROPENSITY_CLIP};
use crate::data::Matrix;
use crate::errors::CausalError;
use crate::learner::{Estimator, Task};
use crate::utils::items_to_strings;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A learner of the per-row effect of a binary treatment.
pub trait Metalearner: Send + Sync {
    /// Fit on features `x`, treatment `w` and outcome `y`.
    fn fit(&mut self, x: &Matrix<f64>, w: &[f64], y: &[f64]) -> Result<(), CausalError>;
    /// Estimated treatment effect of every row of `x`.
    fn predict(&self, x: &Matrix<f64>) -> Result<Vec<f64>, CausalError>;
    fn kind(&self) -> MetalearnerKind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MetalearnerKind {
    #[default]
    TLearner,
    XLearner,
    RLearner,
}

impl fmt::Display for MetalearnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetalearnerKind::TLearner => write!(f, "TLearner"),
            MetalearnerKind::XLearner => write!(f, "XLearner"),
            MetalearnerKind::RLearner => write!(f, "RLearner"),
        }
    }
}

impl FromStr for MetalearnerKind {
    type Err = CausalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TLearner" | "t-learner" => Ok(MetalearnerKind::TLearner),
            "XLearner" | "x-learner" => Ok(MetalearnerKind::XLearner),
            "RLearner" | "r-learner" => Ok(MetalearnerKind::RLearner),
            _ => Err(CausalError::ParseString(
                s.to_string(),
                "MetalearnerKind".to_string(),
                items_to_strings(vec!["TLearner", "XLearner", "RLearner"]),
            )),
        }
    }
}

/// Control and treated row indices. Fails unless `w` is 0/1 with both groups present.
fn split_groups(w: &[f64], rows: usize) -> Result<(Vec<usize>, Vec<usize>), CausalError> {
    if w.len() != rows {
        return Err(CausalError::InvalidDataset(format!(
            "treatment has {} values but the features have {} rows",
            w.len(),
            rows
        )));
    }
    let idx0: Vec<usize> = (0..rows).filter(|&i| w[i] == CONTROL_NAME).collect();
    let idx1: Vec<usize> = (0..rows).filter(|&i| w[i] == 1.0).collect();
    if idx0.len() + idx1.len() != rows || idx0.is_empty() || idx1.is_empty() {
        let groups = usize::from(!idx0.is_empty()) + usize::from(!idx1.is_empty());
        return Err(CausalError::InvalidTreatment("treatment".to_string(), groups));
    }
    Ok((idx0, idx1))
}

fn subset(x: &Matrix<f64>, v: &[f64], index: &[usize]) -> (Vec<f64>, Vec<f64>) {
    (x.select_rows(index), index.iter().map(|&i| v[i]).collect())
}

fn effect_regressor(seed: u64) -> Box<dyn Estimator> {
    Box::new(GradientBooster::regressor().set_seed(seed))
}

fn propensity_classifier(seed: u64) -> Box<dyn Estimator> {
    Box::new(GradientBooster::classifier().set_seed(seed))
}

fn clip_propensity(p: Vec<f64>) -> Vec<f64> {
    p.into_iter()
        .map(|v| v.clamp(PROPENSITY_CLIP, 1.0 - PROPENSITY_CLIP))
        .collect()
}

// ---------------------------------------------------------------------------
// T-Learner
// ---------------------------------------------------------------------------

/// T-Learner (Two Learners).
///
/// Estimates $\mu_0(X)$ on control data and $\mu_1(X)$ on treated data.
/// CATE(x) = $\mu_1(x) - \mu_0(x)$.
pub struct TLearner {
    pub mu0: Box<dyn Estimator>,
    pub mu1: Box<dyn Estimator>,
    fitted: bool,
}

impl TLearner {
    pub fn new(learner: Box<dyn Estimator>) -> Self {
        TLearner {
            mu0: learner.boxed_clone(),
            mu1: learner,
            fitted: false,
        }
    }
}

impl Metalearner for TLearner {
    fn fit(&mut self, x: &Matrix<f64>, w: &[f64], y: &[f64]) -> Result<(), CausalError> {
        let (idx0, idx1) = split_groups(w, x.rows)?;
        let (x0_data, y0) = subset(x, y, &idx0);
        let (x1_data, y1) = subset(x, y, &idx1);
        self.mu0.fit(&Matrix::new(&x0_data, idx0.len(), x.cols), &y0, None)?;
        self.mu1.fit(&Matrix::new(&x1_data, idx1.len(), x.cols), &y1, None)?;
        self.fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Matrix<f64>) -> Result<Vec<f64>, CausalError> {
        if !self.fitted {
            return Err(CausalError::NotFitted("predict".to_string()));
        }
        let p1 = self.mu1.predict(x)?;
        let p0 = self.mu0.predict(x)?;
        Ok(p1.iter().zip(p0.iter()).map(|(a, b)| a - b).collect())
    }

    fn kind(&self) -> MetalearnerKind {
        MetalearnerKind::TLearner
    }
}

// ---------------------------------------------------------------------------
// X-Learner
// ---------------------------------------------------------------------------

/// X-Learner.
///
/// Fits the T-Learner's outcome models, imputes effects for each group with the other
/// group's model, regresses them on the features and blends the two effect models by the
/// propensity: CATE(x) = $p(x) \tau_0(x) + (1 - p(x)) \tau_1(x)$.
pub struct XLearner {
    pub mu0: Box<dyn Estimator>,
    pub mu1: Box<dyn Estimator>,
    pub tau0: Box<dyn Estimator>,
    pub tau1: Box<dyn Estimator>,
    pub propensity: Box<dyn Estimator>,
    fitted: bool,
}

impl XLearner {
    pub fn new(learner: Box<dyn Estimator>, seed: u64) -> Self {
        XLearner {
            mu0: learner.boxed_clone(),
            mu1: learner,
            tau0: effect_regressor(seed),
            tau1: effect_regressor(seed.wrapping_add(1)),
            propensity: propensity_classifier(seed.wrapping_add(2)),
            fitted: false,
        }
    }
}

impl Metalearner for XLearner {
    fn fit(&mut self, x: &Matrix<f64>, w: &[f64], y: &[f64]) -> Result<(), CausalError> {
        let (idx0, idx1) = split_groups(w, x.rows)?;
        let (x0_data, y0) = subset(x, y, &idx0);
        let (x1_data, y1) = subset(x, y, &idx1);
        let matrix0 = Matrix::new(&x0_data, idx0.len(), x.cols);
        let matrix1 = Matrix::new(&x1_data, idx1.len(), x.cols);

        self.mu0.fit(&matrix0, &y0, None)?;
        self.mu1.fit(&matrix1, &y1, None)?;

        // D1 = Y1 - mu0(X1), D0 = mu1(X0) - Y0
        let mu0_on_1 = self.mu0.predict(&matrix1)?;
        let d1: Vec<f64> = y1.iter().zip(mu0_on_1.iter()).map(|(yi, m)| yi - m).collect();
        let mu1_on_0 = self.mu1.predict(&matrix0)?;
        let d0: Vec<f64> = mu1_on_0.iter().zip(y0.iter()).map(|(m, yi)| m - yi).collect();

        self.tau1.fit(&matrix1, &d1, None)?;
        self.tau0.fit(&matrix0, &d0, None)?;
        self.propensity.fit(x, w, None)?;
        self.fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Matrix<f64>) -> Result<Vec<f64>, CausalError> {
        if !self.fitted {
            return Err(CausalError::NotFitted("predict".to_string()));
        }
        let t0 = self.tau0.predict(x)?;
        let t1 = self.tau1.predict(x)?;
        let p = clip_propensity(self.propensity.predict(x)?);
        Ok(t0
            .iter()
            .zip(t1.iter())
            .zip(p.iter())
            .map(|((t0_i, t1_i), p_i)| p_i * t0_i + (1.0 - p_i) * t1_i)
            .collect())
    }

    fn kind(&self) -> MetalearnerKind {
        MetalearnerKind::XLearner
    }
}

// ---------------------------------------------------------------------------
// R-Learner
// ---------------------------------------------------------------------------

/// R-Learner.
///
/// Cross-fits the outcome model $m(x)$ and the propensity $e(x)$, then regresses the
/// pseudo-outcome $(y - m) / (w - e)$ with weights $(w - e)^2$.
pub struct RLearner {
    pub outcome: Box<dyn Estimator>,
    pub propensity: Box<dyn Estimator>,
    pub tau: Box<dyn Estimator>,
    pub n_fold: usize,
    pub seed: u64,
    fitted: bool,
}

impl RLearner {
    pub fn new(learner: Box<dyn Estimator>, seed: u64) -> Self {
        RLearner {
            outcome: learner,
            propensity: propensity_classifier(seed.wrapping_add(1)),
            tau: effect_regressor(seed),
            n_fold: 3,
            seed,
            fitted: false,
        }
    }

    /// Out-of-fold predictions of `model` fit on target `v`. With fewer than two rows per
    /// group per fold the model is fit and evaluated in-sample.
    fn cross_fit(&self, model: &dyn Estimator, x: &Matrix<f64>, v: &[f64], folds: &[Vec<usize>]) -> Result<Vec<f64>, CausalError> {
        let mut out = vec![0.0; x.rows];
        if folds.len() < 2 {
            let mut m = model.boxed_clone();
            m.fit(x, v, None)?;
            return m.predict(x);
        }
        for (k, test) in folds.iter().enumerate() {
            let train: Vec<usize> = folds
                .iter()
                .enumerate()
                .filter(|(f, _)| *f != k)
                .flat_map(|(_, rows)| rows.iter().copied())
                .collect();
            let (x_train, v_train) = subset(x, v, &train);
            let x_test = x.select_rows(test);
            let mut m = model.boxed_clone();
            m.fit(&Matrix::new(&x_train, train.len(), x.cols), &v_train, None)?;
            let preds = m.predict(&Matrix::new(&x_test, test.len(), x.cols))?;
            for (&i, p) in test.iter().zip(preds) {
                out[i] = p;
            }
        }
        Ok(out)
    }
}

impl Metalearner for RLearner {
    fn fit(&mut self, x: &Matrix<f64>, w: &[f64], y: &[f64]) -> Result<(), CausalError> {
        let (idx0, idx1) = split_groups(w, x.rows)?;
        let k = self.n_fold.min(idx0.len()).min(idx1.len());
        let folds = if k >= 2 {
            stratified_folds(w, k, self.seed)
        } else {
            Vec::new()
        };

        let m = self.cross_fit(self.outcome.as_ref(), x, y, &folds)?;
        let e = clip_propensity(self.cross_fit(self.propensity.as_ref(), x, w, &folds)?);

        let (pseudo, weight): (Vec<f64>, Vec<f64>) = (0..x.rows)
            .map(|i| {
                let r = w[i] - e[i];
                ((y[i] - m[i]) / r, r * r)
            })
            .unzip();
        self.tau.fit(x, &pseudo, Some(&weight))?;
        self.fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Matrix<f64>) -> Result<Vec<f64>, CausalError> {
        if !self.fitted {
            return Err(CausalError::NotFitted("predict".to_string()));
        }
        self.tau.predict(x)
    }

    fn kind(&self) -> MetalearnerKind {
        MetalearnerKind::RLearner
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Builds a metalearner from the outcome learner and a seed.
pub type MetalearnerBuilder = fn(Box<dyn Estimator>, u64) -> Box<dyn Metalearner>;

fn build_t_learner(learner: Box<dyn Estimator>, _seed: u64) -> Box<dyn Metalearner> {
    Box::new(TLearner::new(learner))
}

fn build_x_learner(learner: Box<dyn Estimator>, seed: u64) -> Box<dyn Metalearner> {
    Box::new(XLearner::new(learner, seed))
}

fn build_r_learner(learner: Box<dyn Estimator>, seed: u64) -> Box<dyn Metalearner> {
    Box::new(RLearner::new(learner, seed))
}

/// Metalearner constructors keyed by task and kind.
#[derive(Clone)]
pub struct MetalearnerRegistry {
    builders: HashMap<(Task, MetalearnerKind), MetalearnerBuilder>,
}

impl Default for MetalearnerRegistry {
    fn default() -> Self {
        let mut registry = MetalearnerRegistry::empty();
        for task in [Task::Classification, Task::Regression] {
            registry.register(task, MetalearnerKind::TLearner, build_t_learner);
            registry.register(task, MetalearnerKind::XLearner, build_x_learner);
            registry.register(task, MetalearnerKind::RLearner, build_r_learner);
        }
        registry
    }
}

impl MetalearnerRegistry {
    pub fn empty() -> Self {
        MetalearnerRegistry {
            builders: HashMap::new(),
        }
    }

    /// Add or replace the builder of `(task, kind)`.
    pub fn register(&mut self, task: Task, kind: MetalearnerKind, builder: MetalearnerBuilder) {
        self.builders.insert((task, kind), builder);
    }

    pub fn contains(&self, task: Task, kind: MetalearnerKind) -> bool {
        self.builders.contains_key(&(task, kind))
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    pub fn build(
        &self,
        task: Task,
        kind: MetalearnerKind,
        learner: Box<dyn Estimator>,
        seed: u64,
    ) -> Result<Box<dyn Metalearner>, CausalError> {
        let builder = self.builders.get(&(task, kind)).ok_or_else(|| {
            CausalError::InvalidParameter(
                "metalearner".to_string(),
                format!("a metalearner registered for {}", task),
                kind.to_string(),
            )
        })?;
        Ok(builder(learner, seed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // y = x + 2 * w, so the effect is 2 everywhere.
    fn constant_effect(n: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let x: Vec<f64> = (0..n).map(|i| (i % 20) as f64).collect();
        let w: Vec<f64> = (0..n).map(|i| if i % 3 == 0 { 1.0 } else { 0.0 }).collect();
        let y: Vec<f64> = x.iter().zip(&w).map(|(xi, wi)| xi + 2.0 * wi).collect();
        (x, w, y)
    }

    fn regressor() -> Box<dyn Estimator> {
        Box::new(GradientBooster::regressor().set_n_estimators(60).set_learning_rate(0.3))
    }

    #[test]
    fn test_t_learner_constant_effect() {
        let (x, w, y) = constant_effect(300);
        let m = Matrix::new(&x, 300, 1);
        let mut learner = TLearner::new(regressor());
        learner.fit(&m, &w, &y).unwrap();
        let tau = learner.predict(&m).unwrap();
        let ate = tau.iter().sum::<f64>() / tau.len() as f64;
        assert!((ate - 2.0).abs() < 0.2, "ate {}", ate);
    }

    #[test]
    fn test_x_learner_constant_effect() {
        let (x, w, y) = constant_effect(300);
        let m = Matrix::new(&x, 300, 1);
        let mut learner = XLearner::new(regressor(), 42);
        learner.fit(&m, &w, &y).unwrap();
        let tau = learner.predict(&m).unwrap();
        let ate = tau.iter().sum::<f64>() / tau.len() as f64;
        assert!((ate - 2.0).abs() < 0.3, "ate {}", ate);
    }

    #[test]
    fn test_r_learner_runs() {
        let (x, w, y) = constant_effect(300);
        let m = Matrix::new(&x, 300, 1);
        let mut learner = RLearner::new(regressor(), 42);
        learner.fit(&m, &w, &y).unwrap();
        let tau = learner.predict(&m).unwrap();
        assert_eq!(tau.len(), 300);
        assert!(tau.iter().all(|t| t.is_finite()));
    }

    #[test]
    fn test_predict_before_fit() {
        let x = vec![1.0];
        let m = Matrix::new(&x, 1, 1);
        let learner = TLearner::new(regressor());
        assert!(matches!(learner.predict(&m), Err(CausalError::NotFitted(_))));
    }

    #[test]
    fn test_single_group_rejected() {
        let x = vec![1.0, 2.0];
        let m = Matrix::new(&x, 2, 1);
        let mut learner = TLearner::new(regressor());
        let res = learner.fit(&m, &[1.0, 1.0], &[0.0, 1.0]);
        assert!(matches!(res, Err(CausalError::InvalidTreatment(_, 1))));
    }

    #[test]
    fn test_registry() {
        let registry = MetalearnerRegistry::default();
        assert_eq!(registry.len(), 6);
        for kind in [MetalearnerKind::TLearner, MetalearnerKind::XLearner, MetalearnerKind::RLearner] {
            let learner = registry.build(Task::Regression, kind, regressor(), 0).unwrap();
            assert_eq!(learner.kind(), kind);
        }

        let empty = MetalearnerRegistry::empty();
        assert!(empty.is_empty());
        assert!(matches!(
            empty.build(Task::Regression, MetalearnerKind::TLearner, regressor(), 0),
            Err(CausalError::InvalidParameter(..))
        ));
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("x-learner".parse::<MetalearnerKind>().unwrap(), MetalearnerKind::XLearner);
        assert!("s-learner".parse::<MetalearnerKind>().is_err());
    }
}
