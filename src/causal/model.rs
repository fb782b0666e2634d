//! Causal Model
//!
//! Ties preprocessing, the metalearner and bias minimization together. A model is built
//! from a raw table, fitted once (or refitted), and then answers per-row effect and
//! average treatment effect queries.
use crate::causal::bias::{BiasMinimizer, MatchedSample};
use crate::causal::config::CausalConfig;
use crate::causal::metalearners::{Metalearner, MetalearnerKind, MetalearnerRegistry};
use crate::data::{FeatureMatrix, Matrix};
use crate::dataset::{Column, Dataset};
use crate::errors::CausalError;
use crate::learner::{default_learner, Estimator, Task};
use crate::preprocess::{binarize_column, ColumnRole, FeatureEncoder, ValueMapping};
use crate::utils::mean;
use log::info;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Average treatment effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ate {
    pub ate: f64,
}

/// Inputs `CausalModel::predict` accepts.
pub enum Features<'a, 'm: 'a> {
    /// Already encoded values, in the fitted column order.
    Matrix(&'a Matrix<'m, f64>),
    /// An encoded feature table.
    Encoded(&'a FeatureMatrix),
    /// A raw table, encoded with the fitted encoder.
    Table(&'a Dataset),
}

impl<'a, 'm: 'a> From<&'a Matrix<'m, f64>> for Features<'a, 'm> {
    fn from(m: &'a Matrix<'m, f64>) -> Self {
        Features::Matrix(m)
    }
}

impl<'a> From<&'a FeatureMatrix> for Features<'a, 'static> {
    fn from(f: &'a FeatureMatrix) -> Self {
        Features::Encoded(f)
    }
}

impl<'a> From<&'a Dataset> for Features<'a, 'static> {
    fn from(d: &'a Dataset) -> Self {
        Features::Table(d)
    }
}

pub struct CausalModel {
    config: CausalConfig,
    dataset: Dataset,
    features: FeatureMatrix,
    treatment: Vec<f64>,
    outcome: Vec<f64>,
    task: Task,
    treatment_mapping: Option<ValueMapping>,
    outcome_mapping: Option<ValueMapping>,
    encoder: FeatureEncoder,
    metalearner: Box<dyn Metalearner>,
    fitted: bool,
    matched: Option<MatchedSample>,
}

impl CausalModel {
    /// Preprocess `dataset` and set up the configured metalearner.
    ///
    /// * `dataset` - Raw table, copied and never modified.
    /// * `config` - Column roles and model settings.
    /// * `learner` - Outcome learner. Defaults to a gradient-boosted classifier or regressor,
    ///   depending on the outcome.
    pub fn new(dataset: &Dataset, config: CausalConfig, learner: Option<Box<dyn Estimator>>) -> Result<Self, CausalError> {
        Self::with_registry(dataset, config, learner, &MetalearnerRegistry::default())
    }

    /// Like [`CausalModel::new`], picking the metalearner from `registry`.
    pub fn with_registry(
        dataset: &Dataset,
        config: CausalConfig,
        learner: Option<Box<dyn Estimator>>,
        registry: &MetalearnerRegistry,
    ) -> Result<Self, CausalError> {
        let start = Instant::now();
        let raw = dataset.trimmed()?;
        raw.get(&config.treatment_col)?;
        raw.get(&config.outcome_col)?;
        if raw.n_rows() == 0 {
            return Err(CausalError::InvalidDataset("the dataset has no rows".to_string()));
        }

        let (df, treatment) = binarize_column(&raw, &config.treatment_col, ColumnRole::Treatment, config.verbose)?;
        let (df, outcome) = binarize_column(&df, &config.outcome_col, ColumnRole::Outcome, config.verbose)?;
        let treatment_values: Vec<f64> = df
            .get(&config.treatment_col)?
            .values
            .iter()
            .filter_map(|v| v.as_f64())
            .collect();
        // Dropping rows with a missing outcome can empty a treatment group.
        if !(treatment_values.contains(&0.0) && treatment_values.contains(&1.0)) {
            return Err(CausalError::InvalidTreatment(config.treatment_col.clone(), 1));
        }

        let task = if outcome.is_binary {
            Task::Classification
        } else {
            Task::Regression
        };
        if config.verbose {
            info!("Outcome column \"{}\" is treated as {}.", config.outcome_col, task);
        }

        let excluded = config.excluded_cols();
        let feature_cols: Vec<String> = df
            .column_names()
            .into_iter()
            .filter(|c| !excluded.iter().any(|e| e == c))
            .map(|c| c.to_string())
            .collect();
        let mut encoder = FeatureEncoder::new(config.na_cont_value, config.na_cat_value.clone());
        let features = encoder.fit_transform(&df, &feature_cols)?;

        let learner = learner.unwrap_or_else(|| default_learner(task, config.seed));
        let metalearner = registry.build(task, config.metalearner, learner, config.seed)?;

        if config.verbose {
            info!(
                "Prepared {} rows with {} features for a {} in {} seconds.",
                df.n_rows(),
                features.cols(),
                config.metalearner,
                start.elapsed().as_secs_f64()
            );
        }

        Ok(CausalModel {
            config,
            dataset: df,
            features,
            treatment: treatment_values,
            outcome: outcome.values,
            task,
            treatment_mapping: treatment.mapping,
            outcome_mapping: outcome.mapping,
            encoder,
            metalearner,
            fitted: false,
            matched: None,
        })
    }

    /// Fit the metalearner and write the per-row effects to the effect column.
    pub fn fit(&mut self) -> Result<(), CausalError> {
        let start = Instant::now();
        let x = self.features.as_matrix();
        self.metalearner.fit(&x, &self.treatment, &self.outcome)?;
        let effects = self.metalearner.predict(&x)?;
        self.dataset
            .insert_column(Column::new(self.config.effect_col.as_str(), effects))?;
        self.fitted = true;
        if self.config.verbose {
            info!(
                "Fitted a {} in {} seconds.",
                self.metalearner.kind(),
                start.elapsed().as_secs_f64()
            );
        }
        Ok(())
    }

    /// Treatment effect of every row of `x`.
    pub fn predict<'a, 'm: 'a>(&self, x: impl Into<Features<'a, 'm>>) -> Result<Vec<f64>, CausalError> {
        if !self.fitted {
            return Err(CausalError::NotFitted("predict".to_string()));
        }
        let expected = self.features.cols();
        match x.into() {
            Features::Matrix(m) => {
                if m.cols != expected {
                    return Err(CausalError::FeatureMismatch(expected, m.cols));
                }
                self.metalearner.predict(m)
            }
            Features::Encoded(f) => {
                if f.cols() != expected {
                    return Err(CausalError::FeatureMismatch(expected, f.cols()));
                }
                self.metalearner.predict(&f.as_matrix())
            }
            Features::Table(d) => {
                let encoded = self.encoder.transform(&d.trimmed()?)?;
                self.metalearner.predict(&encoded.as_matrix())
            }
        }
    }

    /// Mean effect over all rows, or over the rows where `mask` is true.
    ///
    /// * `mask` - One flag per row of the working dataset.
    pub fn estimate_ate(&self, mask: Option<&[bool]>) -> Result<Ate, CausalError> {
        if !self.fitted {
            return Err(CausalError::NotFitted("estimate_ate".to_string()));
        }
        let effects = self.effects()?;
        let selected: Vec<f64> = match mask {
            None => effects,
            Some(mask) => {
                if mask.len() != effects.len() {
                    return Err(CausalError::MaskLength(mask.len(), effects.len()));
                }
                effects
                    .into_iter()
                    .zip(mask)
                    .filter(|(_, keep)| **keep)
                    .map(|(e, _)| e)
                    .collect()
            }
        };
        if selected.is_empty() {
            return Err(CausalError::EmptySelection);
        }
        Ok(Ate { ate: mean(&selected) })
    }

    /// Match treated and control rows on their propensity and keep the matched sample.
    ///
    /// * `caliper` - Maximum propensity distance in standard deviations, `None` for no limit.
    pub fn minimize_bias(&mut self, caliper: Option<f64>) -> Result<&MatchedSample, CausalError> {
        let minimizer = BiasMinimizer::new(self.config.bias.clone(), self.config.verbose);
        let sample = minimizer.minimize(&self.features, &self.treatment, &self.outcome, caliper)?;
        Ok(self.matched.insert(sample))
    }

    /// Effect column of the working dataset.
    pub fn effects(&self) -> Result<Vec<f64>, CausalError> {
        if !self.fitted {
            return Err(CausalError::NotFitted("effects".to_string()));
        }
        Ok(self
            .dataset
            .get(&self.config.effect_col)?
            .values
            .iter()
            .map(|v| v.as_f64().unwrap_or(f64::NAN))
            .collect())
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    pub fn config(&self) -> &CausalConfig {
        &self.config
    }

    /// Trimmed, filtered and binarized copy of the input, plus the effect column once fitted.
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn features(&self) -> &FeatureMatrix {
        &self.features
    }

    pub fn feature_names(&self) -> &[String] {
        self.features.names()
    }

    pub fn treatment(&self) -> &[f64] {
        &self.treatment
    }

    pub fn outcome(&self) -> &[f64] {
        &self.outcome
    }

    pub fn task(&self) -> Task {
        self.task
    }

    pub fn metalearner_kind(&self) -> MetalearnerKind {
        self.metalearner.kind()
    }

    pub fn treatment_mapping(&self) -> Option<&ValueMapping> {
        self.treatment_mapping.as_ref()
    }

    pub fn outcome_mapping(&self) -> Option<&ValueMapping> {
        self.outcome_mapping.as_ref()
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn matched_sample(&self) -> Option<&MatchedSample> {
        self.matched.as_ref()
    }
}
