//! Balance
//!
//! Covariate balance between the treated and control groups ("table one"): group sizes,
//! per-feature `mean (sd)` and the standardized mean difference.
use crate::data::FeatureMatrix;
use crate::errors::CausalError;
use crate::utils::{mean, nan_as_null, variance};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Table};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureBalance {
    pub name: String,
    #[serde(with = "nan_as_null")]
    pub control_mean: f64,
    #[serde(with = "nan_as_null")]
    pub control_sd: f64,
    #[serde(with = "nan_as_null")]
    pub treated_mean: f64,
    #[serde(with = "nan_as_null")]
    pub treated_sd: f64,
    /// Standardized mean difference, treated minus control. NaN when undefined.
    #[serde(with = "nan_as_null")]
    pub smd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceTable {
    pub n_control: usize,
    pub n_treated: usize,
    pub features: Vec<FeatureBalance>,
}

/// `(mean_t - mean_c) / sqrt((var_t + var_c) / 2)` with sample variances.
pub fn standardized_mean_difference(treated: &[f64], control: &[f64]) -> f64 {
    let pooled = ((variance(treated, 1) + variance(control, 1)) / 2.0).sqrt();
    (mean(treated) - mean(control)) / pooled
}

impl BalanceTable {
    /// Summarize every feature by treatment group.
    ///
    /// * `features` - Features of the rows to summarize.
    /// * `treatment` - 0/1 group of each row.
    pub fn new(features: &FeatureMatrix, treatment: &[f64]) -> Result<Self, CausalError> {
        if treatment.len() != features.rows() {
            return Err(CausalError::InvalidDataset(format!(
                "treatment has {} values but the features have {} rows",
                treatment.len(),
                features.rows()
            )));
        }
        let m = features.as_matrix();
        let feature_rows = features
            .names()
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let col = m.get_col(j);
                let (treated, control) = split_groups(col, treatment);
                FeatureBalance {
                    name: name.clone(),
                    control_mean: mean(&control),
                    control_sd: variance(&control, 1).sqrt(),
                    treated_mean: mean(&treated),
                    treated_sd: variance(&treated, 1).sqrt(),
                    smd: standardized_mean_difference(&treated, &control),
                }
            })
            .collect();
        Ok(BalanceTable {
            n_control: treatment.iter().filter(|w| **w == 0.0).count(),
            n_treated: treatment.iter().filter(|w| **w == 1.0).count(),
            features: feature_rows,
        })
    }

    /// Largest absolute standardized mean difference, ignoring undefined ones.
    pub fn max_abs_smd(&self) -> f64 {
        self.features
            .iter()
            .map(|f| f.smd.abs())
            .filter(|v| v.is_finite())
            .fold(0.0, f64::max)
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("").add_attribute(Attribute::Bold),
            Cell::new("Control").add_attribute(Attribute::Bold),
            Cell::new("Treatment").add_attribute(Attribute::Bold),
            Cell::new("SMD").add_attribute(Attribute::Bold),
        ]);
        table.add_row(vec![
            Cell::new("n"),
            Cell::new(self.n_control),
            Cell::new(self.n_treated),
            Cell::new(""),
        ]);
        for f in &self.features {
            table.add_row(vec![
                Cell::new(&f.name),
                Cell::new(format!("{:.2} ({:.2})", f.control_mean, f.control_sd)),
                Cell::new(format!("{:.2} ({:.2})", f.treated_mean, f.treated_sd)),
                Cell::new(format!("{:.4}", f.smd)),
            ]);
        }
        table
    }
}

impl fmt::Display for BalanceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_table())
    }
}

/// Values of `col` for treated and control rows.
fn split_groups(col: &[f64], treatment: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut treated = Vec::new();
    let mut control = Vec::new();
    for (v, w) in col.iter().zip(treatment) {
        if *w == 1.0 {
            treated.push(*v);
        } else if *w == 0.0 {
            control.push(*v);
        }
    }
    (treated, control)
}
