//! Objective
//!
//! Loss functions the gradient booster can optimize. Each objective supplies the per-row
//! loss, first and second derivatives with respect to the raw score, and the constant
//! starting score.
use crate::errors::CausalError;
use crate::utils::{items_to_strings, sigmoid};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub trait ObjectiveFunction {
    /// Per-row loss of raw scores `yhat`.
    fn loss(&self, y: &[f64], yhat: &[f64], sample_weight: Option<&[f64]>) -> Vec<f64>;
    /// Per-row gradient and hessian of the loss at `yhat`.
    fn gradient(&self, y: &[f64], yhat: &[f64], sample_weight: Option<&[f64]>) -> (Vec<f64>, Vec<f64>);
    /// Constant raw score minimizing the loss.
    fn initial_value(&self, y: &[f64], sample_weight: Option<&[f64]>) -> f64;
    /// Map a raw score onto the scale of the target.
    fn transform(&self, raw: f64) -> f64;
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy)]
pub struct LogLoss {}

impl ObjectiveFunction for LogLoss {
    #[inline]
    fn loss(&self, y: &[f64], yhat: &[f64], sample_weight: Option<&[f64]>) -> Vec<f64> {
        y.iter()
            .zip(yhat)
            .enumerate()
            .map(|(i, (y_, yhat_))| {
                let p = sigmoid(*yhat_).clamp(1e-15, 1.0 - 1e-15);
                let l = -(*y_ * p.ln() + (1.0 - *y_) * (1.0 - p).ln());
                sample_weight.map_or(l, |w| l * w[i])
            })
            .collect()
    }

    #[inline]
    fn gradient(&self, y: &[f64], yhat: &[f64], sample_weight: Option<&[f64]>) -> (Vec<f64>, Vec<f64>) {
        y.iter()
            .zip(yhat)
            .enumerate()
            .map(|(i, (y_, yhat_))| {
                let p = sigmoid(*yhat_);
                let w = sample_weight.map_or(1.0, |w| w[i]);
                ((p - *y_) * w, p * (1.0 - p) * w)
            })
            .unzip()
    }

    #[inline]
    fn initial_value(&self, y: &[f64], sample_weight: Option<&[f64]>) -> f64 {
        let (ytot, ntot) = match sample_weight {
            Some(sample_weight) => y
                .iter()
                .zip(sample_weight)
                .fold((0.0, 0.0), |(yt, nt), (y_, w_)| (yt + y_ * w_, nt + w_)),
            None => (y.iter().sum(), y.len() as f64),
        };
        if ntot <= 0.0 {
            return 0.0;
        }
        // A single-class target would give an infinite log-odds.
        let p = (ytot / ntot).clamp(1e-6, 1.0 - 1e-6);
        (p / (1.0 - p)).ln()
    }

    fn transform(&self, raw: f64) -> f64 {
        sigmoid(raw)
    }
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy)]
pub struct SquaredLoss {}

impl ObjectiveFunction for SquaredLoss {
    #[inline]
    fn loss(&self, y: &[f64], yhat: &[f64], sample_weight: Option<&[f64]>) -> Vec<f64> {
        y.iter()
            .zip(yhat)
            .enumerate()
            .map(|(i, (y_, yhat_))| {
                let s = *y_ - *yhat_;
                sample_weight.map_or(s * s, |w| s * s * w[i])
            })
            .collect()
    }

    #[inline]
    fn gradient(&self, y: &[f64], yhat: &[f64], sample_weight: Option<&[f64]>) -> (Vec<f64>, Vec<f64>) {
        y.iter()
            .zip(yhat)
            .enumerate()
            .map(|(i, (y_, yhat_))| {
                let w = sample_weight.map_or(1.0, |w| w[i]);
                ((*yhat_ - *y_) * w, w)
            })
            .unzip()
    }

    #[inline]
    fn initial_value(&self, y: &[f64], sample_weight: Option<&[f64]>) -> f64 {
        let (ytot, ntot) = match sample_weight {
            Some(sample_weight) => y
                .iter()
                .zip(sample_weight)
                .fold((0.0, 0.0), |(yt, nt), (y_, w_)| (yt + y_ * w_, nt + w_)),
            None => (y.iter().sum(), y.len() as f64),
        };
        if ntot <= 0.0 {
            0.0
        } else {
            ytot / ntot
        }
    }

    fn transform(&self, raw: f64) -> f64 {
        raw
    }
}

/// Objective a booster is trained with.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    LogLoss,
    SquaredLoss,
}

impl ObjectiveFunction for Objective {
    fn loss(&self, y: &[f64], yhat: &[f64], sample_weight: Option<&[f64]>) -> Vec<f64> {
        match self {
            Objective::LogLoss => LogLoss::default().loss(y, yhat, sample_weight),
            Objective::SquaredLoss => SquaredLoss::default().loss(y, yhat, sample_weight),
        }
    }

    fn gradient(&self, y: &[f64], yhat: &[f64], sample_weight: Option<&[f64]>) -> (Vec<f64>, Vec<f64>) {
        match self {
            Objective::LogLoss => LogLoss::default().gradient(y, yhat, sample_weight),
            Objective::SquaredLoss => SquaredLoss::default().gradient(y, yhat, sample_weight),
        }
    }

    fn initial_value(&self, y: &[f64], sample_weight: Option<&[f64]>) -> f64 {
        match self {
            Objective::LogLoss => LogLoss::default().initial_value(y, sample_weight),
            Objective::SquaredLoss => SquaredLoss::default().initial_value(y, sample_weight),
        }
    }

    fn transform(&self, raw: f64) -> f64 {
        match self {
            Objective::LogLoss => LogLoss::default().transform(raw),
            Objective::SquaredLoss => SquaredLoss::default().transform(raw),
        }
    }
}

impl FromStr for Objective {
    type Err = CausalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LogLoss" => Ok(Objective::LogLoss),
            "SquaredLoss" => Ok(Objective::SquaredLoss),
            _ => Err(CausalError::ParseString(
                s.to_string(),
                "Objective".to_string(),
                items_to_strings(vec!["LogLoss", "SquaredLoss"]),
            )),
        }
    }
}
