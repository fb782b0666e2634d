//! Matching
//!
//! Nearest-neighbour matching of treated and control rows on a score. The caliper is
//! expressed in standard deviations of the score over all rows.
use crate::errors::CausalError;
use crate::utils::{std_dev, validate_positive_float_parameter};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestNeighborMatch {
    /// Controls may be reused across treated rows.
    pub replace: bool,
    /// Controls matched to each treated row.
    pub ratio: usize,
    /// Maximum score distance, in standard deviations. `None` accepts any distance.
    pub caliper: Option<f64>,
    /// Visit treated rows in a seeded random order when matching without replacement.
    pub shuffle: bool,
    pub seed: u64,
}

impl Default for NearestNeighborMatch {
    fn default() -> Self {
        NearestNeighborMatch {
            replace: false,
            ratio: 1,
            caliper: Some(0.2),
            shuffle: true,
            seed: 42,
        }
    }
}

/// Rows kept by a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedRows {
    /// Matched treated rows, in the order they were matched.
    pub treated: Vec<usize>,
    /// Matched control rows. With replacement a control can appear more than once.
    pub control: Vec<usize>,
}

impl MatchedRows {
    /// Treated rows first, then their controls.
    pub fn rows(&self) -> Vec<usize> {
        self.treated.iter().chain(self.control.iter()).copied().collect()
    }
}

impl NearestNeighborMatch {
    pub fn new(replace: bool, ratio: usize, caliper: Option<f64>, seed: u64) -> Self {
        NearestNeighborMatch {
            replace,
            ratio,
            caliper,
            shuffle: true,
            seed,
        }
    }

    fn validate(&self) -> Result<(), CausalError> {
        if self.ratio == 0 {
            return Err(CausalError::InvalidParameter(
                "ratio".to_string(),
                "a value of at least 1".to_string(),
                self.ratio.to_string(),
            ));
        }
        if let Some(c) = self.caliper {
            validate_positive_float_parameter(c, "caliper")?;
        }
        Ok(())
    }

    /// Match treated rows (`treatment == 1`) to control rows (`treatment == 0`) on `score`.
    ///
    /// * `score` - Matching score of every row, usually the propensity.
    /// * `treatment` - 0/1 group of every row.
    pub fn match_rows(&self, score: &[f64], treatment: &[f64]) -> Result<MatchedRows, CausalError> {
        self.validate()?;
        if score.len() != treatment.len() {
            return Err(CausalError::MatchingFailed(format!(
                "{} scores for {} rows",
                score.len(),
                treatment.len()
            )));
        }
        let max_dist = match self.caliper {
            Some(c) => c * std_dev(score, 0),
            None => f64::INFINITY,
        };

        let mut treated: Vec<usize> = (0..score.len()).filter(|&i| treatment[i] == 1.0).collect();
        let controls: Vec<usize> = (0..score.len()).filter(|&i| treatment[i] == 0.0).collect();
        if treated.is_empty() || controls.is_empty() {
            return Err(CausalError::MatchingFailed(
                "both treated and control rows are required".to_string(),
            ));
        }

        let matched = if self.replace {
            self.match_with_replacement(score, &treated, &controls, max_dist)
        } else {
            if self.shuffle {
                let mut rng = StdRng::seed_from_u64(self.seed);
                treated.shuffle(&mut rng);
            }
            self.match_without_replacement(score, &treated, &controls, max_dist)
        };

        if matched.treated.is_empty() {
            return Err(CausalError::MatchingFailed(format!(
                "no treated row has a control within {} of its score",
                max_dist
            )));
        }
        Ok(matched)
    }

    fn match_with_replacement(&self, score: &[f64], treated: &[usize], controls: &[usize], max_dist: f64) -> MatchedRows {
        let mut out = MatchedRows {
            treated: Vec::new(),
            control: Vec::new(),
        };
        for &t in treated {
            let mut nearest: Vec<usize> = controls.to_vec();
            nearest.sort_by(|a, b| (score[*a] - score[t]).abs().total_cmp(&(score[*b] - score[t]).abs()));
            let picked: Vec<usize> = nearest
                .into_iter()
                .take(self.ratio)
                .filter(|c| (score[*c] - score[t]).abs() <= max_dist)
                .collect();
            if !picked.is_empty() {
                out.treated.push(t);
                out.control.extend(picked);
            }
        }
        out
    }

    fn match_without_replacement(
        &self,
        score: &[f64],
        treated: &[usize],
        controls: &[usize],
        max_dist: f64,
    ) -> MatchedRows {
        let mut available = vec![true; controls.len()];
        let mut out = MatchedRows {
            treated: Vec::new(),
            control: Vec::new(),
        };
        for &t in treated {
            let mut picked = Vec::with_capacity(self.ratio);
            for _ in 0..self.ratio {
                // Nearest unused control; ties keep the lowest row.
                let best = (0..controls.len())
                    .filter(|&k| available[k])
                    .map(|k| (k, (score[controls[k]] - score[t]).abs()))
                    .fold(None, |acc: Option<(usize, f64)>, (k, d)| match acc {
                        Some((_, bd)) if bd <= d => acc,
                        _ => Some((k, d)),
                    });
                match best {
                    Some((k, d)) if d <= max_dist => {
                        available[k] = false;
                        picked.push(controls[k]);
                    }
                    _ => break,
                }
            }
            if !picked.is_empty() {
                out.treated.push(t);
                out.control.extend(picked);
            }
        }
        out
    }
}
