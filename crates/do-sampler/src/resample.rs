//! Inverse-propensity weights and weighted resampling with replacement.

use do_core::errors::ErrorInfo;
use do_core::{DoError, RngHandle};
use rand::distributions::{Distribution, WeightedIndex};

/// Normalized inverse-propensity weights over the eligible rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Weights {
    normalized: Vec<f64>,
}

impl Weights {
    /// Builds `1 / score` weights normalized to sum to one.
    ///
    /// Fails with `DegenerateWeights` when there are no scores, when any
    /// weight is non-finite or negative, or when the total mass is zero.
    pub fn inverse_propensity(scores: &[f64]) -> Result<Self, DoError> {
        if scores.is_empty() {
            return Err(DoError::DegenerateWeights(
                ErrorInfo::new("empty-stratum", "no rows match the requested intervention")
                    .with_hint("the requested treatment level was never observed"),
            ));
        }
        let mut raw = Vec::with_capacity(scores.len());
        for (row, &score) in scores.iter().enumerate() {
            let weight = 1.0 / score;
            if !weight.is_finite() || weight < 0.0 {
                return Err(DoError::DegenerateWeights(
                    ErrorInfo::new("non-finite-weight", "inverse propensity weight is not finite")
                        .with_context("row", row.to_string())
                        .with_context("score", score.to_string()),
                ));
            }
            raw.push(weight);
        }
        let total: f64 = raw.iter().sum();
        if !(total > 0.0 && total.is_finite()) {
            return Err(DoError::DegenerateWeights(
                ErrorInfo::new("zero-weight-mass", "weights do not sum to a positive value")
                    .with_context("total", total.to_string()),
            ));
        }
        Ok(Self {
            normalized: raw.into_iter().map(|weight| weight / total).collect(),
        })
    }

    /// Selection probabilities, summing to one.
    pub fn normalized(&self) -> &[f64] {
        &self.normalized
    }

    /// Kish effective sample size `1 / sum(w^2)` of the normalized weights.
    pub fn effective_sample_size(&self) -> f64 {
        1.0 / self.normalized.iter().map(|w| w * w).sum::<f64>()
    }

    /// Largest normalized weight.
    pub fn max_weight(&self) -> f64 {
        self.normalized.iter().copied().fold(0.0, f64::max)
    }

    /// Draws `size` indices with replacement, proportional to the weights.
    pub fn resample(&self, size: usize, rng: &mut RngHandle) -> Result<Vec<usize>, DoError> {
        if size == 0 {
            return Err(DoError::DegenerateWeights(ErrorInfo::new(
                "empty-resample",
                "resample size must be positive",
            )));
        }
        let index = WeightedIndex::new(&self.normalized).map_err(|err| {
            DoError::DegenerateWeights(ErrorInfo::new("weighted-index", err.to_string()))
        })?;
        Ok((0..size).map(|_| index.sample(rng.inner_mut())).collect())
    }
}
