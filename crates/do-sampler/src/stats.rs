//! Downstream statistics over interventional samples.

use do_core::errors::ErrorInfo;
use do_core::{DoError, Frame};
use serde::{Deserialize, Serialize};

/// Arithmetic mean, `NaN` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean of `column`, optionally restricted to rows where `given == level`.
pub fn conditional_mean(
    frame: &Frame,
    column: &str,
    given: Option<(&str, f64)>,
) -> Result<f64, DoError> {
    let values = frame.column(column)?.values();
    let Some((given, level)) = given else {
        return Ok(mean(values));
    };
    let condition = frame.column(given)?.values();
    let selected: Vec<f64> = values
        .iter()
        .zip(condition)
        .filter(|(_, c)| **c == level)
        .map(|(&v, _)| v)
        .collect();
    if selected.is_empty() {
        return Err(DoError::DegenerateWeights(
            ErrorInfo::new("empty-condition", "no rows satisfy the condition")
                .with_context("column", given)
                .with_context("level", level.to_string()),
        ));
    }
    Ok(mean(&selected))
}

/// `E[outcome | treatment = high] - E[outcome | treatment = low]` within `frame`.
///
/// On observational data this is the naive, possibly confounded contrast.
pub fn mean_contrast(
    frame: &Frame,
    outcome: &str,
    treatment: &str,
    high: f64,
    low: f64,
) -> Result<f64, DoError> {
    Ok(conditional_mean(frame, outcome, Some((treatment, high)))?
        - conditional_mean(frame, outcome, Some((treatment, low)))?)
}

/// Quantile summary of a sampling distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantiles {
    /// 5th percentile estimate.
    pub q05: f64,
    /// Median (50th percentile) estimate.
    pub q50: f64,
    /// 95th percentile estimate.
    pub q95: f64,
}

impl Quantiles {
    /// Linear-interpolated quantiles; `NaN` entries for an empty slice.
    pub fn from_values(values: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Self {
            q05: percentile(&sorted, 0.05),
            q50: percentile(&sorted, 0.5),
            q95: percentile(&sorted, 0.95),
        }
    }
}

fn percentile(sorted: &[f64], quantile: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let position = quantile * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let weight = position - lower as f64;
        sorted[lower] * (1.0 - weight) + sorted[upper] * weight
    }
}
