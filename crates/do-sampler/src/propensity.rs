//! Propensity estimation for the weighting sampler's disruption stage.
//!
//! The treatment stratum of a row is the tuple of its treatment levels. A
//! multinomial logistic regression of stratum on the adjustment set gives,
//! for every row, the probability of the stratum it was actually observed
//! in. Binary treatment is the two-stratum case.

use std::cmp::Ordering;

use do_core::errors::ErrorInfo;
use do_core::{DoError, Frame, VariableType};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{info, trace, warn};

use crate::config::PropensityConfig;

fn fit_error(code: &str, message: impl Into<String>) -> DoError {
    DoError::Disruption(ErrorInfo::new(code, message.into()))
}

fn cmp_tuple(a: &[f64], b: &[f64]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.total_cmp(y))
        .find(|ordering| ordering.is_ne())
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

/// Distinct treatment strata observed in the fit data, sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentLevels {
    strata: Vec<Vec<f64>>,
}

impl TreatmentLevels {
    fn observe(tuples: &[Vec<f64>]) -> Self {
        let mut strata = tuples.to_vec();
        strata.sort_by(|a, b| cmp_tuple(a, b));
        strata.dedup();
        Self { strata }
    }

    /// Index of a stratum, if it was observed.
    pub fn index_of(&self, tuple: &[f64]) -> Option<usize> {
        self.strata
            .binary_search_by(|probe| cmp_tuple(probe, tuple))
            .ok()
    }

    /// Observed strata.
    pub fn strata(&self) -> &[Vec<f64>] {
        &self.strata
    }

    /// Number of strata.
    pub fn len(&self) -> usize {
        self.strata.len()
    }

    /// Returns true when no stratum was observed.
    pub fn is_empty(&self) -> bool {
        self.strata.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Encoding {
    Standardized { mean: f64, scale: f64 },
    Raw,
    /// Indicator per level, the first level being the baseline.
    OneHot { levels: Vec<f64> },
}

impl Encoding {
    fn width(&self) -> usize {
        match self {
            Encoding::Standardized { .. } | Encoding::Raw => 1,
            Encoding::OneHot { levels } => levels.len(),
        }
    }
}

/// Column encodings turning the adjustment set into a design matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignSpec {
    columns: Vec<(String, Encoding)>,
}

impl DesignSpec {
    fn from_frame(frame: &Frame, adjustment_set: &[String]) -> Result<Self, DoError> {
        let mut columns = Vec::with_capacity(adjustment_set.len());
        for name in adjustment_set {
            let column = frame.column(name)?;
            let encoding = match column.kind() {
                VariableType::Continuous => {
                    let n = column.len().max(1) as f64;
                    let mean = column.values().iter().sum::<f64>() / n;
                    let var = column
                        .values()
                        .iter()
                        .map(|value| (value - mean).powi(2))
                        .sum::<f64>()
                        / n;
                    let scale = if var > 0.0 { var.sqrt() } else { 1.0 };
                    Encoding::Standardized { mean, scale }
                }
                VariableType::Binary => Encoding::Raw,
                VariableType::Categorical => {
                    let levels = column.levels();
                    Encoding::OneHot {
                        levels: levels.into_iter().skip(1).collect(),
                    }
                }
            };
            columns.push((name.clone(), encoding));
        }
        Ok(Self { columns })
    }

    /// Number of design columns, intercept included.
    pub fn width(&self) -> usize {
        1 + self
            .columns
            .iter()
            .map(|(_, encoding)| encoding.width())
            .sum::<usize>()
    }

    /// Builds the design matrix for `frame`. Categorical levels unseen at fit
    /// time fall into the baseline.
    pub fn build(&self, frame: &Frame) -> Result<DMatrix<f64>, DoError> {
        let mut design = DMatrix::<f64>::zeros(frame.n_rows(), self.width());
        design.column_mut(0).fill(1.0);
        let mut offset = 1;
        for (name, encoding) in &self.columns {
            let values = frame.column(name)?.values();
            match encoding {
                Encoding::Standardized { mean, scale } => {
                    for (row, value) in values.iter().enumerate() {
                        design[(row, offset)] = (value - mean) / scale;
                    }
                }
                Encoding::Raw => {
                    for (row, value) in values.iter().enumerate() {
                        design[(row, offset)] = *value;
                    }
                }
                Encoding::OneHot { levels } => {
                    for (row, value) in values.iter().enumerate() {
                        if let Some(level) = levels.iter().position(|level| level == value) {
                            design[(row, offset + level)] = 1.0;
                        }
                    }
                }
            }
            offset += encoding.width();
        }
        Ok(design)
    }
}

/// Fitted propensity model over the working frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PropensityModel {
    treatments: Vec<String>,
    levels: TreatmentLevels,
    design: DesignSpec,
    /// `width x (strata - 1)`; column `k` holds the logit of stratum `k + 1`
    /// against stratum 0.
    coefficients: DMatrix<f64>,
    observed_scores: Vec<f64>,
    clipped_rows: Vec<bool>,
    iterations: usize,
}

impl PropensityModel {
    /// Fits the model and scores every row of `frame`.
    ///
    /// Treatments must be binary or categorical. Probabilities of the observed
    /// stratum are clipped below at `config.epsilon`.
    pub fn fit(
        frame: &Frame,
        treatments: &[String],
        adjustment_set: &[String],
        config: &PropensityConfig,
    ) -> Result<Self, DoError> {
        for treatment in treatments {
            let kind = frame.column(treatment)?.kind();
            if !kind.is_discrete() {
                return Err(DoError::UnsupportedVariableType(
                    ErrorInfo::new(
                        "continuous-treatment",
                        "propensity weighting needs a binary or categorical treatment",
                    )
                    .with_context("column", treatment.clone())
                    .with_context("type", kind.as_str()),
                ));
            }
        }
        if frame.n_rows() == 0 {
            return Err(fit_error("empty-frame", "no rows to fit the propensity model on"));
        }

        let tuples = (0..frame.n_rows())
            .map(|row| frame.row_tuple(treatments, row))
            .collect::<Result<Vec<_>, _>>()?;
        let levels = TreatmentLevels::observe(&tuples);
        let labels: Vec<usize> = tuples
            .iter()
            .map(|tuple| levels.index_of(tuple).unwrap_or(0))
            .collect();

        let design = DesignSpec::from_frame(frame, adjustment_set)?;
        let x = design.build(frame)?;
        let (coefficients, iterations) = newton_multinomial(&x, &labels, levels.len(), config)?;

        let probabilities = softmax(&x, &coefficients, levels.len());
        let mut observed_scores = Vec::with_capacity(labels.len());
        let mut clipped_rows = Vec::with_capacity(labels.len());
        for (row, &label) in labels.iter().enumerate() {
            let p = probabilities[(row, label)];
            let clipped = !(p >= config.epsilon);
            clipped_rows.push(clipped);
            observed_scores.push(if clipped { config.epsilon } else { p });
        }
        let clipped = clipped_rows.iter().filter(|&&c| c).count();
        if clipped > 0 {
            warn!(
                clipped,
                epsilon = config.epsilon,
                "propensity scores clipped to epsilon"
            );
        }
        info!(
            strata = levels.len(),
            covariates = adjustment_set.len(),
            iterations,
            "fitted propensity model"
        );

        Ok(Self {
            treatments: treatments.to_vec(),
            levels,
            design,
            coefficients,
            observed_scores,
            clipped_rows,
            iterations,
        })
    }

    /// Predicted stratum probabilities for each row of `frame` (rows x strata).
    pub fn predict_proba(&self, frame: &Frame) -> Result<DMatrix<f64>, DoError> {
        let x = self.design.build(frame)?;
        Ok(softmax(&x, &self.coefficients, self.levels.len()))
    }

    /// Clipped probability of the observed stratum, per fit row.
    pub fn observed_scores(&self) -> &[f64] {
        &self.observed_scores
    }

    /// Whether the fit row's score was clipped.
    pub fn was_clipped(&self, row: usize) -> bool {
        self.clipped_rows.get(row).copied().unwrap_or(false)
    }

    /// Observed treatment strata.
    pub fn levels(&self) -> &TreatmentLevels {
        &self.levels
    }

    /// Treatment columns the strata are built from.
    pub fn treatments(&self) -> &[String] {
        &self.treatments
    }

    /// Logistic coefficients (`design width x (strata - 1)`).
    pub fn coefficients(&self) -> &DMatrix<f64> {
        &self.coefficients
    }

    /// Newton iterations used by the fit.
    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

fn softmax(x: &DMatrix<f64>, coefficients: &DMatrix<f64>, strata: usize) -> DMatrix<f64> {
    let n = x.nrows();
    let mut probabilities = DMatrix::<f64>::zeros(n, strata);
    if strata <= 1 {
        probabilities.fill(1.0);
        return probabilities;
    }
    let logits = x * coefficients;
    for row in 0..n {
        let max = (0..strata - 1)
            .map(|k| logits[(row, k)])
            .fold(0.0_f64, f64::max);
        let base = (-max).exp();
        let mut total = base;
        for k in 0..strata - 1 {
            total += (logits[(row, k)] - max).exp();
        }
        probabilities[(row, 0)] = base / total;
        for k in 0..strata - 1 {
            probabilities[(row, k + 1)] = (logits[(row, k)] - max).exp() / total;
        }
    }
    probabilities
}

fn penalized_log_likelihood(
    x: &DMatrix<f64>,
    coefficients: &DMatrix<f64>,
    labels: &[usize],
    strata: usize,
    ridge: f64,
) -> f64 {
    let probabilities = softmax(x, coefficients, strata);
    let log_lik: f64 = labels
        .iter()
        .enumerate()
        .map(|(row, &label)| probabilities[(row, label)].max(f64::MIN_POSITIVE).ln())
        .sum();
    log_lik - 0.5 * ridge * coefficients.norm_squared()
}

/// Newton-Raphson on the ridge-penalised multinomial log-likelihood with
/// step halving. Returns the coefficients and the iteration count.
fn newton_multinomial(
    x: &DMatrix<f64>,
    labels: &[usize],
    strata: usize,
    config: &PropensityConfig,
) -> Result<(DMatrix<f64>, usize), DoError> {
    let p = x.ncols();
    let m = strata.saturating_sub(1);
    let mut coefficients = DMatrix::<f64>::zeros(p, m);
    if m == 0 {
        return Ok((coefficients, 0));
    }
    let dim = p * m;
    let mut objective = penalized_log_likelihood(x, &coefficients, labels, strata, config.ridge);

    for iteration in 1..=config.max_iterations {
        let probabilities = softmax(x, &coefficients, strata);

        let mut gradient = DVector::<f64>::zeros(dim);
        let mut hessian = DMatrix::<f64>::identity(dim, dim) * config.ridge;
        for (row, &label) in labels.iter().enumerate() {
            let features = x.row(row);
            for a in 0..m {
                let p_a = probabilities[(row, a + 1)];
                let residual = if label == a + 1 { 1.0 } else { 0.0 } - p_a;
                for r in 0..p {
                    gradient[a * p + r] += features[r] * residual;
                }
                for b in 0..m {
                    let delta = if a == b { 1.0 } else { 0.0 };
                    let w = p_a * (delta - probabilities[(row, b + 1)]);
                    if w == 0.0 {
                        continue;
                    }
                    for r in 0..p {
                        let wr = w * features[r];
                        for c in 0..p {
                            hessian[(a * p + r, b * p + c)] += wr * features[c];
                        }
                    }
                }
            }
        }
        for a in 0..m {
            for r in 0..p {
                gradient[a * p + r] -= config.ridge * coefficients[(r, a)];
            }
        }

        let step = hessian
            .cholesky()
            .ok_or_else(|| {
                DoError::Disruption(
                    ErrorInfo::new("singular-hessian", "propensity Hessian is not positive definite")
                        .with_context("iteration", iteration.to_string())
                        .with_hint("increase propensity.ridge or drop collinear covariates"),
                )
            })?
            .solve(&gradient);
        if !step.iter().all(|value| value.is_finite()) {
            return Err(fit_error("non-finite-step", "Newton step is not finite"));
        }

        let Some((candidate, candidate_objective, scale)) =
            halving_search(x, &coefficients, &step, labels, strata, config.ridge, objective)
        else {
            // No halving improves the objective: the previous coefficients
            // stay. That only counts as convergence when the full Newton
            // step is already at rounding level.
            let full_update = step.amax();
            trace!(iteration, objective, full_update, "step halving stalled");
            if full_update <= config.tolerance.sqrt() {
                return Ok((coefficients, iteration));
            }
            return Err(DoError::Disruption(
                ErrorInfo::new("line-search-stalled", "no Newton step improves the fit")
                    .with_context("iteration", iteration.to_string())
                    .with_context("step", full_update.to_string())
                    .with_hint("increase propensity.ridge or drop collinear covariates"),
            ));
        };

        let max_update = step.amax() * scale;
        trace!(iteration, objective = candidate_objective, max_update, "newton step");
        coefficients = candidate;
        objective = candidate_objective;
        if max_update <= config.tolerance {
            return Ok((coefficients, iteration));
        }
    }

    Err(DoError::Disruption(
        ErrorInfo::new("not-converged", "propensity fit did not converge")
            .with_context("max_iterations", config.max_iterations.to_string())
            .with_hint("raise propensity.max_iterations or propensity.ridge"),
    ))
}

/// Halves `step` until the penalized objective does not decrease.
///
/// Returns the candidate, its objective and the accepted scale, or `None`
/// when thirty halvings all make the fit worse.
fn halving_search(
    x: &DMatrix<f64>,
    coefficients: &DMatrix<f64>,
    step: &DVector<f64>,
    labels: &[usize],
    strata: usize,
    ridge: f64,
    objective: f64,
) -> Option<(DMatrix<f64>, f64, f64)> {
    let (p, m) = coefficients.shape();
    let mut scale = 1.0;
    for _ in 0..30 {
        let mut candidate = coefficients.clone();
        for a in 0..m {
            for r in 0..p {
                candidate[(r, a)] += scale * step[a * p + r];
            }
        }
        let candidate_objective = penalized_log_likelihood(x, &candidate, labels, strata, ridge);
        if candidate_objective >= objective {
            return Some((candidate, candidate_objective, scale));
        }
        scale *= 0.5;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use do_core::{Column, RngHandle};

    fn logistic_frame(n: usize, seed: u64) -> Frame {
        let mut rng = RngHandle::from_seed(seed);
        let mut z = Vec::with_capacity(n);
        let mut d = Vec::with_capacity(n);
        for _ in 0..n {
            let zi = rng.standard_normal();
            let p = 1.0 / (1.0 + (-(0.5 + 1.5 * zi)).exp());
            z.push(zi);
            d.push(rng.bernoulli(p));
        }
        Frame::new(vec![
            Column::continuous("z", z).unwrap(),
            Column::binary("d", d).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn recovers_logistic_slope() {
        let frame = logistic_frame(4000, 3);
        let model = PropensityModel::fit(
            &frame,
            &["d".to_string()],
            &["z".to_string()],
            &PropensityConfig::default(),
        )
        .unwrap();
        let scale = match &model.design.columns[0].1 {
            Encoding::Standardized { scale, .. } => *scale,
            other => panic!("unexpected encoding {other:?}"),
        };
        let slope = model.coefficients()[(1, 0)] / scale;
        assert!((slope - 1.5).abs() < 0.2, "slope {slope}");
        assert!(model.iterations() > 0);
    }

    #[test]
    fn probabilities_sum_to_one() {
        let frame = logistic_frame(200, 8);
        let model = PropensityModel::fit(
            &frame,
            &["d".to_string()],
            &["z".to_string()],
            &PropensityConfig::default(),
        )
        .unwrap();
        let probabilities = model.predict_proba(&frame).unwrap();
        for row in 0..frame.n_rows() {
            let total: f64 = probabilities.row(row).iter().sum();
            assert!((total - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn single_stratum_scores_one() {
        let frame = Frame::new(vec![
            Column::continuous("z", vec![0.1, 0.2, 0.3]).unwrap(),
            Column::binary("d", vec![1.0, 1.0, 1.0]).unwrap(),
        ])
        .unwrap();
        let model = PropensityModel::fit(
            &frame,
            &["d".to_string()],
            &["z".to_string()],
            &PropensityConfig::default(),
        )
        .unwrap();
        assert_eq!(model.observed_scores(), &[1.0, 1.0, 1.0]);
        assert_eq!(model.iterations(), 0);
    }

    #[test]
    fn strata_lookup_is_order_independent() {
        let levels = TreatmentLevels::observe(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0]]);
        assert_eq!(levels.len(), 2);
        assert_eq!(levels.index_of(&[0.0, 1.0]), Some(0));
        assert_eq!(levels.index_of(&[1.0, 0.0]), Some(1));
        assert_eq!(levels.index_of(&[1.0, 1.0]), None);
    }

    fn binary_fit_inputs(frame: &Frame) -> (DMatrix<f64>, Vec<usize>) {
        let design = DesignSpec::from_frame(frame, &["z".to_string()]).unwrap();
        let x = design.build(frame).unwrap();
        let labels = frame
            .column("d")
            .unwrap()
            .values()
            .iter()
            .map(|&value| value as usize)
            .collect();
        (x, labels)
    }

    #[test]
    fn halving_keeps_coefficients_when_every_step_is_worse() {
        let frame = logistic_frame(200, 5);
        let (x, labels) = binary_fit_inputs(&frame);
        let start = DMatrix::<f64>::zeros(2, 1);
        let objective = penalized_log_likelihood(&x, &start, &labels, 2, 1e-6);

        // The slope is positive, so moving it down only lowers the likelihood.
        let downhill = DVector::from_vec(vec![0.0, -1.0]);
        assert!(halving_search(&x, &start, &downhill, &labels, 2, 1e-6, objective).is_none());

        let uphill = DVector::from_vec(vec![0.0, 1.0]);
        let (candidate, improved, scale) =
            halving_search(&x, &start, &uphill, &labels, 2, 1e-6, objective).unwrap();
        assert!(improved >= objective);
        assert!(scale > 0.0);
        assert!(candidate[(1, 0)] > 0.0);
    }
}
