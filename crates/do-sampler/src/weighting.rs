//! Propensity-weighting realisation of the three intervention stages.

use do_core::errors::ErrorInfo;
use do_core::{DoError, Frame, RngHandle};
use tracing::debug;

use crate::intervention::ResolvedIntervention;
use crate::propensity::PropensityModel;
use crate::resample::Weights;
use crate::strategy::{
    EffectiveFrame, InterventionStrategy, InterventionalSample, SampleDiagnostics,
    SamplingContext,
};

/// Do-sampler strategy that never builds a generative model.
///
/// * disrupt: fit the propensity of each row's observed treatment stratum;
/// * make effective: keep the rows already in the requested stratum (or all
///   rows when the original treatment is kept);
/// * propagate: resample those rows with probability proportional to the
///   inverse propensity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeightingSampler;

impl WeightingSampler {
    /// Creates the strategy.
    pub fn new() -> Self {
        Self
    }
}

impl InterventionStrategy for WeightingSampler {
    type Model = PropensityModel;

    fn disrupt_causes(
        &self,
        working: &Frame,
        ctx: &SamplingContext,
    ) -> Result<PropensityModel, DoError> {
        debug!(
            rows = working.n_rows(),
            adjustment_set = ?ctx.adjustment_set,
            "disrupting causes"
        );
        PropensityModel::fit(
            working,
            &ctx.treatments,
            &ctx.adjustment_set,
            &ctx.propensity,
        )
    }

    fn make_treatment_effective(
        &self,
        working: &Frame,
        _model: &PropensityModel,
        intervention: &ResolvedIntervention,
        ctx: &SamplingContext,
    ) -> Result<EffectiveFrame, DoError> {
        if ctx.keep_original_treatment {
            debug!("keeping original treatment");
            return Ok(EffectiveFrame {
                frame: working.clone(),
                rows: (0..working.n_rows()).collect(),
            });
        }
        let target = match intervention {
            ResolvedIntervention::Scalar(target) => target,
            ResolvedIntervention::PerRow(_) => {
                return Err(DoError::InvalidIntervention(
                    ErrorInfo::new(
                        "vector-intervention",
                        "per-row interventions require keep_original_treatment",
                    )
                    .with_context("treatments", ctx.treatments.join(",")),
                ))
            }
            ResolvedIntervention::KeepOriginal => {
                return Err(DoError::InvalidIntervention(ErrorInfo::new(
                    "missing-intervention",
                    "no intervention given while the treatment is not kept",
                )))
            }
        };

        let mut rows = Vec::new();
        for row in 0..working.n_rows() {
            if working.row_tuple(&ctx.treatments, row)? == *target {
                rows.push(row);
            }
        }
        debug!(
            target = ?target,
            eligible = rows.len(),
            rows = working.n_rows(),
            "selected treatment stratum"
        );
        Ok(EffectiveFrame {
            frame: working.select_rows(&rows)?,
            rows,
        })
    }

    fn propagate(
        &self,
        effective: &EffectiveFrame,
        model: &PropensityModel,
        ctx: &SamplingContext,
        rng: &mut RngHandle,
    ) -> Result<InterventionalSample, DoError> {
        let scores = model.observed_scores();
        let eligible = effective
            .rows
            .iter()
            .map(|&row| {
                scores.get(row).copied().ok_or_else(|| {
                    DoError::DegenerateWeights(
                        ErrorInfo::new("unscored-row", "row has no propensity score")
                            .with_context("row", row.to_string()),
                    )
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;
        let weights = Weights::inverse_propensity(&eligible)?;
        let size = ctx
            .resample_size
            .resolve(effective.rows.len(), ctx.dataset_rows);
        let picks = weights.resample(size, rng)?;
        let frame = effective.frame.select_rows(&picks)?;

        let diagnostics = SampleDiagnostics {
            working_rows: scores.len(),
            eligible_rows: effective.rows.len(),
            drawn_rows: frame.n_rows(),
            clipped_rows: effective
                .rows
                .iter()
                .filter(|&&row| model.was_clipped(row))
                .count(),
            effective_sample_size: weights.effective_sample_size(),
            max_weight: weights.max_weight(),
            disruption_reused: false,
        };
        debug!(
            drawn = diagnostics.drawn_rows,
            effective_sample_size = diagnostics.effective_sample_size,
            "propagated interventional sample"
        );
        Ok(InterventionalSample { frame, diagnostics })
    }
}
