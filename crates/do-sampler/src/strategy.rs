use std::fmt::Debug;

use do_core::{DoError, Frame, RngHandle};
use serde::{Deserialize, Serialize};

use crate::config::{PropensityConfig, ResampleSize};
use crate::intervention::ResolvedIntervention;

/// Read-only description of the causal question handed to every stage.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingContext {
    /// Treatment columns, in intervention order.
    pub treatments: Vec<String>,
    /// Outcome columns.
    pub outcomes: Vec<String>,
    /// Back-door adjustment set.
    pub adjustment_set: Vec<String>,
    /// Whether the observed treatment is retained.
    pub keep_original_treatment: bool,
    /// Propensity model settings.
    pub propensity: PropensityConfig,
    /// Resample size policy.
    pub resample_size: ResampleSize,
    /// Row count of the original dataset.
    pub dataset_rows: usize,
}

/// Output of the effectiveness stage.
///
/// `rows[i]` is the working-frame row that became row `i` of `frame`. The
/// working frame itself is never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveFrame {
    /// Rows eligible for propagation.
    pub frame: Frame,
    /// Working-frame index of every eligible row.
    pub rows: Vec<usize>,
}

/// Diagnostics recorded for one interventional draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleDiagnostics {
    /// Rows in the working frame.
    pub working_rows: usize,
    /// Rows that survived the effectiveness stage.
    pub eligible_rows: usize,
    /// Rows drawn into the sample.
    pub drawn_rows: usize,
    /// Eligible rows whose propensity was clipped to epsilon.
    pub clipped_rows: usize,
    /// Kish effective sample size of the normalized weights.
    pub effective_sample_size: f64,
    /// Largest normalized weight.
    pub max_weight: f64,
    /// Whether a previously fitted disruption model was reused.
    pub disruption_reused: bool,
}

/// An interventional sample together with its diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct InterventionalSample {
    /// Drawn rows, same schema as the dataset.
    pub frame: Frame,
    /// Draw diagnostics.
    pub diagnostics: SampleDiagnostics,
}

/// The three overridable stages of an interventional draw.
///
/// A strategy decides *how* each stage is realised (weighting, density
/// estimation, simulation); the orchestrator only sequences them and owns
/// the lifecycle of the fitted model.
pub trait InterventionStrategy {
    /// Auxiliary model produced by the disruption stage.
    type Model: Debug;

    /// Fits whatever neutralises the treatment's incoming edges.
    fn disrupt_causes(&self, working: &Frame, ctx: &SamplingContext)
        -> Result<Self::Model, DoError>;

    /// Applies (or bypasses) the intervention on a view of the working frame.
    fn make_treatment_effective(
        &self,
        working: &Frame,
        model: &Self::Model,
        intervention: &ResolvedIntervention,
        ctx: &SamplingContext,
    ) -> Result<EffectiveFrame, DoError>;

    /// Draws the interventional sample.
    fn propagate(
        &self,
        effective: &EffectiveFrame,
        model: &Self::Model,
        ctx: &SamplingContext,
        rng: &mut RngHandle,
    ) -> Result<InterventionalSample, DoError>;
}
