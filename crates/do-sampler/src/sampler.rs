use do_core::errors::ErrorInfo;
use do_core::{
    DoError, Frame, IdentificationProvider, IdentifiedEstimand, ObservationalDataset,
    RngHandle, RoleAssignment,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{ExecutionMode, SamplerConfig};
use crate::intervention::{Intervention, ResolvedIntervention};
use crate::strategy::{InterventionStrategy, InterventionalSample, SamplingContext};
use crate::weighting::WeightingSampler;

/// Position of the sampler in the disrupt / effective / propagate sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SamplerPhase {
    /// No fitted state.
    Uninitialized,
    /// Disruption model fitted.
    Disrupted,
    /// Intervention applied to a view of the working frame.
    Effective,
    /// Sample drawn; the fitted state is retained (stateful mode).
    Sampled,
}

/// Working frame and disruption model owned between stages.
#[derive(Debug)]
struct FittedState<M> {
    working: Frame,
    model: M,
    adjustment_set: Vec<String>,
}

/// Orchestrates interventional draws for a given strategy.
///
/// `sample` takes `&mut self`: a shared sampler has to be locked by the
/// caller, and independent stateless samplers can run on separate threads.
#[derive(Debug)]
pub struct DoSampler<S: InterventionStrategy> {
    dataset: ObservationalDataset,
    estimand: IdentifiedEstimand,
    config: SamplerConfig,
    strategy: S,
    fitted: Option<FittedState<S::Model>>,
    phase: SamplerPhase,
    draws: u64,
    disruption_runs: usize,
}

impl DoSampler<WeightingSampler> {
    /// Builds a propensity-weighting sampler.
    pub fn weighting(
        dataset: ObservationalDataset,
        estimand: IdentifiedEstimand,
        config: SamplerConfig,
    ) -> Result<Self, DoError> {
        Self::new(dataset, estimand, config, WeightingSampler::new())
    }
}

impl<S: InterventionStrategy> DoSampler<S> {
    /// Builds a sampler from an already identified estimand.
    pub fn new(
        dataset: ObservationalDataset,
        estimand: IdentifiedEstimand,
        config: SamplerConfig,
        strategy: S,
    ) -> Result<Self, DoError> {
        config.validate()?;
        check_estimand(&dataset, &estimand)?;
        if estimand.unobserved_confounding_ignored && !config.proceed_when_unidentifiable {
            return Err(DoError::Identification(
                ErrorInfo::new(
                    "unobserved-confounding",
                    "estimand ignores unobserved confounding",
                )
                .with_hint("set proceed_when_unidentifiable to accept it"),
            ));
        }
        Ok(Self {
            dataset,
            estimand,
            config,
            strategy,
            fitted: None,
            phase: SamplerPhase::Uninitialized,
            draws: 0,
            disruption_runs: 0,
        })
    }

    /// Builds a sampler, delegating identification to `provider`.
    pub fn identify_with<P>(
        dataset: ObservationalDataset,
        roles: &RoleAssignment,
        provider: &P,
        config: SamplerConfig,
        strategy: S,
    ) -> Result<Self, DoError>
    where
        P: IdentificationProvider + ?Sized,
    {
        let estimand = provider.identify(&dataset.schema(), roles)?;
        Self::new(dataset, estimand, config, strategy)
    }

    /// Draws an interventional sample in the configured mode.
    pub fn sample(&mut self, intervention: &Intervention) -> Result<Frame, DoError> {
        let mode = self.config.mode;
        self.sample_with_mode(intervention, mode)
    }

    /// Draws an interventional sample in an explicit mode.
    pub fn sample_with_mode(
        &mut self,
        intervention: &Intervention,
        mode: ExecutionMode,
    ) -> Result<Frame, DoError> {
        self.sample_detailed(intervention, mode)
            .map(|sample| sample.frame)
    }

    /// Draws an interventional sample and returns its diagnostics as well.
    pub fn sample_detailed(
        &mut self,
        intervention: &Intervention,
        mode: ExecutionMode,
    ) -> Result<InterventionalSample, DoError> {
        let resolved = intervention.resolve(
            &self.estimand.treatments,
            self.dataset.n_rows(),
            self.config.keep_original_treatment,
        )?;
        let ctx = self.context();
        let mut rng = RngHandle::for_draw(self.config.seed_policy.master_seed, self.draws);
        self.draws += 1;

        match mode {
            ExecutionMode::Stateless => {
                let state = self.disrupt(&ctx);
                let result = state.and_then(|state| {
                    run_stages(&self.strategy, &state, &resolved, &ctx, &mut rng, &mut self.phase)
                });
                self.reset();
                result
            }
            ExecutionMode::Stateful => {
                let (state, reused) = match self.fitted.take() {
                    Some(state) if state.adjustment_set == ctx.adjustment_set => {
                        debug!(draw = self.draws, "reusing fitted disruption model");
                        (state, true)
                    }
                    _ => {
                        self.phase = SamplerPhase::Uninitialized;
                        (self.disrupt(&ctx)?, false)
                    }
                };
                let result =
                    run_stages(&self.strategy, &state, &resolved, &ctx, &mut rng, &mut self.phase);
                self.fitted = Some(state);
                result.map(|mut sample| {
                    sample.diagnostics.disruption_reused = reused;
                    sample
                })
            }
        }
    }

    /// Repeats `sample` and collects `statistic` of every draw.
    ///
    /// The result approximates the sampling distribution of the statistic
    /// under the intervention. In stateful mode every repetition shares the
    /// fitted propensity model, so the spread reflects resampling noise only.
    /// Intervals read off this distribution are not guaranteed to have
    /// nominal coverage.
    pub fn sampling_distribution<F>(
        &mut self,
        intervention: &Intervention,
        repetitions: usize,
        mut statistic: F,
    ) -> Result<Vec<f64>, DoError>
    where
        F: FnMut(&Frame) -> Result<f64, DoError>,
    {
        let mut values = Vec::with_capacity(repetitions);
        for _ in 0..repetitions {
            let frame = self.sample(intervention)?;
            values.push(statistic(&frame)?);
        }
        Ok(values)
    }

    /// Discards the fitted model and working frame. Idempotent.
    ///
    /// The draw counter is kept, so draws after a reset still use fresh RNG
    /// substreams.
    pub fn reset(&mut self) {
        if self.fitted.take().is_some() {
            debug!("discarded fitted state");
        }
        self.phase = SamplerPhase::Uninitialized;
    }

    /// Replaces the estimand. A stateful model fitted on a different
    /// adjustment set is refitted on the next draw.
    pub fn update_estimand(&mut self, estimand: IdentifiedEstimand) -> Result<(), DoError> {
        check_estimand(&self.dataset, &estimand)?;
        if estimand.treatments != self.estimand.treatments {
            self.reset();
        }
        self.estimand = estimand;
        Ok(())
    }

    /// Current phase.
    pub fn phase(&self) -> SamplerPhase {
        self.phase
    }

    /// Number of times the disruption stage has run.
    pub fn disruption_runs(&self) -> usize {
        self.disruption_runs
    }

    /// Number of draws attempted so far.
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Fitted disruption model, present only in stateful mode between draws.
    pub fn fitted_model(&self) -> Option<&S::Model> {
        self.fitted.as_ref().map(|state| &state.model)
    }

    /// The immutable observational dataset.
    pub fn dataset(&self) -> &ObservationalDataset {
        &self.dataset
    }

    /// The identified estimand in use.
    pub fn estimand(&self) -> &IdentifiedEstimand {
        &self.estimand
    }

    /// Sampler configuration.
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    fn context(&self) -> SamplingContext {
        SamplingContext {
            treatments: self.estimand.treatments.clone(),
            outcomes: self.estimand.outcomes.clone(),
            adjustment_set: self.estimand.adjustment_set.clone(),
            keep_original_treatment: self.config.keep_original_treatment,
            propensity: self.config.propensity.clone(),
            resample_size: self.config.resample_size,
            dataset_rows: self.dataset.n_rows(),
        }
    }

    fn disrupt(&mut self, ctx: &SamplingContext) -> Result<FittedState<S::Model>, DoError> {
        let working = self.dataset.working_copy();
        let model = self.strategy.disrupt_causes(&working, ctx)?;
        self.disruption_runs += 1;
        self.phase = SamplerPhase::Disrupted;
        info!(runs = self.disruption_runs, "disruption stage complete");
        Ok(FittedState {
            working,
            model,
            adjustment_set: ctx.adjustment_set.clone(),
        })
    }
}

fn run_stages<S: InterventionStrategy>(
    strategy: &S,
    state: &FittedState<S::Model>,
    intervention: &ResolvedIntervention,
    ctx: &SamplingContext,
    rng: &mut RngHandle,
    phase: &mut SamplerPhase,
) -> Result<InterventionalSample, DoError> {
    let effective =
        strategy.make_treatment_effective(&state.working, &state.model, intervention, ctx)?;
    *phase = SamplerPhase::Effective;
    let sample = strategy.propagate(&effective, &state.model, ctx, rng)?;
    *phase = SamplerPhase::Sampled;
    Ok(sample)
}

fn check_estimand(
    dataset: &ObservationalDataset,
    estimand: &IdentifiedEstimand,
) -> Result<(), DoError> {
    estimand.validate_against(&dataset.schema())?;
    if let Some(overlap) = estimand
        .treatments
        .iter()
        .find(|name| estimand.adjustment_set.contains(name))
    {
        return Err(DoError::Identification(
            ErrorInfo::new("treatment-in-adjustment-set", "treatment cannot adjust for itself")
                .with_context("column", overlap.clone()),
        ));
    }
    Ok(())
}
