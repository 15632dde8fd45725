#![deny(missing_docs)]
#![doc = include_str!("../docs/do-sampler-api.md")]

/// Convenience accessor attaching `do(...)` to frames.
pub mod accessor;
/// YAML configuration schema and defaults.
pub mod config;
/// Intervention assignments and their validation.
pub mod intervention;
/// Multinomial logistic propensity model for the disruption stage.
pub mod propensity;
/// Inverse-propensity weights and weighted resampling.
pub mod resample;
/// Orchestrator and state lifecycle.
pub mod sampler;
/// Summary statistics over interventional samples.
pub mod stats;
/// Stage interface implemented by sampling strategies.
pub mod strategy;
/// Propensity-weighting sampling strategy.
pub mod weighting;

pub use accessor::{CausalAccessExt, CausalAccessor};
pub use config::{ExecutionMode, PropensityConfig, ResampleSize, SamplerConfig, SeedPolicy};
pub use intervention::{Intervention, ResolvedIntervention};
pub use propensity::{PropensityModel, TreatmentLevels};
pub use resample::Weights;
pub use sampler::{DoSampler, SamplerPhase};
pub use strategy::{
    EffectiveFrame, InterventionStrategy, InterventionalSample, SampleDiagnostics,
    SamplingContext,
};
pub use weighting::WeightingSampler;
