use do_core::errors::ErrorInfo;
use do_core::DoError;
use serde::{Deserialize, Serialize};

/// Whether the fitted disruption model survives between `sample` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// Fit, sample and discard on every call. Draws share nothing but the
    /// dataset.
    #[default]
    Stateless,
    /// Fit once and reuse the model until `reset` or an adjustment-set change.
    /// Repeated draws then only differ in the resampling step.
    Stateful,
}

/// YAML-configurable parameters governing a do-sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Keep the observed treatment column instead of selecting the requested
    /// level. Confounding is then corrected by the weights alone.
    #[serde(default)]
    pub keep_original_treatment: bool,
    /// Default execution mode for `sample`.
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Propensity model settings.
    #[serde(default)]
    pub propensity: PropensityConfig,
    /// Number of rows drawn per interventional sample.
    #[serde(default)]
    pub resample_size: ResampleSize,
    /// Master seed and label.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Accept estimands that ignore possible unobserved confounding.
    #[serde(default)]
    pub proceed_when_unidentifiable: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            keep_original_treatment: false,
            mode: ExecutionMode::default(),
            propensity: PropensityConfig::default(),
            resample_size: ResampleSize::default(),
            seed_policy: SeedPolicy::default(),
            proceed_when_unidentifiable: false,
        }
    }
}

impl SamplerConfig {
    /// Parses and validates a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, DoError> {
        let config: SamplerConfig = serde_yaml::from_str(yaml).map_err(|err| {
            DoError::Serde(ErrorInfo::new("config-parse", err.to_string()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration to YAML.
    pub fn to_yaml_string(&self) -> Result<String, DoError> {
        serde_yaml::to_string(self)
            .map_err(|err| DoError::Serde(ErrorInfo::new("config-serialize", err.to_string())))
    }

    /// Rejects settings the sampler cannot honour.
    pub fn validate(&self) -> Result<(), DoError> {
        let p = &self.propensity;
        if !(p.epsilon > 0.0 && p.epsilon < 1.0) {
            return Err(invalid("propensity.epsilon", p.epsilon.to_string(), "must lie in (0, 1)"));
        }
        if !(p.ridge >= 0.0 && p.ridge.is_finite()) {
            return Err(invalid("propensity.ridge", p.ridge.to_string(), "must be finite and >= 0"));
        }
        if p.max_iterations == 0 {
            return Err(invalid("propensity.max_iterations", "0".into(), "must be positive"));
        }
        if !(p.tolerance > 0.0) {
            return Err(invalid("propensity.tolerance", p.tolerance.to_string(), "must be positive"));
        }
        if let ResampleSize::Fixed { rows: 0 } = self.resample_size {
            return Err(invalid("resample_size.rows", "0".into(), "must be positive"));
        }
        Ok(())
    }
}

fn invalid(field: &str, value: String, reason: &str) -> DoError {
    DoError::Serde(
        ErrorInfo::new("config-invalid", format!("{field} {reason}"))
            .with_context("field", field)
            .with_context("value", value),
    )
}

/// Settings for the propensity (disruption) model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropensityConfig {
    /// Lower clip applied to predicted probabilities of the observed
    /// treatment. A zero probability would make the inverse weight infinite;
    /// clipping at `epsilon` caps any single row's weight at `1 / epsilon`,
    /// trading a small bias for bounded variance. Default `1e-6`.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    /// L2 penalty on the logistic coefficients. Keeps Newton steps finite
    /// under (quasi-)separation.
    #[serde(default = "default_ridge")]
    pub ridge: f64,
    /// Maximum Newton iterations before the fit is reported as failed.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Convergence threshold on the largest coefficient update.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_epsilon() -> f64 {
    1e-6
}

fn default_ridge() -> f64 {
    1e-6
}

fn default_max_iterations() -> usize {
    100
}

fn default_tolerance() -> f64 {
    1e-8
}

impl Default for PropensityConfig {
    fn default() -> Self {
        Self {
            epsilon: default_epsilon(),
            ridge: default_ridge(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
        }
    }
}

/// Size of each interventional resample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ResampleSize {
    /// As many rows as survived the effectiveness stage.
    #[default]
    Filtered,
    /// As many rows as the original dataset.
    Dataset,
    /// A fixed number of rows.
    Fixed {
        /// Rows to draw.
        rows: usize,
    },
}

impl ResampleSize {
    /// Resolves the draw count for the given eligible and dataset sizes.
    pub fn resolve(&self, eligible_rows: usize, dataset_rows: usize) -> usize {
        match self {
            ResampleSize::Filtered => eligible_rows,
            ResampleSize::Dataset => dataset_rows,
            ResampleSize::Fixed { rows } => *rows,
        }
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed from which every draw's substream is derived.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional free-form label recorded alongside the seed.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x0D05_A3B1_E5EE_D001_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}
