use std::collections::BTreeMap;

use do_core::{
    BackdoorIdentifier, Column, DoError, Frame, ObservationalDataset, RoleAssignment,
    VariableType,
};

use crate::config::{ExecutionMode, SamplerConfig};
use crate::intervention::Intervention;
use crate::sampler::DoSampler;
use crate::weighting::WeightingSampler;

/// Attaches interventional sampling to a [`Frame`].
pub trait CausalAccessExt {
    /// Returns an accessor drawing `do(...)` samples from this frame.
    fn causal(&self, roles: RoleAssignment) -> CausalAccessor;
}

impl CausalAccessExt for Frame {
    fn causal(&self, roles: RoleAssignment) -> CausalAccessor {
        CausalAccessor {
            frame: self.clone(),
            roles,
            config: SamplerConfig::default(),
            variable_types: BTreeMap::new(),
            sampler: None,
        }
    }
}

/// Convenience handle delegating to a lazily built weighting sampler.
///
/// Draws are stateless unless `stateful` is requested explicitly, whatever
/// mode the configuration names.
#[derive(Debug)]
pub struct CausalAccessor {
    frame: Frame,
    roles: RoleAssignment,
    config: SamplerConfig,
    variable_types: BTreeMap<String, VariableType>,
    sampler: Option<DoSampler<WeightingSampler>>,
}

impl CausalAccessor {
    /// Replaces the sampler configuration.
    pub fn with_config(mut self, config: SamplerConfig) -> Self {
        self.config = config;
        self.sampler = None;
        self
    }

    /// Overrides column types from tags such as `"b"`, `"d"` or `"continuous"`.
    pub fn with_variable_types<K, V>(
        mut self,
        types: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self, DoError>
    where
        K: Into<String>,
        V: AsRef<str>,
    {
        for (name, tag) in types {
            self.variable_types
                .insert(name.into(), VariableType::from_tag(tag.as_ref())?);
        }
        self.sampler = None;
        Ok(self)
    }

    /// Draws `do(intervention)`.
    pub fn do_(&mut self, intervention: &Intervention, stateful: bool) -> Result<Frame, DoError> {
        let mode = if stateful {
            ExecutionMode::Stateful
        } else {
            ExecutionMode::Stateless
        };
        self.sampler()?.sample_with_mode(intervention, mode)
    }

    /// Draws `do(intervention)` without keeping fitted state.
    pub fn do_stateless(&mut self, intervention: &Intervention) -> Result<Frame, DoError> {
        self.do_(intervention, false)
    }

    /// Discards any fitted state held by the underlying sampler.
    pub fn reset_state(&mut self) {
        if let Some(sampler) = self.sampler.as_mut() {
            sampler.reset();
        }
    }

    /// Underlying sampler, built on first use.
    pub fn sampler(&mut self) -> Result<&mut DoSampler<WeightingSampler>, DoError> {
        let sampler = match self.sampler.take() {
            Some(sampler) => sampler,
            None => self.build_sampler()?,
        };
        Ok(self.sampler.insert(sampler))
    }

    fn build_sampler(&self) -> Result<DoSampler<WeightingSampler>, DoError> {
        let dataset = ObservationalDataset::new(self.typed_frame()?)?;
        let provider = BackdoorIdentifier::new(self.config.proceed_when_unidentifiable);
        DoSampler::identify_with(
            dataset,
            &self.roles,
            &provider,
            self.config.clone(),
            WeightingSampler::new(),
        )
    }

    fn typed_frame(&self) -> Result<Frame, DoError> {
        if self.variable_types.is_empty() {
            return Ok(self.frame.clone());
        }
        for name in self.variable_types.keys() {
            self.frame.column(name)?;
        }
        let columns = self
            .frame
            .columns()
            .map(|column| {
                let kind = self
                    .variable_types
                    .get(column.name())
                    .copied()
                    .unwrap_or(column.kind());
                Column::new(column.name(), kind, column.values().to_vec())
            })
            .collect::<Result<Vec<_>, _>>()?;
        Frame::new(columns)
    }
}
