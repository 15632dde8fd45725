use std::collections::BTreeMap;

use do_core::errors::ErrorInfo;
use do_core::DoError;
use serde::{Deserialize, Serialize};

/// Requested intervention on the treatment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Intervention {
    /// Keep the observed treatment values. Only valid when the sampler keeps
    /// the original treatment.
    KeepOriginal,
    /// Treatment column to requested values. Each vector holds either one
    /// value (applied to every row) or one value per dataset row.
    Set(BTreeMap<String, Vec<f64>>),
}

impl Intervention {
    /// Keeps the observed treatment.
    pub fn keep() -> Self {
        Intervention::KeepOriginal
    }

    /// Sets `treatment` to a single level.
    pub fn set(treatment: impl Into<String>, value: f64) -> Self {
        Intervention::KeepOriginal.and_set(treatment, value)
    }

    /// Sets `treatment` row by row.
    pub fn per_row(treatment: impl Into<String>, values: Vec<f64>) -> Self {
        Intervention::KeepOriginal.and_per_row(treatment, values)
    }

    /// Adds a scalar assignment for another treatment.
    pub fn and_set(self, treatment: impl Into<String>, value: f64) -> Self {
        self.and_per_row(treatment, vec![value])
    }

    /// Adds a per-row assignment for another treatment.
    pub fn and_per_row(self, treatment: impl Into<String>, values: Vec<f64>) -> Self {
        let mut assignments = match self {
            Intervention::KeepOriginal => BTreeMap::new(),
            Intervention::Set(assignments) => assignments,
        };
        assignments.insert(treatment.into(), values);
        Intervention::Set(assignments)
    }

    /// Returns true for [`Intervention::KeepOriginal`].
    pub fn is_keep_original(&self) -> bool {
        matches!(self, Intervention::KeepOriginal)
    }

    /// Validates the intervention and lays it out in treatment order.
    ///
    /// `KeepOriginal` requires `keep_original_treatment`. Assignments must
    /// name exactly the treatments, and every vector must have length 1 or
    /// `n_rows`.
    pub fn resolve(
        &self,
        treatments: &[String],
        n_rows: usize,
        keep_original_treatment: bool,
    ) -> Result<ResolvedIntervention, DoError> {
        let assignments = match self {
            Intervention::KeepOriginal if keep_original_treatment => {
                return Ok(ResolvedIntervention::KeepOriginal)
            }
            Intervention::KeepOriginal => {
                return Err(DoError::InvalidIntervention(
                    ErrorInfo::new(
                        "missing-intervention",
                        "no intervention given while the treatment is not kept",
                    )
                    .with_hint("pass treatment values or enable keep_original_treatment"),
                ))
            }
            Intervention::Set(assignments) => assignments,
        };

        if let Some(unknown) = assignments.keys().find(|name| !treatments.contains(name)) {
            return Err(DoError::InvalidIntervention(
                ErrorInfo::new("unknown-treatment", "intervention names a non-treatment column")
                    .with_context("column", unknown.clone())
                    .with_context("treatments", treatments.join(",")),
            ));
        }

        let mut columns = Vec::with_capacity(treatments.len());
        for treatment in treatments {
            let values = assignments.get(treatment).ok_or_else(|| {
                DoError::InvalidIntervention(
                    ErrorInfo::new("missing-treatment-value", "treatment left unassigned")
                        .with_context("column", treatment.clone()),
                )
            })?;
            if values.len() != 1 && values.len() != n_rows {
                return Err(DoError::ShapeMismatch(
                    ErrorInfo::new(
                        "intervention-length",
                        "intervention vector length must be 1 or the row count",
                    )
                    .with_context("column", treatment.clone())
                    .with_context("length", values.len().to_string())
                    .with_context("rows", n_rows.to_string()),
                ));
            }
            if let Some(bad) = values.iter().find(|value| !value.is_finite()) {
                return Err(DoError::InvalidIntervention(
                    ErrorInfo::new("non-finite-value", "intervention values must be finite")
                        .with_context("column", treatment.clone())
                        .with_context("value", bad.to_string()),
                ));
            }
            columns.push(values.as_slice());
        }

        if columns.iter().all(|values| values.len() == 1) {
            return Ok(ResolvedIntervention::Scalar(
                columns.iter().map(|values| values[0]).collect(),
            ));
        }
        let rows = (0..n_rows)
            .map(|row| {
                columns
                    .iter()
                    .map(|values| if values.len() == 1 { values[0] } else { values[row] })
                    .collect()
            })
            .collect();
        Ok(ResolvedIntervention::PerRow(rows))
    }
}

/// Intervention validated against the treatments and row count.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedIntervention {
    /// Observed treatment retained.
    KeepOriginal,
    /// One level tuple, ordered like the treatments.
    Scalar(Vec<f64>),
    /// One level tuple per dataset row.
    PerRow(Vec<Vec<f64>>),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn treatments() -> Vec<String> {
        vec!["d".to_string()]
    }

    #[test]
    fn keep_original_needs_flag() {
        let err = Intervention::keep()
            .resolve(&treatments(), 4, false)
            .unwrap_err();
        assert_eq!(err.info().code, "missing-intervention");
        assert_eq!(
            Intervention::keep().resolve(&treatments(), 4, true).unwrap(),
            ResolvedIntervention::KeepOriginal
        );
    }

    #[test]
    fn length_one_is_scalar() {
        let resolved = Intervention::set("d", 1.0)
            .resolve(&treatments(), 4, false)
            .unwrap();
        assert_eq!(resolved, ResolvedIntervention::Scalar(vec![1.0]));
    }

    #[test]
    fn wrong_length_is_shape_mismatch() {
        let err = Intervention::per_row("d", vec![1.0, 0.0])
            .resolve(&treatments(), 4, true)
            .unwrap_err();
        assert!(matches!(err, DoError::ShapeMismatch(_)));
    }

    #[test]
    fn scalar_broadcasts_next_to_vector() {
        let treatments = vec!["a".to_string(), "b".to_string()];
        let resolved = Intervention::set("a", 1.0)
            .and_per_row("b", vec![0.0, 1.0, 2.0])
            .resolve(&treatments, 3, true)
            .unwrap();
        assert_eq!(
            resolved,
            ResolvedIntervention::PerRow(vec![vec![1.0, 0.0], vec![1.0, 1.0], vec![1.0, 2.0]])
        );
    }

    #[test]
    fn unknown_column_is_rejected() {
        let err = Intervention::set("y", 1.0)
            .resolve(&treatments(), 4, false)
            .unwrap_err();
        assert_eq!(err.info().code, "unknown-treatment");
    }
}
