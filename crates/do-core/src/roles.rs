//! Causal roles assigned to dataset columns.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::{DoError, ErrorInfo};

/// Role a variable plays in the causal question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariableRole {
    /// Intervened-upon variable.
    Treatment,
    /// Variable whose interventional distribution is of interest.
    Outcome,
    /// Observed common cause of treatment and outcome.
    CommonCause,
    /// Placeholder standing for confounders nobody measured.
    ///
    /// Synthesized when no causal graph is supplied, to make explicit that
    /// identification from common causes alone cannot be perfect. It never
    /// corresponds to a real column.
    UnobservedConfounder,
}

/// Key of an entry in a [`RoleAssignment`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "name")]
pub enum RoleKey {
    /// A real dataset column.
    Column(String),
    /// The synthesized unobserved-confounder sentinel.
    Unobserved,
}

/// Mapping from variables to roles. Fixed once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    entries: IndexMap<RoleKey, VariableRole>,
}

impl RoleAssignment {
    /// Builds an assignment from treatment, outcome and common-cause names.
    ///
    /// At least one treatment and one outcome are required and the three sets
    /// must be disjoint.
    pub fn new<S: AsRef<str>>(
        treatments: &[S],
        outcomes: &[S],
        common_causes: &[S],
    ) -> Result<Self, DoError> {
        if treatments.is_empty() {
            return Err(role_error("no-treatment", "at least one treatment is required"));
        }
        if outcomes.is_empty() {
            return Err(role_error("no-outcome", "at least one outcome is required"));
        }
        let mut entries = IndexMap::new();
        let groups = [
            (treatments, VariableRole::Treatment),
            (outcomes, VariableRole::Outcome),
            (common_causes, VariableRole::CommonCause),
        ];
        for (names, role) in groups {
            for name in names {
                let key = RoleKey::Column(name.as_ref().to_string());
                if let Some(previous) = entries.insert(key, role) {
                    return Err(DoError::Identification(
                        ErrorInfo::new("overlapping-roles", "variable assigned two roles")
                            .with_context("column", name.as_ref())
                            .with_context("first", format!("{previous:?}"))
                            .with_context("second", format!("{role:?}")),
                    ));
                }
            }
        }
        Ok(Self { entries })
    }

    /// Returns a copy carrying the unobserved-confounder sentinel.
    pub fn with_unobserved_placeholder(mut self) -> Self {
        self.entries
            .insert(RoleKey::Unobserved, VariableRole::UnobservedConfounder);
        self
    }

    /// Returns whether the sentinel is present.
    pub fn has_unobserved_placeholder(&self) -> bool {
        self.entries.contains_key(&RoleKey::Unobserved)
    }

    /// Role of a column, if assigned.
    pub fn role_of(&self, column: &str) -> Option<VariableRole> {
        self.entries.get(&RoleKey::Column(column.to_string())).copied()
    }

    /// Column names holding `role`, in assignment order.
    pub fn columns_with(&self, role: VariableRole) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, assigned)| **assigned == role)
            .filter_map(|(key, _)| match key {
                RoleKey::Column(name) => Some(name.clone()),
                RoleKey::Unobserved => None,
            })
            .collect()
    }

    /// Treatment columns.
    pub fn treatments(&self) -> Vec<String> {
        self.columns_with(VariableRole::Treatment)
    }

    /// Outcome columns.
    pub fn outcomes(&self) -> Vec<String> {
        self.columns_with(VariableRole::Outcome)
    }

    /// Observed common causes.
    pub fn common_causes(&self) -> Vec<String> {
        self.columns_with(VariableRole::CommonCause)
    }

    /// Iterates over every entry including the sentinel.
    pub fn iter(&self) -> impl Iterator<Item = (&RoleKey, VariableRole)> {
        self.entries.iter().map(|(key, role)| (key, *role))
    }
}

fn role_error(code: &str, message: &str) -> DoError {
    DoError::Identification(ErrorInfo::new(code, message))
}
