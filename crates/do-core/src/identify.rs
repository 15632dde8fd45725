//! Identification contract consumed by the sampler and the graph-less
//! back-door identifier.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{DoError, ErrorInfo};
use crate::frame::Schema;
use crate::roles::RoleAssignment;

/// Identified estimand handed to the sampler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifiedEstimand {
    /// Treatment columns.
    pub treatments: Vec<String>,
    /// Outcome columns.
    pub outcomes: Vec<String>,
    /// Common causes that block every back-door path.
    pub adjustment_set: Vec<String>,
    /// Whether unobserved confounding was acknowledged and ignored.
    #[serde(default)]
    pub unobserved_confounding_ignored: bool,
}

impl IdentifiedEstimand {
    /// Builds a back-door estimand with no acknowledged unobserved confounding.
    pub fn backdoor<S: AsRef<str>>(treatments: &[S], outcomes: &[S], adjustment_set: &[S]) -> Self {
        let owned = |names: &[S]| -> Vec<String> {
            names.iter().map(|n| n.as_ref().to_string()).collect()
        };
        Self {
            treatments: owned(treatments),
            outcomes: owned(outcomes),
            adjustment_set: owned(adjustment_set),
            unobserved_confounding_ignored: false,
        }
    }

    /// Checks that every referenced column exists in `schema`.
    pub fn validate_against(&self, schema: &Schema) -> Result<(), DoError> {
        if self.treatments.is_empty() {
            return Err(DoError::Identification(ErrorInfo::new(
                "no-treatment",
                "estimand names no treatment",
            )));
        }
        let referenced = self
            .treatments
            .iter()
            .chain(&self.outcomes)
            .chain(&self.adjustment_set);
        for name in referenced {
            if !schema.contains(name) {
                return Err(DoError::Schema(
                    ErrorInfo::new("unknown-column", "estimand references a missing column")
                        .with_context("column", name.clone()),
                ));
            }
        }
        Ok(())
    }
}

/// External collaborator resolving causal roles into an adjustment set.
pub trait IdentificationProvider {
    /// Identifies the effect of the treatments on the outcomes.
    fn identify(
        &self,
        schema: &Schema,
        roles: &RoleAssignment,
    ) -> Result<IdentifiedEstimand, DoError>;
}

/// Identifier used when no causal graph is available.
///
/// Without a graph the only candidate adjustment set is the full list of
/// declared common causes, and nothing rules out confounders that were never
/// measured. The identifier therefore synthesizes the unobserved-confounder
/// placeholder and refuses to proceed unless the caller opted in through
/// `proceed_when_unidentifiable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackdoorIdentifier {
    /// Accept the estimand despite possible unobserved confounding.
    pub proceed_when_unidentifiable: bool,
}

impl BackdoorIdentifier {
    /// Creates an identifier with the given acknowledgement flag.
    pub fn new(proceed_when_unidentifiable: bool) -> Self {
        Self {
            proceed_when_unidentifiable,
        }
    }

    /// Roles as seen without a graph: the declared roles plus the
    /// unobserved-confounder placeholder, synthesized when absent.
    pub fn complete_roles<'a>(&self, roles: &'a RoleAssignment) -> Cow<'a, RoleAssignment> {
        if roles.has_unobserved_placeholder() {
            Cow::Borrowed(roles)
        } else {
            Cow::Owned(roles.clone().with_unobserved_placeholder())
        }
    }
}

impl IdentificationProvider for BackdoorIdentifier {
    fn identify(
        &self,
        schema: &Schema,
        roles: &RoleAssignment,
    ) -> Result<IdentifiedEstimand, DoError> {
        let roles = self.complete_roles(roles);
        let unobserved = roles.has_unobserved_placeholder();
        let estimand = IdentifiedEstimand {
            treatments: roles.treatments(),
            outcomes: roles.outcomes(),
            adjustment_set: roles.common_causes(),
            unobserved_confounding_ignored: unobserved,
        };
        estimand.validate_against(schema)?;

        if !unobserved {
            return Ok(estimand);
        }
        if !self.proceed_when_unidentifiable {
            return Err(DoError::Identification(
                ErrorInfo::new(
                    "unobserved-confounding",
                    "effect not identifiable without ruling out unobserved confounders",
                )
                .with_context("treatments", estimand.treatments.join(","))
                .with_hint("set proceed_when_unidentifiable to accept the back-door estimand"),
            ));
        }
        warn!(
            treatments = ?estimand.treatments,
            adjustment_set = ?estimand.adjustment_set,
            "ignoring possible unobserved confounding"
        );
        Ok(estimand)
    }
}
