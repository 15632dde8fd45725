//! Structured error types shared across the do-sampler crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`DoError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (column names, sizes, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the do-sampler.
///
/// Every failure is surfaced to the caller immediately. There is no silent
/// fallback and no implicit retry: a biased or empty interventional sample is
/// never returned in place of an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum DoError {
    /// Missing or malformed intervention.
    #[error("invalid intervention: {0}")]
    InvalidIntervention(ErrorInfo),
    /// Intervention vector length differs from both 1 and the row count.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(ErrorInfo),
    /// Variable type not supported by the selected sampling strategy.
    #[error("unsupported variable type: {0}")]
    UnsupportedVariableType(ErrorInfo),
    /// No eligible rows or non-finite weights during propagation.
    #[error("degenerate weights: {0}")]
    DegenerateWeights(ErrorInfo),
    /// Failure reported by the identification provider.
    #[error("identification failure: {0}")]
    Identification(ErrorInfo),
    /// Failure while fitting the disruption model (e.g. non-convergence).
    #[error("disruption fit failure: {0}")]
    Disruption(ErrorInfo),
    /// Dataset schema violations (unknown columns, ragged columns, bad tags).
    #[error("schema error: {0}")]
    Schema(ErrorInfo),
    /// Serialization and configuration parsing errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

/// Fieldless discriminant of [`DoError`], convenient for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// See [`DoError::InvalidIntervention`].
    InvalidIntervention,
    /// See [`DoError::ShapeMismatch`].
    ShapeMismatch,
    /// See [`DoError::UnsupportedVariableType`].
    UnsupportedVariableType,
    /// See [`DoError::DegenerateWeights`].
    DegenerateWeights,
    /// See [`DoError::Identification`].
    Identification,
    /// See [`DoError::Disruption`].
    Disruption,
    /// See [`DoError::Schema`].
    Schema,
    /// See [`DoError::Serde`].
    Serde,
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl DoError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            DoError::InvalidIntervention(info)
            | DoError::ShapeMismatch(info)
            | DoError::UnsupportedVariableType(info)
            | DoError::DegenerateWeights(info)
            | DoError::Identification(info)
            | DoError::Disruption(info)
            | DoError::Schema(info)
            | DoError::Serde(info) => info,
        }
    }

    /// Returns the fieldless kind of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DoError::InvalidIntervention(_) => ErrorKind::InvalidIntervention,
            DoError::ShapeMismatch(_) => ErrorKind::ShapeMismatch,
            DoError::UnsupportedVariableType(_) => ErrorKind::UnsupportedVariableType,
            DoError::DegenerateWeights(_) => ErrorKind::DegenerateWeights,
            DoError::Identification(_) => ErrorKind::Identification,
            DoError::Disruption(_) => ErrorKind::Disruption,
            DoError::Schema(_) => ErrorKind::Schema,
            DoError::Serde(_) => ErrorKind::Serde,
        }
    }
}

pub(crate) fn schema_error(code: &str, message: impl Into<String>) -> DoError {
    DoError::Schema(ErrorInfo::new(code, message.into()))
}
