//! Column-typed tables: the observational dataset and its working copies.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::{schema_error, DoError, ErrorInfo};

/// Declared statistical type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariableType {
    /// Two-level variable coded as `0.0` / `1.0`.
    Binary,
    /// Unordered or ordered discrete levels coded as integral `f64` values.
    Categorical,
    /// Real-valued variable.
    Continuous,
}

impl VariableType {
    /// Parses a type tag. Accepts the long names and the single-letter tags
    /// `b`, `c` (continuous), `d`, `u` and `o` (all categorical).
    pub fn from_tag(tag: &str) -> Result<Self, DoError> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "binary" | "b" => Ok(VariableType::Binary),
            "categorical" | "discrete" | "d" | "u" | "o" => Ok(VariableType::Categorical),
            "continuous" | "c" => Ok(VariableType::Continuous),
            other => Err(DoError::Schema(
                ErrorInfo::new("unknown-type-tag", "unrecognised variable type tag")
                    .with_context("tag", other)
                    .with_hint("use one of binary, categorical, continuous"),
            )),
        }
    }

    /// Returns whether values are discrete level codes.
    pub fn is_discrete(&self) -> bool {
        !matches!(self, VariableType::Continuous)
    }

    /// Canonical long tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableType::Binary => "binary",
            VariableType::Categorical => "categorical",
            VariableType::Continuous => "continuous",
        }
    }
}

impl FromStr for VariableType {
    type Err = DoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VariableType::from_tag(s)
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, typed column of observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    name: String,
    kind: VariableType,
    values: Vec<f64>,
}

impl Column {
    /// Creates a validated column.
    ///
    /// All values must be finite. Binary columns only accept `0.0` and `1.0`;
    /// categorical columns only accept integral level codes.
    pub fn new(
        name: impl Into<String>,
        kind: VariableType,
        values: Vec<f64>,
    ) -> Result<Self, DoError> {
        let column = Self {
            name: name.into(),
            kind,
            values,
        };
        column.validate()?;
        Ok(column)
    }

    /// Shorthand for a binary column.
    pub fn binary(name: impl Into<String>, values: Vec<f64>) -> Result<Self, DoError> {
        Self::new(name, VariableType::Binary, values)
    }

    /// Shorthand for a categorical column.
    pub fn categorical(name: impl Into<String>, values: Vec<f64>) -> Result<Self, DoError> {
        Self::new(name, VariableType::Categorical, values)
    }

    /// Shorthand for a continuous column.
    pub fn continuous(name: impl Into<String>, values: Vec<f64>) -> Result<Self, DoError> {
        Self::new(name, VariableType::Continuous, values)
    }

    fn validate(&self) -> Result<(), DoError> {
        for (row, &value) in self.values.iter().enumerate() {
            let valid = match self.kind {
                VariableType::Binary => value == 0.0 || value == 1.0,
                VariableType::Categorical => value.is_finite() && value.fract() == 0.0,
                VariableType::Continuous => value.is_finite(),
            };
            if !valid {
                return Err(DoError::Schema(
                    ErrorInfo::new("invalid-value", "value not admissible for column type")
                        .with_context("column", self.name.clone())
                        .with_context("type", self.kind.as_str())
                        .with_context("row", row.to_string())
                        .with_context("value", value.to_string()),
                ));
            }
        }
        Ok(())
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared variable type.
    pub fn kind(&self) -> VariableType {
        self.kind
    }

    /// Raw values in row order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true when the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sorted distinct values. Intended for discrete columns.
    pub fn levels(&self) -> Vec<f64> {
        let mut levels = self.values.clone();
        levels.sort_by(f64::total_cmp);
        levels.dedup();
        levels
    }

    fn take(&self, rows: &[usize]) -> Column {
        Column {
            name: self.name.clone(),
            kind: self.kind,
            values: rows.iter().map(|&row| self.values[row]).collect(),
        }
    }
}

/// Ordered column name to type mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Schema {
    fields: IndexMap<String, VariableType>,
}

impl Schema {
    /// Returns whether a column with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Declared type of a column, if present.
    pub fn kind_of(&self, name: &str) -> Option<VariableType> {
        self.fields.get(name).copied()
    }

    /// Column names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true when the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Rectangular table of typed columns.
///
/// Frames are values: every row operation returns a new frame and leaves the
/// receiver untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Column>", into = "Vec<Column>")]
pub struct Frame {
    columns: IndexMap<String, Column>,
    n_rows: usize,
}

impl Frame {
    /// Builds a frame, rejecting duplicate names and ragged columns.
    pub fn new(columns: Vec<Column>) -> Result<Self, DoError> {
        let n_rows = columns.first().map(Column::len).unwrap_or(0);
        let mut map = IndexMap::with_capacity(columns.len());
        for column in columns {
            column.validate()?;
            if column.len() != n_rows {
                return Err(DoError::Schema(
                    ErrorInfo::new("ragged-columns", "columns have different lengths")
                        .with_context("column", column.name.clone())
                        .with_context("expected", n_rows.to_string())
                        .with_context("actual", column.len().to_string()),
                ));
            }
            if map.contains_key(&column.name) {
                return Err(DoError::Schema(
                    ErrorInfo::new("duplicate-column", "column declared twice")
                        .with_context("column", column.name.clone()),
                ));
            }
            map.insert(column.name.clone(), column);
        }
        Ok(Self {
            columns: map,
            n_rows,
        })
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns.
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Result<&Column, DoError> {
        self.columns.get(name).ok_or_else(|| {
            DoError::Schema(
                ErrorInfo::new("unknown-column", "column not present in frame")
                    .with_context("column", name),
            )
        })
    }

    /// Iterates over columns in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }

    /// Schema of the frame.
    pub fn schema(&self) -> Schema {
        Schema {
            fields: self
                .columns
                .iter()
                .map(|(name, column)| (name.clone(), column.kind))
                .collect(),
        }
    }

    /// Single cell lookup.
    pub fn value(&self, name: &str, row: usize) -> Result<f64, DoError> {
        let column = self.column(name)?;
        column.values.get(row).copied().ok_or_else(|| {
            DoError::Schema(
                ErrorInfo::new("row-out-of-range", "row index beyond frame length")
                    .with_context("row", row.to_string())
                    .with_context("rows", self.n_rows.to_string()),
            )
        })
    }

    /// Builds a new frame from the given row indices. Indices may repeat.
    pub fn select_rows(&self, rows: &[usize]) -> Result<Frame, DoError> {
        if let Some(&bad) = rows.iter().find(|&&row| row >= self.n_rows) {
            return Err(DoError::Schema(
                ErrorInfo::new("row-out-of-range", "row index beyond frame length")
                    .with_context("row", bad.to_string())
                    .with_context("rows", self.n_rows.to_string()),
            ));
        }
        Ok(Frame {
            columns: self
                .columns
                .iter()
                .map(|(name, column)| (name.clone(), column.take(rows)))
                .collect(),
            n_rows: rows.len(),
        })
    }

    /// Keeps the rows for which `keep(row_index)` returns true.
    pub fn filter_rows<F>(&self, mut keep: F) -> Frame
    where
        F: FnMut(usize) -> bool,
    {
        let rows: Vec<usize> = (0..self.n_rows).filter(|&row| keep(row)).collect();
        Frame {
            columns: self
                .columns
                .iter()
                .map(|(name, column)| (name.clone(), column.take(&rows)))
                .collect(),
            n_rows: rows.len(),
        }
    }

    /// Returns a copy of the frame with `column` appended or replaced.
    pub fn with_column(&self, column: Column) -> Result<Frame, DoError> {
        column.validate()?;
        if !self.columns.is_empty() && column.len() != self.n_rows {
            return Err(DoError::Schema(
                ErrorInfo::new("ragged-columns", "column length differs from frame")
                    .with_context("column", column.name.clone())
                    .with_context("expected", self.n_rows.to_string())
                    .with_context("actual", column.len().to_string()),
            ));
        }
        let mut columns = self.columns.clone();
        let n_rows = column.len();
        columns.insert(column.name.clone(), column);
        Ok(Frame { columns, n_rows })
    }

    /// Values of `names` at `row`, in the order given.
    pub fn row_tuple(&self, names: &[String], row: usize) -> Result<Vec<f64>, DoError> {
        names.iter().map(|name| self.value(name, row)).collect()
    }
}

impl TryFrom<Vec<Column>> for Frame {
    type Error = DoError;

    fn try_from(columns: Vec<Column>) -> Result<Self, Self::Error> {
        Frame::new(columns)
    }
}

impl From<Frame> for Vec<Column> {
    fn from(frame: Frame) -> Self {
        frame.columns.into_values().collect()
    }
}

/// Immutable snapshot of the observational data a sampler is built from.
///
/// Stages only ever see shared references or owned copies; the snapshot is
/// never mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationalDataset {
    frame: Frame,
}

impl ObservationalDataset {
    /// Wraps a frame. Empty datasets are rejected.
    pub fn new(frame: Frame) -> Result<Self, DoError> {
        if frame.n_rows() == 0 {
            return Err(schema_error("empty-dataset", "dataset has no rows"));
        }
        Ok(Self { frame })
    }

    /// Shared view of the observations.
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Fresh mutable working copy with the same schema and row count.
    pub fn working_copy(&self) -> Frame {
        self.frame.clone()
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.frame.n_rows()
    }

    /// Schema of the observations.
    pub fn schema(&self) -> Schema {
        self.frame.schema()
    }
}
