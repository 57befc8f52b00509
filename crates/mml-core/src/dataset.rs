//! Discrete, column-major datasets consumed by the cost oracle.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult};
use crate::VarId;

/// How rows map onto time slices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceLayout {
    /// Rows are independent cases.
    #[default]
    Static,
    /// Row `t` is the current slice and row `t - 1` the previous one.
    TimeSeries,
}

/// Fixed-width table of categorical codes, one column per variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    names: Vec<String>,
    arities: Vec<usize>,
    columns: Vec<Vec<u32>>,
}

impl Dataset {
    /// Build a dataset, checking shapes and that every code is below its arity.
    pub fn new(names: Vec<String>, arities: Vec<usize>, columns: Vec<Vec<u32>>) -> DataResult<Self> {
        if names.len() != arities.len() || names.len() != columns.len() {
            return Err(DataError::ShapeMismatch {
                names: names.len(),
                arities: arities.len(),
                columns: columns.len(),
            });
        }

        let expected = columns.first().map(Vec::len).unwrap_or(0);
        for (column, (values, &arity)) in columns.iter().zip(&arities).enumerate() {
            if arity == 0 {
                return Err(DataError::ZeroArity { column });
            }
            if values.len() != expected {
                return Err(DataError::RaggedColumns {
                    column,
                    expected,
                    found: values.len(),
                });
            }
            if let Some((row, &value)) = values
                .iter()
                .enumerate()
                .find(|(_, &value)| value as usize >= arity)
            {
                return Err(DataError::ValueOutOfRange {
                    column,
                    row,
                    value,
                    arity,
                });
            }
        }

        Ok(Self {
            names,
            arities,
            columns,
        })
    }

    /// Build a dataset whose arities are `max code + 1` per column.
    pub fn from_columns(names: Vec<String>, columns: Vec<Vec<u32>>) -> DataResult<Self> {
        let arities = columns
            .iter()
            .map(|c| c.iter().max().map(|&m| m as usize + 1).unwrap_or(1))
            .collect();
        Self::new(names, arities, columns)
    }

    /// Number of variables.
    pub fn num_vars(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows (cases or time steps).
    pub fn num_rows(&self) -> usize {
        self.columns.first().map(Vec::len).unwrap_or(0)
    }

    /// Number of states of `var`.
    pub fn arity(&self, var: VarId) -> usize {
        self.arities[var.index()]
    }

    /// All arities, indexed by variable.
    pub fn arities(&self) -> &[usize] {
        &self.arities
    }

    /// Name of `var`.
    pub fn name(&self, var: VarId) -> &str {
        &self.names[var.index()]
    }

    /// All variable names.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The codes observed for `var`.
    pub fn column(&self, var: VarId) -> &[u32] {
        &self.columns[var.index()]
    }

    /// Rows that play the role of the current slice under `layout`.
    pub fn current_rows(&self, layout: SliceLayout) -> DataResult<Range<usize>> {
        match layout {
            SliceLayout::Static => Ok(0..self.num_rows()),
            SliceLayout::TimeSeries => {
                let rows = self.num_rows();
                if rows < 2 {
                    return Err(DataError::SeriesTooShort { rows });
                }
                Ok(1..rows)
            }
        }
    }
}
