//! Error types for graph models and datasets.

use thiserror::Error;

use crate::{ArcRef, VarId};

/// Result type alias for graph model operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Result type alias for dataset construction.
pub type DataResult<T> = Result<T, DataError>;

/// Violations of the graph model invariants.
///
/// These indicate a bug in the caller: search code must never request a
/// mutation that breaks the ordering or acyclicity invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A variable index is outside `0..N`.
    #[error("variable {var} out of range (model has {num_nodes} variables)")]
    VariableOutOfRange { var: VarId, num_nodes: usize },

    /// An intraslice arc from a variable to itself.
    #[error("self-loop on {var} is not allowed")]
    SelfLoop { var: VarId },

    /// An intraslice arc whose parent does not precede its child in the order.
    #[error("arc {arc} contradicts the total order")]
    OrderViolation { arc: ArcRef },

    /// Adding an arc that already exists.
    #[error("arc {arc} already present")]
    ArcAlreadyPresent { arc: ArcRef },

    /// Removing an arc that does not exist.
    #[error("arc {arc} not present")]
    ArcNotPresent { arc: ArcRef },

    /// A temporal arc was requested on a static model.
    #[error("temporal arc {arc} requested on a static model")]
    TemporalOnStaticModel { arc: ArcRef },

    /// The supplied order is not a permutation of `0..N`.
    #[error("order is not a permutation of 0..{num_nodes}")]
    InvalidOrder { num_nodes: usize },

    /// An adjacent swap at a position with no right-hand neighbour.
    #[error("cannot swap position {pos} (model has {num_nodes} variables)")]
    InvalidSwapPosition { pos: usize, num_nodes: usize },

    /// A node holds more parents than allowed.
    #[error("{var} has {parents} parents (maximum {max})")]
    TooManyParents { var: VarId, parents: usize, max: usize },
}

/// Problems with the discrete data handed to the search.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    /// Columns of different lengths.
    #[error("column {column} has {found} rows, expected {expected}")]
    RaggedColumns {
        column: usize,
        expected: usize,
        found: usize,
    },

    /// A code at or above the declared arity.
    #[error("value {value} in column {column}, row {row} exceeds arity {arity}")]
    ValueOutOfRange {
        column: usize,
        row: usize,
        value: u32,
        arity: usize,
    },

    /// A variable with no states.
    #[error("column {column} has zero arity")]
    ZeroArity { column: usize },

    /// Names, arities and columns disagree in length.
    #[error("dataset shape mismatch: {names} names, {arities} arities, {columns} columns")]
    ShapeMismatch {
        names: usize,
        arities: usize,
        columns: usize,
    },

    /// Time-series layout needs at least two rows.
    #[error("time-series data needs at least 2 rows, found {rows}")]
    SeriesTooShort { rows: usize },
}
