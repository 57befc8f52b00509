//! Error types for the search engine.

use mml_core::{DataError, GraphError};
use thiserror::Error;

/// Result type alias for search operations.
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors that can occur during a search run.
///
/// Infeasible proposals and Metropolis rejections are ordinary step outcomes
/// and never show up here; everything in this enum ends the run.
#[derive(Debug, Error)]
pub enum SearchError {
    /// A graph mutation violated a model invariant.
    #[error("graph invariant violated: {0}")]
    Graph(#[from] GraphError),

    /// The dataset is unusable for the requested layout.
    #[error("data error: {0}")]
    Data(#[from] DataError),

    /// Configuration rejected by validation.
    #[error("invalid search configuration: {message}")]
    InvalidConfig { message: String },

    /// Parallel child/parent slices of different lengths.
    #[error("length mismatch: {children} children vs {parents} parents")]
    LengthMismatch { children: usize, parents: usize },

    /// Model and dataset disagree on the number of variables.
    #[error("model has {model} variables but dataset has {data}")]
    DatasetMismatch { model: usize, data: usize },

    /// The joint state space of a parent set does not fit a configuration index.
    #[error("parent configuration space of {child} is too large to index")]
    ConfigurationOverflow { child: mml_core::VarId },

    /// State serialization/deserialization error.
    #[error("state serialization error: {0}")]
    StateSerialization(#[from] serde_json::Error),
}

impl SearchError {
    /// Build an [`SearchError::InvalidConfig`].
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
