//! Core domain types for MML structure search over Bayesian networks.
//!
//! The central abstraction is the *totally ordered model*: a DAG whose
//! intraslice arcs must agree with an explicit variable order, which makes
//! the graph acyclic by construction.
//!
//! ```text
//! Tom  = { order: position <-> variable, arcs: parent -> child (pos(parent) < pos(child)) }
//! Dtom = Tom + { temporal arcs: previous slice -> current slice (unconstrained) }
//! ```
//!
//! Every mutation is a toggle and every toggle is its own inverse, so search
//! code can apply a proposal in place and undo it by applying it again.

pub mod dataset;
pub mod dtom;
pub mod error;
pub mod export;
pub mod model;
pub mod tom;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use dataset::{Dataset, SliceLayout};
pub use dtom::Dtom;
pub use error::{DataError, DataResult, GraphError, GraphResult};
pub use export::{ExportedArc, NetworkSnapshot};
pub use model::{StructureModel, TemporalModel};
pub use tom::Tom;

// =============================================================================
// Identifiers
// =============================================================================

/// Identifier for a variable (a node of the network), in `0..N`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VarId(pub usize);

impl VarId {
    /// Index into per-variable tables.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<usize> for VarId {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

// =============================================================================
// Arcs
// =============================================================================

/// Which arc relation an arc belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    /// Arc between two variables of the same time slice; constrained by the order.
    Intraslice,
    /// Arc from a previous-slice variable to a current-slice variable.
    Temporal,
}

impl Relation {
    /// Short label used in logs and exports.
    pub fn label(&self) -> &'static str {
        match self {
            Relation::Intraslice => "intraslice",
            Relation::Temporal => "temporal",
        }
    }
}

/// A directed arc `parent -> child` in a given relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArcRef {
    /// Source variable (previous slice for temporal arcs).
    pub parent: VarId,
    /// Target variable (always in the current slice).
    pub child: VarId,
    /// Relation the arc belongs to.
    pub relation: Relation,
}

impl ArcRef {
    /// An intraslice arc `parent -> child`.
    pub fn intraslice(parent: VarId, child: VarId) -> Self {
        Self {
            parent,
            child,
            relation: Relation::Intraslice,
        }
    }

    /// A temporal arc `parent_{t-1} -> child_t`.
    pub fn temporal(parent: VarId, child: VarId) -> Self {
        Self {
            parent,
            child,
            relation: Relation::Temporal,
        }
    }

    /// Whether the arc is temporal.
    pub fn is_temporal(&self) -> bool {
        self.relation == Relation::Temporal
    }
}

impl fmt::Display for ArcRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.relation {
            Relation::Intraslice => write!(f, "{} -> {}", self.parent, self.child),
            Relation::Temporal => write!(f, "{}[t-1] -> {}", self.parent, self.child),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arc_display() {
        assert_eq!(ArcRef::intraslice(VarId(0), VarId(2)).to_string(), "v0 -> v2");
        assert_eq!(ArcRef::temporal(VarId(1), VarId(1)).to_string(), "v1[t-1] -> v1");
    }

    #[test]
    fn test_relation_serde() {
        let json = serde_json::to_string(&Relation::Temporal).unwrap();
        assert_eq!(json, "\"temporal\"");
        let back: Relation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Relation::Temporal);
    }
}
