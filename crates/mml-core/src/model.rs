//! Capability traits shared by the static and dynamic models.
//!
//! Search code is generic over [`StructureModel`]. Moves that touch temporal
//! arcs additionally require [`TemporalModel`], so a dynamic-only move cannot
//! be compiled against a static [`Tom`](crate::Tom).

use crate::error::{GraphError, GraphResult};
use crate::{ArcRef, Relation, VarId};

/// A totally ordered network structure.
///
/// Query methods index directly and panic on out-of-range variables; mutation
/// methods validate their arguments and return [`GraphError`](crate::GraphError).
/// Mutations never check `max_num_parents`: callers check feasibility first.
pub trait StructureModel: Clone {
    /// Number of variables `N`.
    fn num_nodes(&self) -> usize;

    /// Upper bound on the total parent count of every node.
    fn max_num_parents(&self) -> usize;

    /// Position of `var` in the total order.
    fn node_pos(&self, var: VarId) -> usize;

    /// Variable at `pos` in the total order.
    fn node_at(&self, pos: usize) -> VarId;

    /// Whether the intraslice arc `parent -> child` exists.
    fn is_arc(&self, parent: VarId, child: VarId) -> bool;

    /// Add the intraslice arc `parent -> child`.
    fn add_arc(&mut self, parent: VarId, child: VarId) -> GraphResult<()>;

    /// Remove the intraslice arc `parent -> child`.
    fn remove_arc(&mut self, parent: VarId, child: VarId) -> GraphResult<()>;

    /// Intraslice parents of `child`, sorted ascending.
    fn parents(&self, child: VarId) -> &[VarId];

    /// Temporal parents of `child`, sorted ascending. Empty for static models.
    fn temporal_parents(&self, child: VarId) -> &[VarId];

    /// Number of previous-slice candidates every node has (`0` or `N`).
    fn num_temporal_candidates(&self) -> usize;

    /// Swap the variables at `pos` and `pos + 1`, reversing any arc between them.
    ///
    /// Calling it twice with the same `pos` restores the original model.
    fn swap_adjacent(&mut self, pos: usize) -> GraphResult<()>;

    /// Whether `arc` exists in its relation.
    fn has_arc(&self, arc: ArcRef) -> bool;

    /// Flip the presence of `arc`; returns whether it is present afterwards.
    fn toggle(&mut self, arc: ArcRef) -> GraphResult<bool>;

    /// Check every ordering and parent-count invariant.
    fn validate(&self) -> GraphResult<()>;

    /// Number of intraslice parents of `child`.
    fn num_intraslice_parents(&self, child: VarId) -> usize {
        self.parents(child).len()
    }

    /// Number of temporal parents of `child`.
    fn num_temporal_parents(&self, child: VarId) -> usize {
        self.temporal_parents(child).len()
    }

    /// Total parent count of `child` across both relations.
    fn num_parents(&self, child: VarId) -> usize {
        self.num_intraslice_parents(child) + self.num_temporal_parents(child)
    }

    /// Number of intraslice candidates for `child`: the variables preceding it.
    fn num_intraslice_candidates(&self, child: VarId) -> usize {
        self.node_pos(child)
    }

    /// Maximum possible parent count for `child` across both relations.
    fn num_candidates(&self, child: VarId) -> usize {
        self.num_temporal_candidates() + self.num_intraslice_candidates(child)
    }

    /// Check that `toggle(arc)` would succeed, without mutating anything.
    fn check_toggle(&self, arc: ArcRef) -> GraphResult<()> {
        let num_nodes = self.num_nodes();
        for var in [arc.parent, arc.child] {
            if var.index() >= num_nodes {
                return Err(GraphError::VariableOutOfRange { var, num_nodes });
            }
        }
        match arc.relation {
            Relation::Temporal if self.num_temporal_candidates() == 0 => {
                Err(GraphError::TemporalOnStaticModel { arc })
            }
            Relation::Temporal => Ok(()),
            Relation::Intraslice if arc.parent == arc.child => {
                Err(GraphError::SelfLoop { var: arc.parent })
            }
            Relation::Intraslice if self.node_pos(arc.parent) >= self.node_pos(arc.child) => {
                Err(GraphError::OrderViolation { arc })
            }
            Relation::Intraslice => Ok(()),
        }
    }

    /// Flip the intraslice arc `parent -> child`.
    fn toggle_arc(&mut self, parent: VarId, child: VarId) -> GraphResult<bool> {
        self.toggle(ArcRef::intraslice(parent, child))
    }

    /// Total number of arcs across both relations.
    fn num_arcs(&self) -> usize {
        (0..self.num_nodes())
            .map(|v| self.num_parents(VarId(v)))
            .sum()
    }
}

/// A model that also carries temporal (previous slice -> current slice) arcs.
pub trait TemporalModel: StructureModel {
    /// Whether the temporal arc `parent_{t-1} -> child_t` exists.
    fn is_temporal_arc(&self, parent: VarId, child: VarId) -> bool;

    /// Add the temporal arc `parent_{t-1} -> child_t`.
    fn add_temporal_arc(&mut self, parent: VarId, child: VarId) -> GraphResult<()>;

    /// Remove the temporal arc `parent_{t-1} -> child_t`.
    fn remove_temporal_arc(&mut self, parent: VarId, child: VarId) -> GraphResult<()>;

    /// Flip the temporal arc `parent_{t-1} -> child_t`.
    fn toggle_temporal_arc(&mut self, parent: VarId, child: VarId) -> GraphResult<bool> {
        self.toggle(ArcRef::temporal(parent, child))
    }
}
