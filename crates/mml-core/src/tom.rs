//! Totally ordered model (TOM).
//!
//! A `Tom` stores a permutation of the variables plus an adjacency matrix whose
//! arcs always point forward in that permutation. Parent lists are kept sorted
//! so that a node's parent configuration doubles as a canonical cache key.

use crate::error::{GraphError, GraphResult};
use crate::model::StructureModel;
use crate::{ArcRef, VarId};

/// Static network structure constrained by a total variable order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tom {
    /// position -> variable.
    order: Vec<VarId>,
    /// variable -> position.
    positions: Vec<usize>,
    /// Row-major `parent * N + child`.
    adjacency: Vec<bool>,
    /// Sorted intraslice parents per child.
    parents: Vec<Vec<VarId>>,
    max_parents: usize,
}

impl Tom {
    /// Create an empty model over `num_nodes` variables in identity order.
    pub fn new(num_nodes: usize, max_parents: usize) -> Self {
        Self {
            order: (0..num_nodes).map(VarId).collect(),
            positions: (0..num_nodes).collect(),
            adjacency: vec![false; num_nodes * num_nodes],
            parents: vec![Vec::new(); num_nodes],
            max_parents,
        }
    }

    /// Create an empty model with an explicit order (`order[pos] = variable`).
    pub fn with_order(order: Vec<VarId>, max_parents: usize) -> GraphResult<Self> {
        let num_nodes = order.len();
        let mut positions = vec![usize::MAX; num_nodes];
        for (pos, var) in order.iter().enumerate() {
            if var.index() >= num_nodes || positions[var.index()] != usize::MAX {
                return Err(GraphError::InvalidOrder { num_nodes });
            }
            positions[var.index()] = pos;
        }

        Ok(Self {
            order,
            positions,
            adjacency: vec![false; num_nodes * num_nodes],
            parents: vec![Vec::new(); num_nodes],
            max_parents,
        })
    }

    /// The current order, indexed by position.
    pub fn order(&self) -> &[VarId] {
        &self.order
    }

    /// Remove every arc, keeping the order.
    pub fn clear_arcs(&mut self) {
        self.adjacency.iter_mut().for_each(|a| *a = false);
        self.parents.iter_mut().for_each(Vec::clear);
    }

    /// Iterate over every intraslice arc, grouped by child.
    pub fn arcs(&self) -> impl Iterator<Item = ArcRef> + '_ {
        self.parents.iter().enumerate().flat_map(|(child, parents)| {
            parents
                .iter()
                .map(move |&parent| ArcRef::intraslice(parent, VarId(child)))
        })
    }

    pub(crate) fn check_var(&self, var: VarId) -> GraphResult<()> {
        if var.index() >= self.order.len() {
            return Err(GraphError::VariableOutOfRange {
                var,
                num_nodes: self.order.len(),
            });
        }
        Ok(())
    }

    #[inline]
    fn slot(&self, parent: VarId, child: VarId) -> usize {
        parent.index() * self.order.len() + child.index()
    }

    fn link(&mut self, parent: VarId, child: VarId) {
        let slot = self.slot(parent, child);
        self.adjacency[slot] = true;
        let list = &mut self.parents[child.index()];
        if let Err(at) = list.binary_search(&parent) {
            list.insert(at, parent);
        }
    }

    fn unlink(&mut self, parent: VarId, child: VarId) {
        let slot = self.slot(parent, child);
        self.adjacency[slot] = false;
        let list = &mut self.parents[child.index()];
        if let Ok(at) = list.binary_search(&parent) {
            list.remove(at);
        }
    }
}

impl StructureModel for Tom {
    fn num_nodes(&self) -> usize {
        self.order.len()
    }

    fn max_num_parents(&self) -> usize {
        self.max_parents
    }

    #[inline]
    fn node_pos(&self, var: VarId) -> usize {
        self.positions[var.index()]
    }

    #[inline]
    fn node_at(&self, pos: usize) -> VarId {
        self.order[pos]
    }

    #[inline]
    fn is_arc(&self, parent: VarId, child: VarId) -> bool {
        self.adjacency[self.slot(parent, child)]
    }

    fn add_arc(&mut self, parent: VarId, child: VarId) -> GraphResult<()> {
        self.check_var(parent)?;
        self.check_var(child)?;
        let arc = ArcRef::intraslice(parent, child);
        if parent == child {
            return Err(GraphError::SelfLoop { var: parent });
        }
        if self.node_pos(parent) >= self.node_pos(child) {
            return Err(GraphError::OrderViolation { arc });
        }
        if self.is_arc(parent, child) {
            return Err(GraphError::ArcAlreadyPresent { arc });
        }
        self.link(parent, child);
        Ok(())
    }

    fn remove_arc(&mut self, parent: VarId, child: VarId) -> GraphResult<()> {
        self.check_var(parent)?;
        self.check_var(child)?;
        if !self.is_arc(parent, child) {
            return Err(GraphError::ArcNotPresent {
                arc: ArcRef::intraslice(parent, child),
            });
        }
        self.unlink(parent, child);
        Ok(())
    }

    fn parents(&self, child: VarId) -> &[VarId] {
        &self.parents[child.index()]
    }

    fn temporal_parents(&self, _child: VarId) -> &[VarId] {
        &[]
    }

    fn num_temporal_candidates(&self) -> usize {
        0
    }

    fn swap_adjacent(&mut self, pos: usize) -> GraphResult<()> {
        let num_nodes = self.order.len();
        if pos + 1 >= num_nodes {
            return Err(GraphError::InvalidSwapPosition { pos, num_nodes });
        }

        let left = self.order[pos];
        let right = self.order[pos + 1];
        let reversed = self.is_arc(left, right);
        if reversed {
            self.unlink(left, right);
        }

        self.order.swap(pos, pos + 1);
        self.positions[left.index()] = pos + 1;
        self.positions[right.index()] = pos;

        if reversed {
            self.link(right, left);
        }
        Ok(())
    }

    fn has_arc(&self, arc: ArcRef) -> bool {
        !arc.is_temporal() && self.is_arc(arc.parent, arc.child)
    }

    fn toggle(&mut self, arc: ArcRef) -> GraphResult<bool> {
        self.check_toggle(arc)?;
        if self.is_arc(arc.parent, arc.child) {
            self.remove_arc(arc.parent, arc.child)?;
            Ok(false)
        } else {
            self.add_arc(arc.parent, arc.child)?;
            Ok(true)
        }
    }

    fn validate(&self) -> GraphResult<()> {
        let num_nodes = self.order.len();
        for child in (0..num_nodes).map(VarId) {
            let listed = &self.parents[child.index()];
            if listed.len() > self.max_parents {
                return Err(GraphError::TooManyParents {
                    var: child,
                    parents: listed.len(),
                    max: self.max_parents,
                });
            }
            for parent in (0..num_nodes).map(VarId) {
                let present = self.is_arc(parent, child);
                if present != listed.binary_search(&parent).is_ok() {
                    return Err(GraphError::ArcNotPresent {
                        arc: ArcRef::intraslice(parent, child),
                    });
                }
                if present && self.node_pos(parent) >= self.node_pos(child) {
                    return Err(GraphError::OrderViolation {
                        arc: ArcRef::intraslice(parent, child),
                    });
                }
            }
        }
        Ok(())
    }
}
