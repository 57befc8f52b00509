//! Dynamic TOM: a [`Tom`] for the current slice plus temporal arcs.
//!
//! Temporal arcs run from any variable of the previous slice to any variable of
//! the current slice, including a variable to itself. Previous-slice values are
//! always known, so these arcs ignore the order and cannot create cycles.

use crate::error::{GraphError, GraphResult};
use crate::model::{StructureModel, TemporalModel};
use crate::tom::Tom;
use crate::{ArcRef, VarId};

/// Dynamic Bayesian network structure with intraslice and temporal arcs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dtom {
    intraslice: Tom,
    /// Row-major `parent * N + child`.
    temporal: Vec<bool>,
    /// Sorted temporal parents per child.
    temporal_parents: Vec<Vec<VarId>>,
}

impl Dtom {
    /// Create an empty dynamic model in identity order.
    pub fn new(num_nodes: usize, max_parents: usize) -> Self {
        Self::from_tom(Tom::new(num_nodes, max_parents))
    }

    /// Create an empty dynamic model with an explicit order.
    pub fn with_order(order: Vec<VarId>, max_parents: usize) -> GraphResult<Self> {
        Ok(Self::from_tom(Tom::with_order(order, max_parents)?))
    }

    /// Wrap an existing static structure; it becomes the intraslice part.
    pub fn from_tom(intraslice: Tom) -> Self {
        let n = intraslice.num_nodes();
        Self {
            intraslice,
            temporal: vec![false; n * n],
            temporal_parents: vec![Vec::new(); n],
        }
    }

    /// The intraslice structure.
    pub fn intraslice(&self) -> &Tom {
        &self.intraslice
    }

    /// The current order, indexed by position.
    pub fn order(&self) -> &[VarId] {
        self.intraslice.order()
    }

    /// Iterate over every temporal arc, grouped by child.
    pub fn temporal_arcs(&self) -> impl Iterator<Item = ArcRef> + '_ {
        self.temporal_parents
            .iter()
            .enumerate()
            .flat_map(|(child, parents)| {
                parents
                    .iter()
                    .map(move |&parent| ArcRef::temporal(parent, VarId(child)))
            })
    }

    /// Remove every arc of both relations, keeping the order.
    pub fn clear_arcs(&mut self) {
        self.intraslice.clear_arcs();
        self.temporal.iter_mut().for_each(|a| *a = false);
        self.temporal_parents.iter_mut().for_each(Vec::clear);
    }

    #[inline]
    fn slot(&self, parent: VarId, child: VarId) -> usize {
        parent.index() * self.intraslice.num_nodes() + child.index()
    }
}

impl StructureModel for Dtom {
    fn num_nodes(&self) -> usize {
        self.intraslice.num_nodes()
    }

    fn max_num_parents(&self) -> usize {
        self.intraslice.max_num_parents()
    }

    #[inline]
    fn node_pos(&self, var: VarId) -> usize {
        self.intraslice.node_pos(var)
    }

    #[inline]
    fn node_at(&self, pos: usize) -> VarId {
        self.intraslice.node_at(pos)
    }

    #[inline]
    fn is_arc(&self, parent: VarId, child: VarId) -> bool {
        self.intraslice.is_arc(parent, child)
    }

    fn add_arc(&mut self, parent: VarId, child: VarId) -> GraphResult<()> {
        self.intraslice.add_arc(parent, child)
    }

    fn remove_arc(&mut self, parent: VarId, child: VarId) -> GraphResult<()> {
        self.intraslice.remove_arc(parent, child)
    }

    fn parents(&self, child: VarId) -> &[VarId] {
        self.intraslice.parents(child)
    }

    fn temporal_parents(&self, child: VarId) -> &[VarId] {
        &self.temporal_parents[child.index()]
    }

    fn num_temporal_candidates(&self) -> usize {
        self.num_nodes()
    }

    fn swap_adjacent(&mut self, pos: usize) -> GraphResult<()> {
        self.intraslice.swap_adjacent(pos)
    }

    fn has_arc(&self, arc: ArcRef) -> bool {
        if arc.is_temporal() {
            self.is_temporal_arc(arc.parent, arc.child)
        } else {
            self.is_arc(arc.parent, arc.child)
        }
    }

    fn toggle(&mut self, arc: ArcRef) -> GraphResult<bool> {
        if !arc.is_temporal() {
            return self.intraslice.toggle(arc);
        }
        self.intraslice.check_var(arc.parent)?;
        self.intraslice.check_var(arc.child)?;
        if self.is_temporal_arc(arc.parent, arc.child) {
            self.remove_temporal_arc(arc.parent, arc.child)?;
            Ok(false)
        } else {
            self.add_temporal_arc(arc.parent, arc.child)?;
            Ok(true)
        }
    }

    fn validate(&self) -> GraphResult<()> {
        self.intraslice.validate()?;
        let n = self.num_nodes();
        for child in (0..n).map(VarId) {
            let listed = &self.temporal_parents[child.index()];
            for parent in (0..n).map(VarId) {
                let present = self.is_temporal_arc(parent, child);
                if present != listed.binary_search(&parent).is_ok() {
                    return Err(GraphError::ArcNotPresent {
                        arc: ArcRef::temporal(parent, child),
                    });
                }
            }
            let total = self.num_parents(child);
            if total > self.max_num_parents() {
                return Err(GraphError::TooManyParents {
                    var: child,
                    parents: total,
                    max: self.max_num_parents(),
                });
            }
        }
        Ok(())
    }
}

impl TemporalModel for Dtom {
    #[inline]
    fn is_temporal_arc(&self, parent: VarId, child: VarId) -> bool {
        self.temporal[self.slot(parent, child)]
    }

    fn add_temporal_arc(&mut self, parent: VarId, child: VarId) -> GraphResult<()> {
        self.intraslice.check_var(parent)?;
        self.intraslice.check_var(child)?;
        if self.is_temporal_arc(parent, child) {
            return Err(GraphError::ArcAlreadyPresent {
                arc: ArcRef::temporal(parent, child),
            });
        }
        let slot = self.slot(parent, child);
        self.temporal[slot] = true;
        let list = &mut self.temporal_parents[child.index()];
        if let Err(at) = list.binary_search(&parent) {
            list.insert(at, parent);
        }
        Ok(())
    }

    fn remove_temporal_arc(&mut self, parent: VarId, child: VarId) -> GraphResult<()> {
        self.intraslice.check_var(parent)?;
        self.intraslice.check_var(child)?;
        if !self.is_temporal_arc(parent, child) {
            return Err(GraphError::ArcNotPresent {
                arc: ArcRef::temporal(parent, child),
            });
        }
        let slot = self.slot(parent, child);
        self.temporal[slot] = false;
        let list = &mut self.temporal_parents[child.index()];
        if let Ok(at) = list.binary_search(&parent) {
            list.remove(at);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(i: usize) -> VarId {
        VarId(i)
    }

    #[test]
    fn test_candidate_counts() {
        let dtom = Dtom::with_order(vec![v(1), v(2), v(0)], 2).unwrap();
        // N temporal candidates + position in order
        assert_eq!(dtom.num_candidates(v(1)), 3);
        assert_eq!(dtom.num_candidates(v(2)), 4);
        assert_eq!(dtom.num_candidates(v(0)), 5);
    }

    #[test]
    fn test_temporal_arcs_ignore_order() {
        let mut dtom = Dtom::new(3, 3);
        dtom.add_temporal_arc(v(2), v(0)).unwrap();
        dtom.add_temporal_arc(v(0), v(0)).unwrap();
        assert!(dtom.is_temporal_arc(v(2), v(0)));
        assert!(!dtom.is_arc(v(2), v(0)));
        assert_eq!(dtom.temporal_parents(v(0)), &[v(0), v(2)]);
        dtom.validate().unwrap();
    }

    #[test]
    fn test_parent_split() {
        let mut dtom = Dtom::new(3, 2);
        dtom.add_arc(v(1), v(2)).unwrap();
        dtom.add_temporal_arc(v(0), v(2)).unwrap();
        assert_eq!(dtom.num_intraslice_parents(v(2)), 1);
        assert_eq!(dtom.num_temporal_parents(v(2)), 1);
        assert_eq!(dtom.num_parents(v(2)), 2);
        assert_eq!(dtom.num_arcs(), 2);
    }

    #[test]
    fn test_toggle_both_relations_self_inverse() {
        let mut dtom = Dtom::new(3, 2);
        dtom.add_temporal_arc(v(1), v(1)).unwrap();
        let before = dtom.clone();

        assert!(dtom.toggle(ArcRef::temporal(v(0), v(2))).unwrap());
        assert!(dtom.toggle(ArcRef::intraslice(v(0), v(2))).unwrap());
        assert!(!dtom.toggle(ArcRef::intraslice(v(0), v(2))).unwrap());
        assert!(!dtom.toggle(ArcRef::temporal(v(0), v(2))).unwrap());
        assert_eq!(dtom, before);
    }

    #[test]
    fn test_validate_counts_both_relations() {
        let mut dtom = Dtom::new(3, 1);
        dtom.add_arc(v(0), v(2)).unwrap();
        dtom.add_temporal_arc(v(2), v(2)).unwrap();
        assert!(matches!(
            dtom.validate().unwrap_err(),
            GraphError::TooManyParents { parents: 2, .. }
        ));
    }

    #[test]
    fn test_swap_keeps_temporal_arcs() {
        let mut dtom = Dtom::new(2, 2);
        dtom.add_arc(v(0), v(1)).unwrap();
        dtom.add_temporal_arc(v(1), v(0)).unwrap();
        dtom.swap_adjacent(0).unwrap();
        assert!(dtom.is_arc(v(1), v(0)));
        assert!(dtom.is_temporal_arc(v(1), v(0)));
        assert_eq!(dtom.num_parents(v(0)), 2);
    }
}
