//! Structural (prior) cost of a network and of incremental changes to it.
//!
//! The structure cost decomposes into the cost of stating the order plus, per
//! node and per relation, the cost of stating a parent set of size `k` out of
//! `m` candidates. Toggle deltas only touch the groups whose `k` changes, and a
//! reorder only touches the two swapped nodes.

use statrs::function::factorial::{ln_binomial, ln_factorial};
use tracing::warn;

use mml_core::{ArcRef, Relation, StructureModel, TemporalModel, VarId};

use crate::error::{SearchError, SearchResult};

/// Magnitude used in place of a non-finite structural cost.
pub const MAX_STRUCTURE_COST: f64 = 1.0e9;

/// Replace a non-finite cost with a large finite one, logging the event.
pub(crate) fn cap_cost(value: f64, what: &'static str) -> f64 {
    if value.is_finite() {
        return value;
    }
    warn!(value = %value, what, "structure_cost_capped");
    if value == f64::NEG_INFINITY {
        -MAX_STRUCTURE_COST
    } else {
        MAX_STRUCTURE_COST
    }
}

/// A structure prior, queried incrementally by the movers.
///
/// Implementors provide [`parent_set_cost`](StructureCoster::parent_set_cost);
/// every other cost is derived from it and always reflects the model's
/// current topology.
pub trait StructureCoster {
    /// Cost in nits of a parent set of size `parents` chosen from `candidates`.
    fn parent_set_cost(&self, relation: Relation, candidates: usize, parents: usize) -> f64;

    /// Parent-set cost of `child` across both relations.
    fn node_structure_cost<M: StructureModel>(&self, model: &M, child: VarId) -> f64 {
        let mut cost = self.parent_set_cost(
            Relation::Intraslice,
            model.num_intraslice_candidates(child),
            model.num_intraslice_parents(child),
        );
        if model.num_temporal_candidates() > 0 {
            cost += self.parent_set_cost(
                Relation::Temporal,
                model.num_temporal_candidates(),
                model.num_temporal_parents(child),
            );
        }
        cost
    }

    /// Full structure cost: the order plus every node's parent sets.
    fn structure_cost<M: StructureModel>(&self, model: &M) -> f64 {
        let n = model.num_nodes();
        let order = ln_factorial(n as u64);
        let parents: f64 = (0..n)
            .map(|v| self.node_structure_cost(model, VarId(v)))
            .sum();
        cap_cost(order + parents, "structure_cost")
    }

    /// Cost change of flipping every arc in `arcs` as one step.
    ///
    /// Arcs sharing a child and relation are costed jointly, so the result
    /// equals `structure_cost(after) - structure_cost(before)`.
    fn cost_to_toggle<M: StructureModel>(&self, model: &M, arcs: &[ArcRef]) -> f64 {
        let mut delta = 0.0;
        for (i, arc) in arcs.iter().enumerate() {
            let same_group = |other: &ArcRef| other.child == arc.child && other.relation == arc.relation;
            if arcs[..i].iter().any(same_group) {
                continue;
            }

            let (candidates, parents) = match arc.relation {
                Relation::Intraslice => (
                    model.num_intraslice_candidates(arc.child),
                    model.num_intraslice_parents(arc.child),
                ),
                Relation::Temporal => (
                    model.num_temporal_candidates(),
                    model.num_temporal_parents(arc.child),
                ),
            };
            let change: isize = arcs[i..]
                .iter()
                .filter(|other| same_group(*other))
                .map(|other| if model.has_arc(*other) { -1 } else { 1 })
                .sum();
            let after = parents.saturating_add_signed(change);

            delta += self.parent_set_cost(arc.relation, candidates, after)
                - self.parent_set_cost(arc.relation, candidates, parents);
        }
        cap_cost(delta, "cost_to_toggle")
    }

    /// Cost change of flipping the intraslice arc `parent -> child`.
    fn cost_to_toggle_arc<M: StructureModel>(&self, model: &M, parent: VarId, child: VarId) -> f64 {
        self.cost_to_toggle(model, &[ArcRef::intraslice(parent, child)])
    }

    /// Cost change of flipping the intraslice arcs `parents[i] -> children[i]` together.
    fn cost_to_toggle_arcs<M: StructureModel>(
        &self,
        model: &M,
        children: &[VarId],
        parents: &[VarId],
    ) -> SearchResult<f64> {
        let arcs = paired(children, parents, ArcRef::intraslice)?;
        Ok(self.cost_to_toggle(model, &arcs))
    }

    /// Cost change of flipping the temporal arc `parent_{t-1} -> child`.
    fn cost_to_toggle_temporal_arc<M: TemporalModel>(
        &self,
        model: &M,
        parent: VarId,
        child: VarId,
    ) -> f64 {
        self.cost_to_toggle(model, &[ArcRef::temporal(parent, child)])
    }

    /// Cost change of flipping the temporal arcs `parents[i] -> children[i]` together.
    fn cost_to_toggle_temporal_arcs<M: TemporalModel>(
        &self,
        model: &M,
        children: &[VarId],
        parents: &[VarId],
    ) -> SearchResult<f64> {
        let arcs = paired(children, parents, ArcRef::temporal)?;
        Ok(self.cost_to_toggle(model, &arcs))
    }

    /// Cost change of swapping the variables at `pos` and `pos + 1`.
    ///
    /// Temporal parent sets do not depend on the order and cancel out.
    fn cost_to_swap_order<M: StructureModel>(&self, model: &M, pos: usize) -> f64 {
        let left = model.node_at(pos);
        let right = model.node_at(pos + 1);
        let reversed = usize::from(model.is_arc(left, right));
        let k_left = model.num_intraslice_parents(left);
        let k_right = model.num_intraslice_parents(right);

        let before = self.parent_set_cost(Relation::Intraslice, pos, k_left)
            + self.parent_set_cost(Relation::Intraslice, pos + 1, k_right);
        let after = self.parent_set_cost(Relation::Intraslice, pos + 1, k_left + reversed)
            + self.parent_set_cost(Relation::Intraslice, pos, k_right - reversed);
        cap_cost(after - before, "cost_to_swap_order")
    }
}

fn paired(
    children: &[VarId],
    parents: &[VarId],
    make: fn(VarId, VarId) -> ArcRef,
) -> SearchResult<Vec<ArcRef>> {
    if children.len() != parents.len() {
        return Err(SearchError::LengthMismatch {
            children: children.len(),
            parents: parents.len(),
        });
    }
    Ok(parents
        .iter()
        .zip(children)
        .map(|(&p, &c)| make(p, c))
        .collect())
}

/// Each candidate arc is present independently with a per-relation probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcProbabilityCoster {
    add_intraslice: f64,
    skip_intraslice: f64,
    add_temporal: f64,
    skip_temporal: f64,
}

impl ArcProbabilityCoster {
    pub fn new(arc_prob: f64, temporal_arc_prob: f64) -> Self {
        Self {
            add_intraslice: -arc_prob.ln(),
            skip_intraslice: -(1.0 - arc_prob).ln(),
            add_temporal: -temporal_arc_prob.ln(),
            skip_temporal: -(1.0 - temporal_arc_prob).ln(),
        }
    }
}

impl StructureCoster for ArcProbabilityCoster {
    fn parent_set_cost(&self, relation: Relation, candidates: usize, parents: usize) -> f64 {
        if parents > candidates {
            return f64::INFINITY;
        }
        let (add, skip) = match relation {
            Relation::Intraslice => (self.add_intraslice, self.skip_intraslice),
            Relation::Temporal => (self.add_temporal, self.skip_temporal),
        };
        parents as f64 * add + (candidates - parents) as f64 * skip
    }
}

/// Uniform over the parent count `0..=m`, then uniform over sets of that size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UniformParentCountCoster;

impl StructureCoster for UniformParentCountCoster {
    fn parent_set_cost(&self, _relation: Relation, candidates: usize, parents: usize) -> f64 {
        if parents > candidates {
            return f64::INFINITY;
        }
        ((candidates + 1) as f64).ln() + ln_binomial(candidates as u64, parents as u64)
    }
}

/// One of the concrete calculators, chosen once per run from a
/// [`StructurePrior`](crate::config::StructurePrior).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriorCoster {
    ArcProbability(ArcProbabilityCoster),
    UniformParentCount(UniformParentCountCoster),
}

impl StructureCoster for PriorCoster {
    fn parent_set_cost(&self, relation: Relation, candidates: usize, parents: usize) -> f64 {
        match self {
            PriorCoster::ArcProbability(c) => c.parent_set_cost(relation, candidates, parents),
            PriorCoster::UniformParentCount(c) => c.parent_set_cost(relation, candidates, parents),
        }
    }
}
