//! Local structure moves with Metropolis accept/revert.
//!
//! A move is two phases. *Proposal* draws random variables and builds a
//! [`Proposal`] without touching the model, or returns `None` when the draw
//! would break the parent-count bound. *Application* costs the proposal
//! incrementally, applies it in place, and reverts it by applying it again if
//! the Metropolis test rejects it. Every proposal is its own inverse.
//!
//! Which moves exist is fixed per model type: [`StaticMove`] for [`Tom`],
//! [`DynamicMove`] for [`Dtom`].

use std::fmt;
use std::hash::Hash;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use mml_core::{
    ArcRef, Dtom, GraphError, GraphResult, StructureModel, TemporalModel, Tom, VarId,
};

use crate::config::MoveWeights;
use crate::context::ChainContext;
use crate::coster::StructureCoster;
use crate::error::SearchResult;
use crate::metropolis::metropolis_accept;
use crate::oracle::CostOracle;

// =============================================================================
// Proposals
// =============================================================================

/// Up to two arcs into the same child, flipped together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleSet {
    arcs: [ArcRef; 2],
    len: u8,
}

impl ToggleSet {
    pub fn single(arc: ArcRef) -> Self {
        Self {
            arcs: [arc, arc],
            len: 1,
        }
    }

    /// Two distinct arcs into the same child.
    pub fn pair(first: ArcRef, second: ArcRef) -> Option<Self> {
        (first.child == second.child && first != second).then_some(Self {
            arcs: [first, second],
            len: 2,
        })
    }

    pub fn child(&self) -> VarId {
        self.arcs[0].child
    }

    pub fn arcs(&self) -> &[ArcRef] {
        &self.arcs[..self.len as usize]
    }

    /// Net change in the child's total parent count if applied to `model`.
    pub fn parent_delta<M: StructureModel>(&self, model: &M) -> isize {
        self.arcs()
            .iter()
            .map(|&arc| if model.has_arc(arc) { -1 } else { 1 })
            .sum()
    }

    /// Check that every arc can be flipped on `model`.
    pub fn check<M: StructureModel>(&self, model: &M) -> GraphResult<()> {
        self.arcs().iter().try_for_each(|&arc| model.check_toggle(arc))
    }

    /// Whether applying keeps the child within the parent-count bound.
    ///
    /// A set that fails [`check`](Self::check) is never feasible.
    pub fn is_feasible<M: StructureModel>(&self, model: &M) -> bool {
        if self.check(model).is_err() {
            return false;
        }
        let after = model.num_parents(self.child()) as isize + self.parent_delta(model);
        after <= model.max_num_parents() as isize
    }

    /// Which relations the arcs belong to.
    pub fn mix(&self) -> ArcMix {
        let temporal = self.arcs().iter().filter(|a| a.is_temporal()).count();
        match (temporal, self.arcs().len()) {
            (0, _) => ArcMix::Intraslice,
            (t, n) if t == n => ArcMix::Temporal,
            _ => ArcMix::Cross,
        }
    }
}

/// Relations touched by a [`ToggleSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArcMix {
    Intraslice,
    Temporal,
    Cross,
}

/// A self-inverse change to a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proposal {
    /// Flip one or two arcs into a single child.
    Toggle(ToggleSet),
    /// Swap the variables at `pos` and `pos + 1`.
    Reorder { pos: usize },
}

impl Proposal {
    /// Check that the proposal names valid variables, arcs and positions.
    pub fn check<M: StructureModel>(&self, model: &M) -> GraphResult<()> {
        match *self {
            Proposal::Toggle(set) => set.check(model),
            Proposal::Reorder { pos } => {
                let num_nodes = model.num_nodes();
                if pos + 1 >= num_nodes {
                    return Err(GraphError::InvalidSwapPosition { pos, num_nodes });
                }
                Ok(())
            }
        }
    }

    /// Whether applying to `model` keeps every node within the parent-count bound.
    pub fn is_feasible<M: StructureModel>(&self, model: &M) -> bool {
        match *self {
            Proposal::Toggle(set) => set.is_feasible(model),
            Proposal::Reorder { pos } => {
                if pos + 1 >= model.num_nodes() {
                    return false;
                }
                let left = model.node_at(pos);
                let right = model.node_at(pos + 1);
                !model.is_arc(left, right) || model.num_parents(left) < model.max_num_parents()
            }
        }
    }
}

/// Outcome of one attempted transformation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The draw would violate the parent-count bound; nothing was evaluated.
    Infeasible,
    /// Evaluated and reverted; the model is unchanged.
    Rejected { delta: f64 },
    /// Evaluated and kept; total cost changed by `delta`.
    Accepted { delta: f64 },
}

impl StepOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, StepOutcome::Accepted { .. })
    }

    /// Cost change of the evaluated proposal, if it was evaluated.
    pub fn delta(&self) -> Option<f64> {
        match *self {
            StepOutcome::Infeasible => None,
            StepOutcome::Rejected { delta } | StepOutcome::Accepted { delta } => Some(delta),
        }
    }
}

// =============================================================================
// Random draws
// =============================================================================

/// The candidate at `index` in `child`'s pool: temporal candidates first,
/// then the variables preceding `child` in the order.
pub fn candidate<M: StructureModel>(model: &M, child: VarId, index: usize) -> ArcRef {
    let temporal = model.num_temporal_candidates();
    if index < temporal {
        ArcRef::temporal(VarId(index), child)
    } else {
        ArcRef::intraslice(model.node_at(index - temporal), child)
    }
}

fn random_var<M: StructureModel, R: Rng + ?Sized>(model: &M, rng: &mut R) -> VarId {
    VarId(rng.random_range(0..model.num_nodes()))
}

fn feasible(set: ToggleSet, model: &impl StructureModel) -> Option<Proposal> {
    set.is_feasible(model).then_some(Proposal::Toggle(set))
}

/// Flip one intraslice arc between two distinct variables.
pub fn propose_single_arc<M: StructureModel, R: Rng + ?Sized>(
    model: &M,
    rng: &mut R,
) -> Option<Proposal> {
    let n = model.num_nodes();
    if n < 2 {
        return None;
    }
    let a = rng.random_range(0..n);
    let b = (a + rng.random_range(1..n)) % n;
    let (a, b) = (VarId(a), VarId(b));
    let arc = if model.node_pos(a) < model.node_pos(b) {
        ArcRef::intraslice(a, b)
    } else {
        ArcRef::intraslice(b, a)
    };
    feasible(ToggleSet::single(arc), model)
}

/// Flip one temporal arc; self-lags are allowed.
pub fn propose_temporal_arc<M: TemporalModel, R: Rng + ?Sized>(
    model: &M,
    rng: &mut R,
) -> Option<Proposal> {
    if model.num_nodes() == 0 {
        return None;
    }
    let child = random_var(model, rng);
    let parent = random_var(model, rng);
    feasible(ToggleSet::single(ArcRef::temporal(parent, child)), model)
}

/// Flip two distinct candidate arcs of one child together.
pub fn propose_double_arc<M: StructureModel, R: Rng + ?Sized>(
    model: &M,
    rng: &mut R,
) -> Option<Proposal> {
    if model.num_nodes() == 0 {
        return None;
    }
    let child = random_var(model, rng);
    let pool = model.num_candidates(child);
    if pool < 2 {
        return None;
    }
    let a = rng.random_range(0..pool);
    let b = (a + rng.random_range(1..pool)) % pool;
    let set = ToggleSet::pair(candidate(model, child, a), candidate(model, child, b))?;
    feasible(set, model)
}

/// Replace one existing parent of a child with a non-parent candidate.
///
/// Never changes the parent count, so it is always feasible once drawn.
pub fn propose_parent_swap<M: StructureModel, R: Rng + ?Sized>(
    model: &M,
    rng: &mut R,
) -> Option<Proposal> {
    if model.num_nodes() == 0 {
        return None;
    }
    let child = random_var(model, rng);
    let intraslice = model.parents(child);
    let temporal = model.temporal_parents(child);
    let k = intraslice.len() + temporal.len();
    let pool = model.num_candidates(child);
    if k == 0 || k == pool {
        return None;
    }

    let pick = rng.random_range(0..k);
    let old = if pick < intraslice.len() {
        ArcRef::intraslice(intraslice[pick], child)
    } else {
        ArcRef::temporal(temporal[pick - intraslice.len()], child)
    };

    // uniform over the pool minus the current parents, by rejection
    let new = loop {
        let arc = candidate(model, child, rng.random_range(0..pool));
        if !model.has_arc(arc) {
            break arc;
        }
    };
    ToggleSet::pair(old, new).map(Proposal::Toggle)
}

/// Swap two adjacent variables in the order, reversing an arc between them.
pub fn propose_order_swap<M: StructureModel, R: Rng + ?Sized>(
    model: &M,
    rng: &mut R,
) -> Option<Proposal> {
    let n = model.num_nodes();
    if n < 2 {
        return None;
    }
    let proposal = Proposal::Reorder {
        pos: rng.random_range(0..n - 1),
    };
    proposal.is_feasible(model).then_some(proposal)
}

// =============================================================================
// Move sets
// =============================================================================

/// A closed set of moves available for one model type.
pub trait MoveKind: Copy + Eq + Hash + fmt::Debug + 'static {
    type Model: StructureModel;

    /// Every move in the set.
    fn all() -> &'static [Self];

    fn label(self) -> &'static str;

    /// Relative frequency from the configuration.
    fn weight(self, weights: &MoveWeights) -> f64;

    fn propose<R: Rng + ?Sized>(self, model: &Self::Model, rng: &mut R) -> Option<Proposal>;
}

/// Moves over a static [`Tom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaticMove {
    SingleArc,
    DoubleArc,
    ParentSwap,
    OrderSwap,
}

impl MoveKind for StaticMove {
    type Model = Tom;

    fn all() -> &'static [Self] {
        &[
            StaticMove::SingleArc,
            StaticMove::DoubleArc,
            StaticMove::ParentSwap,
            StaticMove::OrderSwap,
        ]
    }

    fn label(self) -> &'static str {
        match self {
            StaticMove::SingleArc => "single_arc",
            StaticMove::DoubleArc => "double_arc",
            StaticMove::ParentSwap => "parent_swap",
            StaticMove::OrderSwap => "order_swap",
        }
    }

    fn weight(self, weights: &MoveWeights) -> f64 {
        match self {
            StaticMove::SingleArc => weights.single_arc,
            StaticMove::DoubleArc => weights.double_arc,
            StaticMove::ParentSwap => weights.parent_swap,
            StaticMove::OrderSwap => weights.order_swap,
        }
    }

    fn propose<R: Rng + ?Sized>(self, model: &Tom, rng: &mut R) -> Option<Proposal> {
        match self {
            StaticMove::SingleArc => propose_single_arc(model, rng),
            StaticMove::DoubleArc => propose_double_arc(model, rng),
            StaticMove::ParentSwap => propose_parent_swap(model, rng),
            StaticMove::OrderSwap => propose_order_swap(model, rng),
        }
    }
}

/// Moves over a dynamic [`Dtom`]. Pools mix temporal and intraslice candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicMove {
    SingleArc,
    TemporalArc,
    DoubleArc,
    ParentSwap,
    OrderSwap,
}

impl MoveKind for DynamicMove {
    type Model = Dtom;

    fn all() -> &'static [Self] {
        &[
            DynamicMove::SingleArc,
            DynamicMove::TemporalArc,
            DynamicMove::DoubleArc,
            DynamicMove::ParentSwap,
            DynamicMove::OrderSwap,
        ]
    }

    fn label(self) -> &'static str {
        match self {
            DynamicMove::SingleArc => "single_arc",
            DynamicMove::TemporalArc => "temporal_arc",
            DynamicMove::DoubleArc => "double_arc",
            DynamicMove::ParentSwap => "parent_swap",
            DynamicMove::OrderSwap => "order_swap",
        }
    }

    fn weight(self, weights: &MoveWeights) -> f64 {
        match self {
            DynamicMove::SingleArc => weights.single_arc,
            DynamicMove::TemporalArc => weights.temporal_arc,
            DynamicMove::DoubleArc => weights.double_arc,
            DynamicMove::ParentSwap => weights.parent_swap,
            DynamicMove::OrderSwap => weights.order_swap,
        }
    }

    fn propose<R: Rng + ?Sized>(self, model: &Dtom, rng: &mut R) -> Option<Proposal> {
        match self {
            DynamicMove::SingleArc => propose_single_arc(model, rng),
            DynamicMove::TemporalArc => propose_temporal_arc(model, rng),
            DynamicMove::DoubleArc => propose_double_arc(model, rng),
            DynamicMove::ParentSwap => propose_parent_swap(model, rng),
            DynamicMove::OrderSwap => propose_order_swap(model, rng),
        }
    }
}

// =============================================================================
// Application
// =============================================================================

/// Applies proposals to a model and remembers which nodes the last one touched.
#[derive(Debug, Clone, Default)]
pub struct Transformer {
    changed: [VarId; 2],
    num_changed: usize,
}

impl Transformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes whose parent sets the last evaluated proposal changed.
    pub fn nodes_changed(&self) -> &[VarId] {
        &self.changed[..self.num_changed]
    }

    /// Draw a `kind` proposal and run it through [`apply`](Self::apply).
    pub fn transform<K, O, C, R>(
        &mut self,
        kind: K,
        model: &mut K::Model,
        ctx: &mut ChainContext<O, C>,
        rng: &mut R,
    ) -> SearchResult<StepOutcome>
    where
        K: MoveKind,
        O: CostOracle,
        C: StructureCoster,
        R: Rng + ?Sized,
    {
        match kind.propose(&*model, rng) {
            Some(proposal) => self.apply(proposal, model, ctx, rng),
            None => {
                self.num_changed = 0;
                Ok(StepOutcome::Infeasible)
            }
        }
    }

    /// Cost `proposal`, apply it, and keep or revert it by the Metropolis rule.
    ///
    /// A malformed proposal returns a [`GraphError`] and leaves `model` untouched.
    pub fn apply<M, O, C, R>(
        &mut self,
        proposal: Proposal,
        model: &mut M,
        ctx: &mut ChainContext<O, C>,
        rng: &mut R,
    ) -> SearchResult<StepOutcome>
    where
        M: StructureModel,
        O: CostOracle,
        C: StructureCoster,
        R: Rng + ?Sized,
    {
        self.num_changed = 0;
        proposal.check(&*model)?;
        if !proposal.is_feasible(&*model) {
            return Ok(StepOutcome::Infeasible);
        }
        match proposal {
            Proposal::Toggle(set) => self.apply_toggle(set, model, ctx, rng),
            Proposal::Reorder { pos } => self.apply_reorder(pos, model, ctx, rng),
        }
    }

    fn apply_toggle<M, O, C, R>(
        &mut self,
        set: ToggleSet,
        model: &mut M,
        ctx: &mut ChainContext<O, C>,
        rng: &mut R,
    ) -> SearchResult<StepOutcome>
    where
        M: StructureModel,
        O: CostOracle,
        C: StructureCoster,
        R: Rng + ?Sized,
    {
        let child = set.child();
        self.changed[0] = child;
        self.num_changed = 1;

        let (oracle, coster) = ctx.costers_mut();
        let old_cost = oracle.mml_cost(&*model, child)?;
        let structure_delta = coster.cost_to_toggle(&*model, set.arcs());
        for &arc in set.arcs() {
            model.toggle(arc)?;
        }
        let new_cost = oracle.mml_cost(&*model, child)?;
        let delta = new_cost - old_cost + structure_delta;

        if metropolis_accept(delta, ctx.temperature(), rng) {
            for &arc in set.arcs() {
                ctx.record_toggle(arc, model.has_arc(arc));
            }
            debug!(child = %child, delta, mix = ?set.mix(), "toggle_accepted");
            Ok(StepOutcome::Accepted { delta })
        } else {
            for &arc in set.arcs().iter().rev() {
                model.toggle(arc)?;
            }
            Ok(StepOutcome::Rejected { delta })
        }
    }

    fn apply_reorder<M, O, C, R>(
        &mut self,
        pos: usize,
        model: &mut M,
        ctx: &mut ChainContext<O, C>,
        rng: &mut R,
    ) -> SearchResult<StepOutcome>
    where
        M: StructureModel,
        O: CostOracle,
        C: StructureCoster,
        R: Rng + ?Sized,
    {
        let left = model.node_at(pos);
        let right = model.node_at(pos + 1);
        let reversed = model.is_arc(left, right);
        self.changed = [left, right];
        self.num_changed = 2;

        let (oracle, coster) = ctx.costers_mut();
        let old_cost = oracle.mml_cost(&*model, left)? + oracle.mml_cost(&*model, right)?;
        let structure_delta = coster.cost_to_swap_order(&*model, pos);
        model.swap_adjacent(pos)?;
        let new_cost = oracle.mml_cost(&*model, left)? + oracle.mml_cost(&*model, right)?;
        let delta = new_cost - old_cost + structure_delta;

        if metropolis_accept(delta, ctx.temperature(), rng) {
            if reversed {
                ctx.record_toggle(ArcRef::intraslice(left, right), false);
                ctx.record_toggle(ArcRef::intraslice(right, left), true);
            }
            debug!(pos, delta, reversed, "reorder_accepted");
            Ok(StepOutcome::Accepted { delta })
        } else {
            model.swap_adjacent(pos)?;
            Ok(StepOutcome::Rejected { delta })
        }
    }
}
