//! Shared state of one Markov chain.
//!
//! A [`ChainContext`] owns the cost oracle, the structure prior and the arc
//! weight accumulators. Every mover of a chain borrows the same context, so
//! two chains never share memoized costs or weights unless they share a
//! context.

use tracing::debug;

use mml_core::{ArcRef, StructureModel};

use crate::coster::StructureCoster;
use crate::oracle::CostOracle;
use crate::weights::{ArcProbabilities, ArcWeights};

/// Oracle, prior and bookkeeping shared by every mover of a chain.
#[derive(Debug, Clone)]
pub struct ChainContext<O, C> {
    oracle: O,
    coster: C,
    arc_weights: ArcWeights,
    total_weight: f64,
    update_arc_weights: bool,
    temperature: f64,
}

impl<O: CostOracle, C: StructureCoster> ChainContext<O, C> {
    pub fn new(oracle: O, coster: C, num_nodes: usize, temperature: f64) -> Self {
        Self {
            oracle,
            coster,
            arc_weights: ArcWeights::new(num_nodes),
            total_weight: 0.0,
            update_arc_weights: false,
            temperature,
        }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn coster(&self) -> &C {
        &self.coster
    }

    /// Both collaborators at once, for a mover that queries them in turn.
    pub fn costers_mut(&mut self) -> (&mut O, &C) {
        (&mut self.oracle, &self.coster)
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn set_temperature(&mut self, temperature: f64) {
        self.temperature = temperature;
    }

    /// Whether accepted toggles are recorded into the arc weights.
    pub fn is_tracking(&self) -> bool {
        self.update_arc_weights
    }

    /// Cumulative sampling weight so far.
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    pub fn arc_weights(&self) -> &ArcWeights {
        &self.arc_weights
    }

    /// Start recording: open an interval for every arc currently in `model`.
    pub fn start_tracking<M: StructureModel>(&mut self, model: &M) {
        if self.update_arc_weights {
            return;
        }
        self.arc_weights.open_present(model, self.total_weight);
        self.update_arc_weights = true;
        debug!(
            total_weight = self.total_weight,
            arcs = model.num_arcs(),
            "arc_tracking_start"
        );
    }

    /// Record that an accepted step left `arc` present or absent.
    pub fn record_toggle(&mut self, arc: ArcRef, present: bool) {
        if self.update_arc_weights {
            self.arc_weights.record(arc, present, self.total_weight);
        }
    }

    /// Credit `weight` to the model the chain currently sits on.
    pub fn advance(&mut self, weight: f64) {
        if self.update_arc_weights {
            self.total_weight += weight;
        }
    }

    /// Normalized arc probabilities, closing the intervals still open in `model`.
    pub fn arc_probabilities<M: StructureModel>(
        &self,
        model: &M,
        names: &[String],
    ) -> ArcProbabilities {
        self.arc_weights.finalize(model, self.total_weight, names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coster::UniformParentCountCoster;
    use crate::oracle::NodeCache;
    use mml_core::{Dataset, SliceLayout, Tom, VarId};
    use std::sync::Arc;

    fn context() -> ChainContext<NodeCache, UniformParentCountCoster> {
        let names = vec!["a".to_string(), "b".to_string()];
        let data = Dataset::from_columns(names, vec![vec![0, 1, 1], vec![1, 1, 0]]).unwrap();
        let cache = NodeCache::new(Arc::new(data), SliceLayout::Static, 8).unwrap();
        ChainContext::new(cache, UniformParentCountCoster, 2, 1.0)
    }

    #[test]
    fn test_weights_only_move_while_tracking() {
        let mut ctx = context();
        let mut tom = Tom::new(2, 1);
        ctx.advance(5.0);
        ctx.record_toggle(ArcRef::intraslice(VarId(0), VarId(1)), true);
        assert_eq!(ctx.total_weight(), 0.0);

        ctx.start_tracking(&tom);
        ctx.advance(1.0);
        tom.add_arc(VarId(0), VarId(1)).unwrap();
        ctx.record_toggle(ArcRef::intraslice(VarId(0), VarId(1)), true);
        ctx.advance(1.0);

        let probs = ctx.arc_probabilities(&tom, &[]);
        assert_eq!(probs.total_weight, 2.0);
        assert!((probs.get(ArcRef::intraslice(VarId(0), VarId(1))) - 0.5).abs() < 1e-12);
    }
}
