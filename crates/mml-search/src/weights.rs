//! Running arc presence weights and their normalized posterior estimates.
//!
//! Weights use a signed-interval encoding: when an arc appears, the current
//! total weight is subtracted, and when it disappears it is added back. At
//! finalization every arc still present gets the total added once more, so
//! each entry becomes the weight accumulated while the arc was present.

use serde::{Deserialize, Serialize};

use mml_core::{ArcRef, Relation, StructureModel, VarId};

/// Per-arc accumulators, indexed `[child][parent]` per relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcWeights {
    num_nodes: usize,
    intraslice: Vec<f64>,
    temporal: Vec<f64>,
}

impl ArcWeights {
    pub fn new(num_nodes: usize) -> Self {
        Self {
            num_nodes,
            intraslice: vec![0.0; num_nodes * num_nodes],
            temporal: vec![0.0; num_nodes * num_nodes],
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn slot(&self, parent: VarId, child: VarId) -> usize {
        child.index() * self.num_nodes + parent.index()
    }

    /// Raw accumulator for `arc`.
    pub fn get(&self, arc: ArcRef) -> f64 {
        let slot = self.slot(arc.parent, arc.child);
        match arc.relation {
            Relation::Intraslice => self.intraslice[slot],
            Relation::Temporal => self.temporal[slot],
        }
    }

    fn get_mut(&mut self, arc: ArcRef) -> &mut f64 {
        let slot = self.slot(arc.parent, arc.child);
        match arc.relation {
            Relation::Intraslice => &mut self.intraslice[slot],
            Relation::Temporal => &mut self.temporal[slot],
        }
    }

    /// Record that `arc` just became present (or absent) at `total_weight`.
    pub fn record(&mut self, arc: ArcRef, present: bool, total_weight: f64) {
        let entry = self.get_mut(arc);
        if present {
            *entry -= total_weight;
        } else {
            *entry += total_weight;
        }
    }

    /// Open an interval for every arc of `model` at `total_weight`.
    pub fn open_present<M: StructureModel>(&mut self, model: &M, total_weight: f64) {
        for arc in present_arcs(model) {
            self.record(arc, true, total_weight);
        }
    }

    /// Close the open intervals of `model` and normalize by `total_weight`.
    pub fn finalize<M: StructureModel>(
        &self,
        model: &M,
        total_weight: f64,
        names: &[String],
    ) -> ArcProbabilities {
        let mut closed = self.clone();
        for arc in present_arcs(model) {
            closed.record(arc, false, total_weight);
        }

        let n = self.num_nodes;
        let normalize = |values: &[f64]| -> Vec<Vec<f64>> {
            values
                .chunks(n.max(1))
                .take(n)
                .map(|row| {
                    row.iter()
                        .map(|&w| if total_weight > 0.0 { w / total_weight } else { 0.0 })
                        .collect()
                })
                .collect()
        };

        ArcProbabilities {
            variables: names.to_vec(),
            intraslice: normalize(&closed.intraslice),
            temporal: (model.num_temporal_candidates() > 0).then(|| normalize(&closed.temporal)),
            total_weight,
        }
    }
}

fn present_arcs<M: StructureModel>(model: &M) -> impl Iterator<Item = ArcRef> + '_ {
    (0..model.num_nodes()).map(VarId).flat_map(move |child| {
        let intraslice = model
            .parents(child)
            .iter()
            .map(move |&parent| ArcRef::intraslice(parent, child));
        let temporal = model
            .temporal_parents(child)
            .iter()
            .map(move |&parent| ArcRef::temporal(parent, child));
        intraslice.chain(temporal)
    })
}

/// Estimated posterior probability of each arc, indexed `[child][parent]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcProbabilities {
    pub variables: Vec<String>,
    pub intraslice: Vec<Vec<f64>>,
    pub temporal: Option<Vec<Vec<f64>>>,
    pub total_weight: f64,
}

impl ArcProbabilities {
    /// Probability of `arc`; zero for temporal arcs of a static run.
    pub fn get(&self, arc: ArcRef) -> f64 {
        let table = match arc.relation {
            Relation::Intraslice => Some(&self.intraslice),
            Relation::Temporal => self.temporal.as_ref(),
        };
        table
            .and_then(|t| t.get(arc.child.index()))
            .and_then(|row| row.get(arc.parent.index()))
            .copied()
            .unwrap_or(0.0)
    }

    /// Arcs with probability at least `threshold`, most probable first.
    pub fn arcs_above(&self, threshold: f64) -> Vec<(ArcRef, f64)> {
        let mut arcs = Vec::new();
        let tables = [
            (Relation::Intraslice, Some(&self.intraslice)),
            (Relation::Temporal, self.temporal.as_ref()),
        ];
        for (relation, table) in tables {
            let Some(table) = table else { continue };
            for (child, row) in table.iter().enumerate() {
                for (parent, &p) in row.iter().enumerate() {
                    if p > 0.0 && p >= threshold {
                        let arc = ArcRef {
                            parent: VarId(parent),
                            child: VarId(child),
                            relation,
                        };
                        arcs.push((arc, p));
                    }
                }
            }
        }
        arcs.sort_by(|a, b| b.1.total_cmp(&a.1));
        arcs
    }
}
