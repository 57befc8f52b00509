//! Serializable snapshots of a learned structure.
//!
//! A snapshot is the hand-off format for presentation and export layers. It
//! can also be turned into a petgraph graph for analysis.

use petgraph::algo::is_cyclic_directed;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use serde::{Deserialize, Serialize};

use crate::model::StructureModel;
use crate::{Relation, VarId};

/// One arc of an exported network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedArc {
    /// Parent variable.
    pub parent: VarId,
    /// Child variable.
    pub child: VarId,
    /// Arc relation.
    pub relation: Relation,
}

/// A point-in-time copy of a network structure with variable names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    /// Variable names, indexed by variable.
    pub variables: Vec<String>,
    /// Total order, indexed by position.
    pub order: Vec<VarId>,
    /// All arcs, intraslice first.
    pub arcs: Vec<ExportedArc>,
    /// Whether the network has a previous time slice.
    #[serde(default)]
    pub dynamic: bool,
}

impl NetworkSnapshot {
    /// Capture `model`, naming variables with `names`.
    pub fn from_model<M: StructureModel>(model: &M, names: &[String]) -> Self {
        let n = model.num_nodes();
        let variables = (0..n)
            .map(|i| names.get(i).cloned().unwrap_or_else(|| VarId(i).to_string()))
            .collect();
        let order = (0..n).map(|pos| model.node_at(pos)).collect();

        let mut arcs = Vec::new();
        for child in (0..n).map(VarId) {
            arcs.extend(model.parents(child).iter().map(|&parent| ExportedArc {
                parent,
                child,
                relation: Relation::Intraslice,
            }));
        }
        for child in (0..n).map(VarId) {
            arcs.extend(
                model
                    .temporal_parents(child)
                    .iter()
                    .map(|&parent| ExportedArc {
                        parent,
                        child,
                        relation: Relation::Temporal,
                    }),
            );
        }

        Self {
            variables,
            order,
            arcs,
            dynamic: model.num_temporal_candidates() > 0,
        }
    }

    /// Number of arcs in `relation`.
    pub fn count(&self, relation: Relation) -> usize {
        self.arcs.iter().filter(|a| a.relation == relation).count()
    }

    /// Build a petgraph graph. Temporal parents become separate `name[t-1]` nodes.
    pub fn to_petgraph(&self) -> StableDiGraph<String, Relation> {
        let mut graph = StableDiGraph::new();
        let current: Vec<NodeIndex> = self
            .variables
            .iter()
            .map(|name| graph.add_node(name.clone()))
            .collect();

        let mut previous: Vec<Option<NodeIndex>> = vec![None; self.variables.len()];
        for arc in &self.arcs {
            let to = current[arc.child.index()];
            let from = match arc.relation {
                Relation::Intraslice => current[arc.parent.index()],
                Relation::Temporal => *previous[arc.parent.index()].get_or_insert_with(|| {
                    graph.add_node(format!("{}[t-1]", self.variables[arc.parent.index()]))
                }),
            };
            graph.add_edge(from, to, arc.relation);
        }
        graph
    }

    /// Whether the exported structure is a DAG.
    pub fn is_acyclic(&self) -> bool {
        !is_cyclic_directed(&self.to_petgraph())
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
