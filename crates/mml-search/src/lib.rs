//! Metropolis search over totally ordered network structures.
//!
//! This crate scores and explores the models of [`mml_core`]. A chain is made
//! of three collaborating parts:
//!
//! - **Cost oracle** ([`NodeCache`]): memoized data cost of one node given its parents
//! - **Structure coster** ([`StructureCoster`]): prior cost of parent sets and its
//!   incremental changes under toggles and reorders
//! - **Transformer** ([`Transformer`]): proposes a local move, costs it
//!   incrementally and keeps or reverts it by the Metropolis rule
//!
//! ## Cost convention
//!
//! ```text
//! total(model) = structure_cost(model) + Σ_node mml_cost(model, node)      [nits]
//! delta        = (new_node_costs - old_node_costs) + structural_delta
//! accept       = delta <= 0  ||  U(0,1) < exp(-delta / T)
//! ```
//!
//! Only the nodes a move touches are re-costed; the driver keeps the running
//! total by adding the `delta` of every accepted step.

pub mod config;
pub mod context;
pub mod coster;
mod error;
pub mod metropolis;
pub mod oracle;
pub mod search;
pub mod transform;
pub mod weights;

#[doc(hidden)]
pub mod test_fixtures;

pub use config::{MoveWeights, SearchConfig, StructurePrior};
pub use context::ChainContext;
pub use coster::{
    ArcProbabilityCoster, PriorCoster, StructureCoster, UniformParentCountCoster,
    MAX_STRUCTURE_COST,
};
pub use error::{SearchError, SearchResult};
pub use metropolis::metropolis_accept;
pub use oracle::{CacheStats, CostOracle, LeafCoster, MultinomialLeaf, NodeCache};
pub use search::{
    anneal_temperature, dynamic_search, static_search, DynamicSearch, MetropolisSearch,
    MoveReport, MoveStats, SearchSummary, StaticSearch, StepResult,
};
pub use transform::{
    ArcMix, DynamicMove, MoveKind, Proposal, StaticMove, StepOutcome, ToggleSet, Transformer,
};
pub use weights::{ArcProbabilities, ArcWeights};
