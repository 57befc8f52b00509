//! Metropolis search driver.
//!
//! [`MetropolisSearch`] owns one chain: a model, its [`ChainContext`] and a
//! seeded RNG. A run is an annealed burn-in followed by sampling at the
//! configured temperature, during which arc weights are accumulated.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use mml_core::{Dataset, Dtom, NetworkSnapshot, SliceLayout, StructureModel, Tom, VarId};

use crate::config::SearchConfig;
use crate::context::ChainContext;
use crate::coster::{PriorCoster, StructureCoster};
use crate::error::{SearchError, SearchResult};
use crate::oracle::{CacheStats, CostOracle, NodeCache};
use crate::transform::{DynamicMove, MoveKind, StaticMove, StepOutcome, Transformer};
use crate::weights::ArcProbabilities;

/// Static search over a dataset of independent cases.
pub type StaticSearch = MetropolisSearch<StaticMove, NodeCache, PriorCoster>;

/// Dynamic search over a time series.
pub type DynamicSearch = MetropolisSearch<DynamicMove, NodeCache, PriorCoster>;

/// Counters for one move kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveStats {
    pub proposed: u64,
    pub infeasible: u64,
    pub rejected: u64,
    pub accepted: u64,
}

impl MoveStats {
    fn record(&mut self, outcome: &StepOutcome) {
        self.proposed += 1;
        match outcome {
            StepOutcome::Infeasible => self.infeasible += 1,
            StepOutcome::Rejected { .. } => self.rejected += 1,
            StepOutcome::Accepted { .. } => self.accepted += 1,
        }
    }

    /// Accepted fraction of evaluated (feasible) proposals.
    pub fn acceptance_rate(&self) -> f64 {
        let evaluated = self.accepted + self.rejected;
        if evaluated == 0 {
            0.0
        } else {
            self.accepted as f64 / evaluated as f64
        }
    }
}

/// Per-move counters as they appear in a summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveReport {
    pub kind: String,
    #[serde(flatten)]
    pub stats: MoveStats,
}

/// Result of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepResult {
    /// Step number (0-indexed, counting burn-in).
    pub step: u64,
    /// Label of the move drawn.
    pub kind: &'static str,
    pub outcome: StepOutcome,
    /// Total cost after the step.
    pub cost: f64,
}

/// Serializable report of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSummary {
    pub burn_in_steps: usize,
    pub sampling_steps: usize,
    pub initial_cost: f64,
    pub final_cost: f64,
    pub best_cost: f64,
    pub best_network: NetworkSnapshot,
    pub final_network: NetworkSnapshot,
    pub arc_probabilities: Option<ArcProbabilities>,
    pub moves: Vec<MoveReport>,
    pub cache: Option<CacheStats>,
}

impl SearchSummary {
    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> SearchResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Temperature at burn-in step `step` of `total`, cooling from `start` to `end`.
///
/// Geometric when both ends are positive, linear otherwise.
pub fn anneal_temperature(start: f64, end: f64, step: usize, total: usize) -> f64 {
    if total <= 1 {
        return end;
    }
    let progress = step as f64 / (total - 1) as f64;
    if start > 0.0 && end > 0.0 {
        start * (end / start).powf(progress)
    } else {
        start + (end - start) * progress
    }
}

/// One Markov chain over structures of the kind `K` moves over.
pub struct MetropolisSearch<K: MoveKind, O, C> {
    model: K::Model,
    ctx: ChainContext<O, C>,
    transformer: Transformer,
    config: SearchConfig,
    rng: StdRng,

    /// Moves with positive weight and their cumulative weights.
    mix: Vec<(K, f64)>,
    stats: Vec<MoveStats>,

    names: Vec<String>,
    initial_cost: f64,
    current_cost: f64,
    best_cost: f64,
    best_model: K::Model,
    current_step: u64,
}

impl<K, O, C> MetropolisSearch<K, O, C>
where
    K: MoveKind,
    O: CostOracle,
    C: StructureCoster,
{
    /// Start a chain at `model`, seeding the RNG from the configuration.
    pub fn new(model: K::Model, mut ctx: ChainContext<O, C>, config: SearchConfig) -> SearchResult<Self> {
        config.validate()?;
        model.validate()?;

        let mut mix = Vec::new();
        let mut cumulative = 0.0;
        for &kind in K::all() {
            let weight = kind.weight(&config.move_weights);
            if weight > 0.0 {
                cumulative += weight;
                mix.push((kind, cumulative));
            }
        }
        if mix.is_empty() {
            return Err(SearchError::invalid_config(
                "no move available to this model has a positive weight",
            ));
        }

        let initial_cost = ctx.oracle_mut().total_cost(&model)? + ctx.coster().structure_cost(&model);
        ctx.set_temperature(config.anneal_start_temperature);

        Ok(Self {
            best_model: model.clone(),
            model,
            ctx,
            transformer: Transformer::new(),
            rng: StdRng::seed_from_u64(config.seed),
            stats: vec![MoveStats::default(); mix.len()],
            mix,
            config,
            names: Vec::new(),
            initial_cost,
            current_cost: initial_cost,
            best_cost: initial_cost,
            current_step: 0,
        })
    }

    /// Name variables in snapshots and summaries (builder pattern).
    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = names;
        self
    }

    pub fn model(&self) -> &K::Model {
        &self.model
    }

    pub fn context(&self) -> &ChainContext<O, C> {
        &self.ctx
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Running total cost of the current model.
    pub fn current_cost(&self) -> f64 {
        self.current_cost
    }

    pub fn best_cost(&self) -> f64 {
        self.best_cost
    }

    /// Lowest-cost model visited so far.
    pub fn best_model(&self) -> &K::Model {
        &self.best_model
    }

    pub fn step_count(&self) -> u64 {
        self.current_step
    }

    /// Counters per move kind with positive weight, in [`MoveKind::all`] order.
    pub fn move_stats(&self) -> Vec<MoveReport> {
        self.mix
            .iter()
            .zip(&self.stats)
            .map(|((kind, _), stats)| MoveReport {
                kind: kind.label().to_string(),
                stats: *stats,
            })
            .collect()
    }

    /// Total cost of the current model computed from scratch.
    pub fn recompute_cost(&mut self) -> SearchResult<f64> {
        Ok(self.ctx.oracle_mut().total_cost(&self.model)?
            + self.ctx.coster().structure_cost(&self.model))
    }

    fn choose_move(&mut self) -> (usize, K) {
        let total = self.mix.last().map(|&(_, w)| w).unwrap_or(0.0);
        let draw = self.rng.random::<f64>() * total;
        let index = self
            .mix
            .iter()
            .position(|&(_, cumulative)| draw < cumulative)
            .unwrap_or(self.mix.len() - 1);
        (index, self.mix[index].0)
    }

    /// Draw a move, attempt it and update the running cost.
    pub fn step(&mut self) -> SearchResult<StepResult> {
        let (index, kind) = self.choose_move();
        let outcome = self
            .transformer
            .transform(kind, &mut self.model, &mut self.ctx, &mut self.rng)?;
        self.stats[index].record(&outcome);

        if let StepOutcome::Accepted { delta } = outcome {
            self.current_cost += delta;
            if self.current_cost < self.best_cost {
                self.best_cost = self.current_cost;
                self.best_model = self.model.clone();
            }
        }

        let result = StepResult {
            step: self.current_step,
            kind: kind.label(),
            outcome,
            cost: self.current_cost,
        };
        self.current_step += 1;
        Ok(result)
    }

    /// Run the configured burn-in and sampling phases.
    pub fn run(&mut self) -> SearchResult<SearchSummary> {
        let burn_in = self.config.burn_in_steps;
        let sampling = self.config.sampling_steps;
        info!(
            nodes = self.model.num_nodes(),
            burn_in,
            sampling,
            initial_cost = self.current_cost,
            "metropolis_run_start"
        );

        for i in 0..burn_in {
            let temperature = anneal_temperature(
                self.config.anneal_start_temperature,
                self.config.temperature,
                i,
                burn_in,
            );
            self.ctx.set_temperature(temperature);
            self.step()?;
        }
        debug!(cost = self.current_cost, arcs = self.model.num_arcs(), "burn_in_complete");

        self.ctx.set_temperature(self.config.temperature);
        self.stats.iter_mut().for_each(|s| *s = MoveStats::default());
        if self.config.track_arc_weights {
            self.ctx.start_tracking(&self.model);
        }

        let report_every = (sampling / 10).max(1);
        for i in 0..sampling {
            let result = self.step()?;
            self.ctx.advance(1.0);
            if (i + 1) % report_every == 0 {
                debug!(
                    step = result.step,
                    cost = result.cost,
                    best_cost = self.best_cost,
                    "metropolis_progress"
                );
            }
        }

        let summary = self.summary();
        info!(
            final_cost = summary.final_cost,
            best_cost = summary.best_cost,
            arcs = self.model.num_arcs(),
            "metropolis_run_complete"
        );
        Ok(summary)
    }

    /// Snapshot of the chain as it stands.
    pub fn summary(&self) -> SearchSummary {
        SearchSummary {
            burn_in_steps: self.config.burn_in_steps,
            sampling_steps: self.config.sampling_steps,
            initial_cost: self.initial_cost,
            final_cost: self.current_cost,
            best_cost: self.best_cost,
            best_network: NetworkSnapshot::from_model(&self.best_model, &self.names),
            final_network: NetworkSnapshot::from_model(&self.model, &self.names),
            arc_probabilities: self
                .ctx
                .is_tracking()
                .then(|| self.ctx.arc_probabilities(&self.model, &self.names)),
            moves: self.move_stats(),
            cache: self.ctx.oracle().stats(),
        }
    }
}

impl<K: MoveKind, O, C> std::fmt::Debug for MetropolisSearch<K, O, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetropolisSearch")
            .field("current_step", &self.current_step)
            .field("current_cost", &self.current_cost)
            .field("best_cost", &self.best_cost)
            .field("moves", &self.mix)
            .finish()
    }
}

fn shuffled_order(num_nodes: usize, seed: u64) -> Vec<VarId> {
    let mut order: Vec<VarId> = (0..num_nodes).map(VarId).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    order
}

fn context_for(
    data: Arc<Dataset>,
    layout: SliceLayout,
    config: &SearchConfig,
) -> SearchResult<ChainContext<NodeCache, PriorCoster>> {
    let num_nodes = data.num_vars();
    let cache = NodeCache::new(data, layout, config.max_cached_costs)?;
    Ok(ChainContext::new(
        cache,
        config.structure_prior.coster(),
        num_nodes,
        config.anneal_start_temperature,
    ))
}

/// Chain over static networks for `data`, starting from an empty network on a
/// seeded random order.
pub fn static_search(data: Arc<Dataset>, config: SearchConfig) -> SearchResult<StaticSearch> {
    config.validate()?;
    let names = data.names().to_vec();
    let order = shuffled_order(data.num_vars(), config.seed);
    let model = Tom::with_order(order, config.max_parents)?;
    let ctx = context_for(data, SliceLayout::Static, &config)?;
    ctx.oracle().check_model(&model)?;
    Ok(MetropolisSearch::new(model, ctx, config)?.with_names(names))
}

/// Chain over dynamic networks for the time series `data`.
pub fn dynamic_search(data: Arc<Dataset>, config: SearchConfig) -> SearchResult<DynamicSearch> {
    config.validate()?;
    let names = data.names().to_vec();
    let order = shuffled_order(data.num_vars(), config.seed);
    let model = Dtom::with_order(order, config.max_parents)?;
    let ctx = context_for(data, SliceLayout::TimeSeries, &config)?;
    ctx.oracle().check_model(&model)?;
    Ok(MetropolisSearch::new(model, ctx, config)?.with_names(names))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MoveWeights;
    use crate::test_fixtures::{chain_dataset, independent_dataset, lagged_dataset};
    use mml_core::{ArcRef, Relation};

    fn quick_config() -> SearchConfig {
        SearchConfig {
            burn_in_steps: 200,
            sampling_steps: 800,
            seed: 11,
            ..Default::default()
        }
    }

    #[test]
    fn test_anneal_schedule_endpoints() {
        assert!((anneal_temperature(4.0, 1.0, 0, 10) - 4.0).abs() < 1e-12);
        assert!((anneal_temperature(4.0, 1.0, 9, 10) - 1.0).abs() < 1e-12);
        assert_eq!(anneal_temperature(2.0, 0.0, 5, 11), 1.0);
        assert_eq!(anneal_temperature(2.0, 0.5, 0, 0), 0.5);
    }

    #[test]
    fn test_running_cost_matches_recompute() {
        let data = Arc::new(chain_dataset(300, 4).unwrap());
        let mut search = static_search(data, quick_config()).unwrap();
        for _ in 0..300 {
            search.step().unwrap();
        }
        let recomputed = search.recompute_cost().unwrap();
        assert!((search.current_cost() - recomputed).abs() < 1e-6);
        assert!(search.best_cost() <= search.current_cost() + 1e-9);
        assert!(search.model().validate().is_ok());
    }

    #[test]
    fn test_static_run_finds_chain_dependencies() {
        let data = Arc::new(chain_dataset(500, 1).unwrap());
        let mut search = static_search(data, quick_config()).unwrap();
        let summary = search.run().unwrap();

        assert!(summary.best_cost < summary.initial_cost);
        let probs = summary.arc_probabilities.unwrap();
        // the skeleton edge x0 - x1 is present in one direction or the other
        let x01 = probs.get(ArcRef::intraslice(VarId(0), VarId(1)))
            + probs.get(ArcRef::intraslice(VarId(1), VarId(0)));
        assert!(x01 > 0.5, "x0 - x1 probability {x01}");
        assert_eq!(summary.best_network.variables[0], "x0");
        assert!(summary.cache.unwrap().hits > 0);
    }

    #[test]
    fn test_dynamic_run_finds_self_lag() {
        let data = Arc::new(lagged_dataset(400, 2).unwrap());
        let mut search = dynamic_search(data, quick_config()).unwrap();
        let summary = search.run().unwrap();

        let probs = summary.arc_probabilities.unwrap();
        assert!(probs.temporal.is_some());
        // the lag of x0 must be explained through x0 or its copy x1
        let lagged: f64 = (0..3)
            .flat_map(|p| [0, 1].map(|c| ArcRef::temporal(VarId(p), VarId(c))))
            .map(|arc| probs.get(arc))
            .sum();
        assert!(lagged > 0.5, "temporal mass {lagged}");
        assert!(summary.best_network.dynamic);
        assert!(summary.best_network.count(Relation::Temporal) >= 1);
    }

    #[test]
    fn test_same_seed_same_summary() {
        let data = Arc::new(independent_dataset(4, 100, 3).unwrap());
        let a = static_search(data.clone(), quick_config()).unwrap().run().unwrap();
        let b = static_search(data, quick_config()).unwrap().run().unwrap();
        assert_eq!(a.final_cost, b.final_cost);
        assert_eq!(a.final_network, b.final_network);
        assert_eq!(a.moves, b.moves);
    }

    #[test]
    fn test_move_stats_only_cover_sampling() {
        let data = Arc::new(independent_dataset(3, 50, 3).unwrap());
        let mut search = static_search(data, quick_config()).unwrap();
        let summary = search.run().unwrap();
        let proposed: u64 = summary.moves.iter().map(|m| m.stats.proposed).sum();
        assert_eq!(proposed, 800);
    }

    #[test]
    fn test_static_ignores_temporal_weight() {
        let config = SearchConfig {
            move_weights: MoveWeights {
                single_arc: 0.0,
                temporal_arc: 1.0,
                double_arc: 0.0,
                parent_swap: 0.0,
                order_swap: 0.0,
            },
            ..quick_config()
        };
        let data = Arc::new(independent_dataset(3, 50, 3).unwrap());
        let err = static_search(data, config).unwrap_err();
        assert!(matches!(err, SearchError::InvalidConfig { .. }));
    }

    #[test]
    fn test_summary_serializes() {
        let data = Arc::new(independent_dataset(3, 40, 5).unwrap());
        let config = SearchConfig {
            burn_in_steps: 10,
            sampling_steps: 20,
            ..Default::default()
        };
        let summary = static_search(data, config).unwrap().run().unwrap();
        let json = summary.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["sampling_steps"], 20);
        assert!(value["moves"][0]["accepted"].is_u64());
    }
}
