//! Data cost of a node given its parents, with memoization.
//!
//! [`NodeCache`] is the [`CostOracle`] the movers query. It keys results by
//! the node and its parent sets, so reverting a proposal and later proposing
//! it again costs a hash lookup instead of a pass over the data.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use statrs::function::factorial::ln_factorial;
use statrs::function::gamma::ln_gamma;
use tracing::{debug, warn};

use mml_core::{Dataset, SliceLayout, StructureModel, VarId};

use crate::error::{SearchError, SearchResult};

/// Source of per-node data costs.
pub trait CostOracle {
    /// Cost in nits of stating the data of `node` given its current parents in `model`.
    fn mml_cost<M: StructureModel>(&mut self, model: &M, node: VarId) -> SearchResult<f64>;

    /// Sum of [`mml_cost`](CostOracle::mml_cost) over every node.
    fn total_cost<M: StructureModel>(&mut self, model: &M) -> SearchResult<f64> {
        (0..model.num_nodes()).try_fold(0.0, |acc, v| Ok(acc + self.mml_cost(model, VarId(v))?))
    }

    /// Hit/miss counters, when the oracle memoizes.
    fn stats(&self) -> Option<CacheStats> {
        None
    }
}

/// Computes the data cost of one variable given explicit parent lists.
pub trait LeafCoster {
    fn leaf_cost(
        &self,
        data: &Dataset,
        layout: SliceLayout,
        child: VarId,
        parents: &[VarId],
        temporal_parents: &[VarId],
    ) -> SearchResult<f64>;
}

/// Adaptive multinomial code with a uniform Dirichlet prior per parent configuration.
///
/// For each observed configuration with counts `n_i` (summing to `n`) over
/// `a` child states the cost is `lnΓ(n + a) - lnΓ(a) - Σ ln(n_i!)`.
/// Unobserved configurations cost nothing, so only observed ones are stored.
/// They are summed in configuration order so costs are reproducible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MultinomialLeaf;

impl LeafCoster for MultinomialLeaf {
    fn leaf_cost(
        &self,
        data: &Dataset,
        layout: SliceLayout,
        child: VarId,
        parents: &[VarId],
        temporal_parents: &[VarId],
    ) -> SearchResult<f64> {
        let rows = data.current_rows(layout)?;
        let arity = data.arity(child);
        let values = data.column(child);

        // Mixed-radix strides over (intraslice, temporal) parent values.
        let mut strides = Vec::with_capacity(parents.len() + temporal_parents.len());
        let mut space: u128 = 1;
        for &parent in parents.iter().chain(temporal_parents) {
            strides.push(space);
            space = space
                .checked_mul(data.arity(parent) as u128)
                .ok_or(SearchError::ConfigurationOverflow { child })?;
        }
        let (intra_strides, temporal_strides) = strides.split_at(parents.len());

        let mut counts: BTreeMap<u128, Vec<u32>> = BTreeMap::new();
        for row in rows {
            let mut config = 0u128;
            for (&parent, &stride) in parents.iter().zip(intra_strides) {
                config += data.column(parent)[row] as u128 * stride;
            }
            for (&parent, &stride) in temporal_parents.iter().zip(temporal_strides) {
                config += data.column(parent)[row - 1] as u128 * stride;
            }
            counts.entry(config).or_insert_with(|| vec![0; arity])[values[row] as usize] += 1;
        }

        let ln_gamma_arity = ln_gamma(arity as f64);
        let cost = counts
            .values()
            .map(|states| {
                let total: u64 = states.iter().map(|&c| c as u64).sum();
                let saving: f64 = states.iter().map(|&c| ln_factorial(c as u64)).sum();
                ln_gamma((total + arity as u64) as f64) - ln_gamma_arity - saving
            })
            .sum();
        Ok(cost)
    }
}

/// Hit/miss counters of a [`NodeCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub flushes: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of lookups answered from the cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Parent sets as bitmasks when they fit, sorted lists otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ParentKey {
    Small { intraslice: u64, temporal: u64 },
    Large { intraslice: Vec<VarId>, temporal: Vec<VarId> },
}

impl ParentKey {
    fn new(num_nodes: usize, intraslice: &[VarId], temporal: &[VarId]) -> Self {
        if num_nodes <= 64 {
            let mask = |vars: &[VarId]| vars.iter().fold(0u64, |m, v| m | (1 << v.index()));
            Self::Small {
                intraslice: mask(intraslice),
                temporal: mask(temporal),
            }
        } else {
            Self::Large {
                intraslice: intraslice.to_vec(),
                temporal: temporal.to_vec(),
            }
        }
    }
}

/// Memoizing [`CostOracle`] over a shared dataset.
#[derive(Debug, Clone)]
pub struct NodeCache<L = MultinomialLeaf> {
    data: Arc<Dataset>,
    layout: SliceLayout,
    leaf: L,
    entries: HashMap<(VarId, ParentKey), f64>,
    max_entries: usize,
    stats: CacheStats,
}

impl NodeCache<MultinomialLeaf> {
    /// Cache over `data` with the adaptive multinomial code.
    pub fn new(data: Arc<Dataset>, layout: SliceLayout, max_entries: usize) -> SearchResult<Self> {
        Self::with_leaf(data, layout, MultinomialLeaf, max_entries)
    }
}

impl<L: LeafCoster> NodeCache<L> {
    /// Cache over `data` with a custom leaf coster.
    pub fn with_leaf(
        data: Arc<Dataset>,
        layout: SliceLayout,
        leaf: L,
        max_entries: usize,
    ) -> SearchResult<Self> {
        data.current_rows(layout)?;
        if max_entries == 0 {
            return Err(SearchError::invalid_config("max_cached_costs must be positive"));
        }
        Ok(Self {
            data,
            layout,
            leaf,
            entries: HashMap::new(),
            max_entries,
            stats: CacheStats::default(),
        })
    }

    /// The dataset being costed.
    pub fn data(&self) -> &Arc<Dataset> {
        &self.data
    }

    /// How rows map onto slices.
    pub fn layout(&self) -> SliceLayout {
        self.layout
    }

    /// Fail unless `model` has one node per dataset variable.
    pub fn check_model<M: StructureModel>(&self, model: &M) -> SearchResult<()> {
        if model.num_nodes() != self.data.num_vars() {
            return Err(SearchError::DatasetMismatch {
                model: model.num_nodes(),
                data: self.data.num_vars(),
            });
        }
        Ok(())
    }

    /// Cost of `node` computed from the data, bypassing the memo.
    pub fn uncached_cost<M: StructureModel>(&self, model: &M, node: VarId) -> SearchResult<f64> {
        self.leaf.leaf_cost(
            &self.data,
            self.layout,
            node,
            model.parents(node),
            model.temporal_parents(node),
        )
    }

    /// Drop every memoized cost.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats.entries = 0;
    }
}

impl<L: LeafCoster> CostOracle for NodeCache<L> {
    fn mml_cost<M: StructureModel>(&mut self, model: &M, node: VarId) -> SearchResult<f64> {
        let key = (
            node,
            ParentKey::new(
                model.num_nodes(),
                model.parents(node),
                model.temporal_parents(node),
            ),
        );
        if let Some(&cost) = self.entries.get(&key) {
            self.stats.hits += 1;
            return Ok(cost);
        }

        self.stats.misses += 1;
        let cost = self.uncached_cost(model, node)?;
        if !cost.is_finite() {
            warn!(node = %node, cost = %cost, "leaf_cost_not_finite");
        }

        if self.entries.len() >= self.max_entries {
            debug!(entries = self.entries.len(), "node_cache_flush");
            self.entries.clear();
            self.stats.flushes += 1;
        }
        self.entries.insert(key, cost);
        self.stats.entries = self.entries.len();
        Ok(cost)
    }

    fn stats(&self) -> Option<CacheStats> {
        Some(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mml_core::{Dtom, TemporalModel, Tom};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn copy_dataset() -> Arc<Dataset> {
        // y copies x exactly
        let x = vec![0, 1, 0, 1, 1, 0, 1, 0];
        let names = vec!["x".to_string(), "y".to_string()];
        Arc::new(Dataset::from_columns(names, vec![x.clone(), x]).unwrap())
    }

    #[test]
    fn test_root_cost_matches_closed_form() {
        let data = copy_dataset();
        let tom = Tom::new(2, 1);
        let cost = MultinomialLeaf
            .leaf_cost(&data, SliceLayout::Static, VarId(0), tom.parents(VarId(0)), &[])
            .unwrap();
        // four of each state: ln(9!) - ln(1!) - 2 ln(4!)
        let expected = ln_factorial(9) - 2.0 * ln_factorial(4);
        assert!(close(cost, expected));
    }

    #[test]
    fn test_dependent_parent_lowers_cost() {
        let data = copy_dataset();
        let mut cache = NodeCache::new(data, SliceLayout::Static, 16).unwrap();
        let mut tom = Tom::new(2, 1);
        let alone = cache.mml_cost(&tom, VarId(1)).unwrap();
        tom.add_arc(VarId(0), VarId(1)).unwrap();
        let with_parent = cache.mml_cost(&tom, VarId(1)).unwrap();
        assert!(with_parent < alone);
    }

    #[test]
    fn test_cache_hits_and_matches_uncached() {
        let data = copy_dataset();
        let mut cache = NodeCache::new(data, SliceLayout::Static, 16).unwrap();
        let mut tom = Tom::new(2, 1);
        tom.add_arc(VarId(0), VarId(1)).unwrap();

        let first = cache.mml_cost(&tom, VarId(1)).unwrap();
        let second = cache.mml_cost(&tom, VarId(1)).unwrap();
        assert_eq!(first, second);
        assert!(close(first, cache.uncached_cost(&tom, VarId(1)).unwrap()));

        let stats = cache.stats().unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!(close(stats.hit_rate(), 0.5));
    }

    #[test]
    fn test_cache_flushes_when_full() {
        let data = copy_dataset();
        let mut cache = NodeCache::new(data, SliceLayout::Static, 1).unwrap();
        let tom = Tom::new(2, 1);
        cache.mml_cost(&tom, VarId(0)).unwrap();
        cache.mml_cost(&tom, VarId(1)).unwrap();
        let stats = cache.stats().unwrap();
        assert_eq!(stats.flushes, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_temporal_parent_uses_previous_row() {
        // y_t = x_{t-1}
        let x = vec![0, 1, 1, 0, 1, 0, 0, 1];
        let mut y = vec![0];
        y.extend_from_slice(&x[..x.len() - 1]);
        let names = vec!["x".to_string(), "y".to_string()];
        let data = Arc::new(Dataset::from_columns(names, vec![x, y]).unwrap());
        let mut cache = NodeCache::new(data, SliceLayout::TimeSeries, 16).unwrap();

        let mut dtom = Dtom::new(2, 1);
        let alone = cache.mml_cost(&dtom, VarId(1)).unwrap();
        dtom.add_temporal_arc(VarId(0), VarId(1)).unwrap();
        let lagged = cache.mml_cost(&dtom, VarId(1)).unwrap();
        assert!(lagged < alone);
    }

    #[test]
    fn test_dataset_mismatch() {
        let cache = NodeCache::new(copy_dataset(), SliceLayout::Static, 4).unwrap();
        let err = cache.check_model(&Tom::new(3, 1)).unwrap_err();
        assert!(matches!(err, SearchError::DatasetMismatch { model: 3, data: 2 }));
    }

    #[test]
    fn test_large_models_use_list_keys() {
        let parents = [VarId(1), VarId(70)];
        let key = ParentKey::new(80, &parents, &[]);
        assert!(matches!(key, ParentKey::Large { .. }));
        let small = ParentKey::new(8, &[VarId(1), VarId(3)], &[VarId(0)]);
        assert_eq!(
            small,
            ParentKey::Small {
                intraslice: 0b1010,
                temporal: 0b1
            }
        );
    }
}
