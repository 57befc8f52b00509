//! Search configuration.
//!
//! Everything a run needs besides the data: chain lengths, temperatures, the
//! parent-count bound, the structure prior and how often each move is drawn.

use serde::{Deserialize, Serialize};

use crate::coster::{ArcProbabilityCoster, PriorCoster, UniformParentCountCoster};
use crate::error::{SearchError, SearchResult};

/// Configuration for a Metropolis search run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Annealed steps run before any statistics are collected.
    pub burn_in_steps: usize,

    /// Steps at the sampling temperature, with arc weights tracked.
    pub sampling_steps: usize,

    /// Sampling temperature. `0.0` turns the chain into a greedy descent.
    pub temperature: f64,

    /// Temperature at the first burn-in step; cools geometrically to `temperature`.
    pub anneal_start_temperature: f64,

    /// Upper bound on the total parent count of every node.
    pub max_parents: usize,

    /// Seed for the chain's random number generator.
    pub seed: u64,

    /// Prior over network structures.
    pub structure_prior: StructurePrior,

    /// Relative frequency of each move.
    pub move_weights: MoveWeights,

    /// Accumulate arc presence weights during sampling.
    pub track_arc_weights: bool,

    /// Memoized leaf costs kept before the node cache is flushed.
    pub max_cached_costs: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            burn_in_steps: 1_000,
            sampling_steps: 10_000,
            temperature: 1.0,
            anneal_start_temperature: 4.0,
            max_parents: 3,
            seed: 0,
            structure_prior: StructurePrior::default(),
            move_weights: MoveWeights::default(),
            track_arc_weights: true,
            max_cached_costs: 1 << 20,
        }
    }
}

impl SearchConfig {
    /// Create a config for quick iteration (short chains).
    pub fn fast() -> Self {
        Self {
            burn_in_steps: 100,
            sampling_steps: 1_000,
            ..Default::default()
        }
    }

    /// Create a config for thorough exploration.
    pub fn thorough() -> Self {
        Self {
            burn_in_steps: 10_000,
            sampling_steps: 100_000,
            anneal_start_temperature: 8.0,
            ..Default::default()
        }
    }

    /// Reject configurations the driver cannot run.
    pub fn validate(&self) -> SearchResult<()> {
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(SearchError::invalid_config(format!(
                "temperature must be finite and non-negative, got {}",
                self.temperature
            )));
        }
        if !self.anneal_start_temperature.is_finite()
            || self.anneal_start_temperature < self.temperature
        {
            return Err(SearchError::invalid_config(format!(
                "anneal_start_temperature ({}) must be finite and at least temperature ({})",
                self.anneal_start_temperature, self.temperature
            )));
        }
        if self.sampling_steps == 0 {
            return Err(SearchError::invalid_config("sampling_steps must be positive"));
        }
        if self.max_cached_costs == 0 {
            return Err(SearchError::invalid_config("max_cached_costs must be positive"));
        }
        self.structure_prior.validate()?;
        self.move_weights.validate()
    }
}

/// Prior over network structures, expressed as a per-node parent-set cost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructurePrior {
    /// Independent Bernoulli arcs with a fixed probability per relation.
    ArcProbability {
        arc_prob: f64,
        temporal_arc_prob: f64,
    },
    /// Uniform over parent counts, then uniform over sets of that size.
    UniformParentCount,
}

impl Default for StructurePrior {
    fn default() -> Self {
        Self::ArcProbability {
            arc_prob: 0.5,
            temporal_arc_prob: 0.5,
        }
    }
}

impl StructurePrior {
    fn validate(&self) -> SearchResult<()> {
        if let Self::ArcProbability {
            arc_prob,
            temporal_arc_prob,
        } = *self
        {
            for (name, p) in [("arc_prob", arc_prob), ("temporal_arc_prob", temporal_arc_prob)] {
                if !(p > 0.0 && p < 1.0) {
                    return Err(SearchError::invalid_config(format!(
                        "{name} must lie strictly between 0 and 1, got {p}"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl StructurePrior {
    /// Resolve into a calculator with its logarithms precomputed.
    pub fn coster(&self) -> PriorCoster {
        match *self {
            Self::ArcProbability {
                arc_prob,
                temporal_arc_prob,
            } => PriorCoster::ArcProbability(ArcProbabilityCoster::new(arc_prob, temporal_arc_prob)),
            Self::UniformParentCount => PriorCoster::UniformParentCount(UniformParentCountCoster),
        }
    }
}

/// Relative weight of each move. Moves a model cannot use are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveWeights {
    pub single_arc: f64,
    pub temporal_arc: f64,
    pub double_arc: f64,
    pub parent_swap: f64,
    pub order_swap: f64,
}

impl Default for MoveWeights {
    fn default() -> Self {
        Self {
            single_arc: 4.0,
            temporal_arc: 2.0,
            double_arc: 1.0,
            parent_swap: 1.0,
            order_swap: 2.0,
        }
    }
}

impl MoveWeights {
    fn validate(&self) -> SearchResult<()> {
        let all = [
            self.single_arc,
            self.temporal_arc,
            self.double_arc,
            self.parent_swap,
            self.order_swap,
        ];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(SearchError::invalid_config(
                "move weights must be finite and non-negative",
            ));
        }
        if all.iter().sum::<f64>() <= 0.0 {
            return Err(SearchError::invalid_config("at least one move weight must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prior_resolves_to_matching_coster() {
        use crate::coster::StructureCoster;
        use mml_core::Relation;

        let coster = StructurePrior::default().coster();
        assert!(matches!(coster, PriorCoster::ArcProbability(_)));
        let direct = ArcProbabilityCoster::new(0.5, 0.5);
        assert_eq!(
            coster.parent_set_cost(Relation::Temporal, 4, 1),
            direct.parent_set_cost(Relation::Temporal, 4, 1)
        );
        assert_eq!(
            StructurePrior::UniformParentCount.coster(),
            PriorCoster::UniformParentCount(UniformParentCountCoster)
        );
    }

    #[test]
    fn test_default_is_valid() {
        assert!(SearchConfig::default().validate().is_ok());
        assert!(SearchConfig::fast().validate().is_ok());
        assert!(SearchConfig::thorough().validate().is_ok());
    }

    #[test]
    fn test_rejects_negative_temperature() {
        let config = SearchConfig {
            temperature: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SearchError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_zero_temperature_is_allowed() {
        let config = SearchConfig {
            temperature: 0.0,
            anneal_start_temperature: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        let no_sampling = SearchConfig {
            sampling_steps: 0,
            ..Default::default()
        };
        assert!(no_sampling.validate().is_err());
    }

    #[test]
    fn test_rejects_anneal_below_temperature() {
        let config = SearchConfig {
            temperature: 2.0,
            anneal_start_temperature: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_degenerate_arc_prob() {
        let config = SearchConfig {
            structure_prior: StructurePrior::ArcProbability {
                arc_prob: 1.0,
                temporal_arc_prob: 0.5,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_all_zero_weights() {
        let config = SearchConfig {
            move_weights: MoveWeights {
                single_arc: 0.0,
                temporal_arc: 0.0,
                double_arc: 0.0,
                parent_swap: 0.0,
                order_swap: 0.0,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SearchConfig =
            serde_json::from_str(r#"{"seed": 7, "structure_prior": {"kind": "uniform_parent_count"}}"#)
                .unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.structure_prior, StructurePrior::UniformParentCount);
        assert_eq!(config.max_parents, SearchConfig::default().max_parents);
    }
}
