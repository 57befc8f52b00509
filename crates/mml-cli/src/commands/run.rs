//! Run command implementation.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;
use mml_core::export::NetworkSnapshot;
use mml_core::{ArcRef, Relation};
use mml_search::{dynamic_search, static_search, SearchConfig, SearchSummary, StructurePrior};
use tracing::info;

use crate::config::Config;
use crate::data::load_csv;

/// Report format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable report.
    Text,
    /// The full search summary as JSON.
    Json,
}

/// Structure prior selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PriorKind {
    /// Independent arcs with a fixed probability.
    ArcProbability,
    /// Uniform over parent counts.
    Uniform,
}

/// Arguments of `mml run`.
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub data: PathBuf,
    pub dbn: bool,
    pub steps: Option<usize>,
    pub burn_in: Option<usize>,
    pub seed: Option<u64>,
    pub temperature: Option<f64>,
    pub max_parents: Option<usize>,
    pub prior: Option<PriorKind>,
    pub arc_prob: Option<f64>,
    pub temporal_arc_prob: Option<f64>,
    pub threshold: f64,
    pub output: Option<PathBuf>,
    pub format: OutputFormat,
}

impl RunArgs {
    /// Overlay the flags that were given on `base`.
    pub fn search_config(&self, base: &SearchConfig) -> SearchConfig {
        let mut config = base.clone();
        if let Some(steps) = self.steps {
            config.sampling_steps = steps;
        }
        if let Some(steps) = self.burn_in {
            config.burn_in_steps = steps;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(temperature) = self.temperature {
            config.temperature = temperature;
            // Burn-in never starts colder than sampling.
            if config.anneal_start_temperature < temperature {
                config.anneal_start_temperature = temperature;
            }
        }
        if let Some(max_parents) = self.max_parents {
            config.max_parents = max_parents;
        }

        let wants_arc_prob = self.arc_prob.is_some() || self.temporal_arc_prob.is_some();
        let arc_base = match config.structure_prior {
            prior @ StructurePrior::ArcProbability { .. } => prior,
            StructurePrior::UniformParentCount => StructurePrior::default(),
        };
        config.structure_prior = match self.prior {
            Some(PriorKind::Uniform) => StructurePrior::UniformParentCount,
            Some(PriorKind::ArcProbability) => {
                arc_prior_with(arc_base, self.arc_prob, self.temporal_arc_prob)
            }
            None if wants_arc_prob => {
                arc_prior_with(arc_base, self.arc_prob, self.temporal_arc_prob)
            }
            None => config.structure_prior,
        };
        config
    }
}

fn arc_prior_with(
    base: StructurePrior,
    arc_prob: Option<f64>,
    temporal_arc_prob: Option<f64>,
) -> StructurePrior {
    match base {
        StructurePrior::ArcProbability {
            arc_prob: p,
            temporal_arc_prob: pt,
        } => StructurePrior::ArcProbability {
            arc_prob: arc_prob.unwrap_or(p),
            temporal_arc_prob: temporal_arc_prob.unwrap_or(pt),
        },
        other => other,
    }
}

/// Execute the run command.
pub fn execute(config: &Config, args: &RunArgs) -> Result<()> {
    let search_config = args.search_config(&config.search);
    let data = Arc::new(load_csv(&args.data)?);

    info!(
        path = %args.data.display(),
        variables = data.num_vars(),
        rows = data.num_rows(),
        dynamic = args.dbn,
        "run_start"
    );

    let summary = if args.dbn {
        dynamic_search(data, search_config)
            .context("Failed to set up dynamic search")?
            .run()
            .context("Dynamic search failed")?
    } else {
        static_search(data, search_config)
            .context("Failed to set up static search")?
            .run()
            .context("Static search failed")?
    };

    let report = match args.format {
        OutputFormat::Text => render_text(&summary, args.threshold),
        OutputFormat::Json => summary.to_json()?,
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, &report)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!(path = %path.display(), "report_written");
        }
        None => println!("{report}"),
    }
    Ok(())
}

fn arc_label(names: &[String], arc: ArcRef) -> String {
    let name = |i: usize| names.get(i).cloned().unwrap_or_else(|| i.to_string());
    let parent = name(arc.parent.index());
    let child = name(arc.child.index());
    match arc.relation {
        Relation::Intraslice => format!("{parent} -> {child}"),
        Relation::Temporal => format!("{parent}[t-1] -> {child}"),
    }
}

fn render_network(out: &mut String, network: &NetworkSnapshot) {
    let order: Vec<&str> = network
        .order
        .iter()
        .map(|v| network.variables[v.index()].as_str())
        .collect();
    let _ = writeln!(out, "  order: {}", order.join(" < "));
    if network.arcs.is_empty() {
        let _ = writeln!(out, "  (no arcs)");
    }
    for arc in &network.arcs {
        let arc = ArcRef {
            parent: arc.parent,
            child: arc.child,
            relation: arc.relation,
        };
        let _ = writeln!(out, "  {}", arc_label(&network.variables, arc));
    }
}

/// Render a summary as a plain-text report.
pub fn render_text(summary: &SearchSummary, threshold: f64) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "MML structure search");
    let _ = writeln!(out, "{:-<40}", "");
    let _ = writeln!(
        out,
        "Steps:        {} burn-in + {} sampling",
        summary.burn_in_steps, summary.sampling_steps
    );
    let _ = writeln!(out, "Initial cost: {:.3} nits", summary.initial_cost);
    let _ = writeln!(out, "Final cost:   {:.3} nits", summary.final_cost);
    let _ = writeln!(out, "Best cost:    {:.3} nits", summary.best_cost);

    let _ = writeln!(out, "\nBest network:");
    render_network(&mut out, &summary.best_network);

    if let Some(probs) = &summary.arc_probabilities {
        let arcs = probs.arcs_above(threshold);
        let _ = writeln!(out, "\nArcs with posterior >= {threshold}:");
        if arcs.is_empty() {
            let _ = writeln!(out, "  (none)");
        }
        for (arc, p) in arcs {
            let _ = writeln!(out, "  {:<32} {:.3}", arc_label(&probs.variables, arc), p);
        }
    }

    let _ = writeln!(out, "\nMoves:");
    for report in &summary.moves {
        let stats = &report.stats;
        let _ = writeln!(
            out,
            "  {:<14} proposed {:>7}  infeasible {:>7}  accepted {:>7} ({:.1}%)",
            report.kind,
            stats.proposed,
            stats.infeasible,
            stats.accepted,
            stats.acceptance_rate() * 100.0
        );
    }

    if let Some(cache) = &summary.cache {
        let _ = writeln!(
            out,
            "\nCache: {} entries, {:.1}% hits, {} flushes",
            cache.entries,
            cache.hit_rate() * 100.0,
            cache.flushes
        );
    }
    out
}
