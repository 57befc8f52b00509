//! mml CLI - learn Bayesian network structure from discrete data.
//!
//! Reads a CSV file, runs a Metropolis chain over totally ordered networks
//! scored by minimum message length, and prints the best network plus arc
//! posterior estimates.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

mod commands;
mod config;
mod data;

use commands::run::{OutputFormat, PriorKind, RunArgs};
use config::Config;

/// mml - MML structure search for (dynamic) Bayesian networks.
#[derive(Parser, Debug)]
#[command(
    name = "mml",
    author,
    version,
    about = "MML structure search for Bayesian networks",
    long_about = None
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a structure search on a CSV dataset.
    ///
    /// Rows are independent cases, or consecutive time steps with `--dbn`.
    Run {
        /// CSV file with a header row of variable names.
        data: PathBuf,

        /// Learn a dynamic network (rows are a time series).
        #[arg(long)]
        dbn: bool,

        /// Sampling steps.
        #[arg(short, long)]
        steps: Option<usize>,

        /// Annealed burn-in steps.
        #[arg(long)]
        burn_in: Option<usize>,

        /// Random seed.
        #[arg(long)]
        seed: Option<u64>,

        /// Sampling temperature (0 for greedy descent).
        #[arg(short, long)]
        temperature: Option<f64>,

        /// Maximum number of parents per node.
        #[arg(short, long)]
        max_parents: Option<usize>,

        /// Structure prior.
        #[arg(long, value_enum)]
        prior: Option<PriorKind>,

        /// Arc probability for the arc-probability prior.
        #[arg(long)]
        arc_prob: Option<f64>,

        /// Temporal arc probability for the arc-probability prior.
        #[arg(long)]
        temporal_arc_prob: Option<f64>,

        /// Report arcs with at least this posterior probability.
        #[arg(long, default_value_t = 0.5)]
        threshold: f64,

        /// Write the report to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show the variables and shape of a CSV dataset.
    Inspect {
        /// CSV file with a header row of variable names.
        data: PathBuf,
    },

    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show the effective configuration.
    Show,

    /// Write the effective configuration to the config file.
    Save,

    /// Show path to config file.
    Path,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    let level = if cli.quiet {
        Level::ERROR
    } else if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load()?;

    match cli.command {
        Commands::Run {
            data,
            dbn,
            steps,
            burn_in,
            seed,
            temperature,
            max_parents,
            prior,
            arc_prob,
            temporal_arc_prob,
            threshold,
            output,
            format,
        } => {
            let args = RunArgs {
                data,
                dbn,
                steps,
                burn_in,
                seed,
                temperature,
                max_parents,
                prior,
                arc_prob,
                temporal_arc_prob,
                threshold,
                output,
                format,
            };
            commands::run::execute(&config, &args)?;
        }

        Commands::Inspect { data } => {
            commands::inspect::execute(&data)?;
        }

        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Show => commands::config::show(&config)?,
            ConfigCommands::Save => commands::config::save(&config)?,
            ConfigCommands::Path => match Config::config_file_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("(no config file path available)"),
            },
        },
    }

    Ok(())
}
