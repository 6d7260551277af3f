/*
 * SPDX-FileCopyrightText: 2026 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::arcs::read_arcs;
use crate::{
    ArcsArgs, FloatVectorFormat, GlobalArgs, ParallelArgs, create_parent_dir, parse_duration,
};
use anyhow::{Context, Result};
use clap::Parser;
use dsi_progress_logger::{ProgressLog, progress_logger};
use predicates::prelude::*;
use sprank_algo::rank::pagerank::preds::{MaxIter, MaxTime};
use sprank_algo::rank::{Mode, PageRank};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The PageRank mode.
#[derive(clap::ValueEnum, Debug, Clone, Copy, Default)]
pub enum CliMode {
    /// Use the preference vector as dangling-node distribution.
    #[default]
    StronglyPreferential,
    /// Use a uniform dangling-node distribution regardless of the preference
    /// vector.
    WeaklyPreferential,
}

impl From<CliMode> for Mode {
    fn from(m: CliMode) -> Self {
        match m {
            CliMode::StronglyPreferential => Mode::StronglyPreferential,
            CliMode::WeaklyPreferential => Mode::WeaklyPreferential,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "pagerank",
    about = "Compute PageRank of a list of weighted arcs using damped power iteration.",
    long_about = None
)]
pub struct CliArgs {
    /// The file containing the arcs, or "-" for standard input.
    pub input: PathBuf,

    #[arg(short, long)]
    /// Where to store the rank vector.
    pub output: PathBuf,

    #[arg(short, long, default_value_t = PageRank::DEFAULT_ALPHA)]
    /// The damping factor α (must be in the interval [0 . . 1]).
    pub alpha: f64,

    #[arg(short, long, default_value_t = PageRank::DEFAULT_TOLERANCE)]
    /// Stop when no component changes by more than this amount between two
    /// iterations.
    pub tolerance: f64,

    #[arg(long, default_value_t = MaxIter::DEFAULT_MAX_ITER)]
    /// Give up after this number of iterations.
    pub max_iter: usize,

    #[arg(long, value_parser = parse_duration)]
    /// Give up after this time, with the same syntax as --log-interval.
    pub max_time: Option<Duration>,

    #[arg(short, long)]
    /// Path to a preference (personalization) vector.
    pub preference: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = FloatVectorFormat::Ascii)]
    /// The input format for the preference vector.
    pub preference_fmt: FloatVectorFormat,

    #[arg(short, long, value_enum, default_value_t = CliMode::StronglyPreferential)]
    /// The PageRank mode.
    pub mode: CliMode,

    #[arg(long, value_enum, default_value_t = FloatVectorFormat::Ascii)]
    /// The format of the rank vector.
    pub fmt: FloatVectorFormat,

    #[arg(long)]
    /// The number of decimal digits in the output (default: shortest
    /// representation).
    pub precision: Option<usize>,

    #[arg(long)]
    /// Where to store the node labels, one per line in node order (ignored
    /// with --exact).
    pub labels: Option<PathBuf>,

    #[arg(long)]
    /// The number of nodes in the graph; if specified this will be used
    /// instead of the number inferred. This is useful if you want to add
    /// isolated nodes at the end of the graph.
    pub num_nodes: Option<usize>,

    #[clap(flatten)]
    pub arcs_args: ArcsArgs,

    #[clap(flatten)]
    pub parallel: ParallelArgs,
}

pub fn main(global_args: GlobalArgs, args: CliArgs) -> Result<()> {
    let mut pl = progress_logger![];
    pl.display_memory(true);
    if let Some(log_interval) = global_args.log_interval {
        pl.log_interval(log_interval);
    }

    let thread_pool = args.parallel.thread_pool()?;

    let (graph, labels) = if args.input.as_os_str() == "-" {
        log::info!("Reading arcs from stdin...");
        let stdin = std::io::stdin().lock();
        read_arcs(&args.arcs_args, args.num_nodes, stdin, &mut pl)?
    } else {
        log::info!("Reading arcs from {}", args.input.display());
        let file = std::fs::File::open(&args.input)
            .with_context(|| format!("Could not open {}", args.input.display()))?;
        read_arcs(
            &args.arcs_args,
            args.num_nodes,
            BufReader::new(file),
            &mut pl,
        )?
    };

    let preference: Option<Vec<f64>> = args
        .preference
        .as_ref()
        .map(|path| args.preference_fmt.load(path))
        .transpose()?;

    // Build give-up predicate
    let mut give_up = MaxIter::from(args.max_iter).boxed();
    if let Some(max_time) = args.max_time {
        give_up = give_up.or(MaxTime::from(max_time)).boxed();
    }

    // Configure PageRank
    let mut pr = PageRank::new(&graph)?;
    pr.alpha(args.alpha)?
        .tolerance(args.tolerance)?
        .preference(preference.as_deref())?
        .mode(args.mode.into())
        .granularity(args.parallel.granularity());
    // The adjacency matrix is no longer needed
    drop(graph);

    // Run
    thread_pool
        .install(|| pr.run_with_logging(give_up, &mut pl))
        .context("Could not compute PageRank; try a larger --max-iter or --max-time")?;

    log::info!(
        "Completed after {} iteration(s), max delta = {}",
        pr.iterations(),
        pr.max_delta()
    );

    // Store results
    args.fmt.store(&args.output, pr.rank(), args.precision)?;

    match (&args.labels, labels) {
        (Some(path), Some(labels)) => store_labels(path, &labels)?,
        (Some(_), None) => log::warn!("Labels are not available with --exact"),
        _ => {}
    }

    Ok(())
}

/// Stores labels one per line.
fn store_labels(path: impl AsRef<Path>, labels: &[String]) -> Result<()> {
    let path = path.as_ref();
    create_parent_dir(path)?;
    let file = std::fs::File::create(path)
        .with_context(|| format!("Could not create labels file at {}", path.display()))?;
    let mut buf = BufWriter::new(file);
    log::info!("Storing labels at {}", path.display());
    for label in labels {
        writeln!(buf, "{}", label)
            .with_context(|| format!("Could not write labels to {}", path.display()))?;
    }
    buf.flush()
        .with_context(|| format!("Could not write labels to {}", path.display()))?;
    Ok(())
}

/// Loads labels stored one per line.
pub fn load_labels(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Could not open {}", path.display()))?;
    BufReader::new(file)
        .lines()
        .map(|line| line.with_context(|| format!("Could not read {}", path.display())))
        .collect()
}
