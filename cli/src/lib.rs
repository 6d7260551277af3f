/*
 * SPDX-FileCopyrightText: 2026 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

#![doc = include_str!("../README.md")]
#![deny(unstable_features)]
#![deny(trivial_casts)]
#![deny(unconditional_recursion)]
#![deny(clippy::empty_loop)]
#![deny(unreachable_code)]
#![deny(unreachable_pub)]
#![deny(unreachable_patterns)]
#![deny(unused_macro_rules)]
#![deny(unused_doc_comments)]

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use jiff::fmt::friendly::{Designator, Spacing, SpanPrinter};
use jiff::{SpanRelativeTo, SpanRound, Unit};
use sprank::utils::Granularity;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant, SystemTime};

pub mod arcs;
pub mod pagerank;

/// How to read arcs from a text file.
#[derive(Args, Debug)]
pub struct ArcsArgs {
    #[arg(long, default_value_t = '#')]
    /// Lines starting with this symbol are comments.
    pub line_comment_symbol: char,

    #[arg(long, default_value_t = '\t')]
    /// The column separator.
    pub separator: char,

    #[arg(long, default_value_t = 0)]
    /// The column of the source of an arc (zero-based).
    pub source_column: usize,

    #[arg(long, default_value_t = 1)]
    /// The column of the target of an arc (zero-based).
    pub target_column: usize,

    #[arg(long)]
    /// The column of the weight of an arc (zero-based); without it, or if a
    /// line has no such column, the weight is 1.
    pub weight_column: Option<usize>,

    #[arg(long, default_value_t = false)]
    /// Sources and targets are zero-based node indices instead of labels.
    pub exact: bool,
}

fn parse_num_threads(arg: &str) -> Result<usize> {
    match arg.parse::<usize>()? {
        0 => Err(anyhow!("The number of threads must be positive")),
        n => Ok(n),
    }
}

/// How to parallelize matrix–vector multiplications.
#[derive(Args, Debug)]
pub struct ParallelArgs {
    #[arg(short = 'j', long, default_value_t = rayon::current_num_threads().max(1), value_parser = parse_num_threads)]
    /// The number of threads.
    pub num_threads: usize,

    #[arg(long, conflicts_with("row_granularity"))]
    /// The approximate number of matrix entries processed by a parallel task
    /// (advanced option).
    pub entry_granularity: Option<u64>,

    #[arg(long, conflicts_with("entry_granularity"))]
    /// The number of matrix rows processed by a parallel task (advanced
    /// option).
    pub row_granularity: Option<usize>,
}

impl ParallelArgs {
    /// Returns the requested granularity, or the default one.
    pub fn granularity(&self) -> Granularity {
        match (self.row_granularity, self.entry_granularity) {
            (Some(rows), _) => Granularity::Rows(rows),
            (None, Some(entries)) => Granularity::Entries(entries),
            (None, None) => Granularity::default(),
        }
    }

    /// Builds a thread pool with the requested number of threads.
    pub fn thread_pool(&self) -> Result<rayon::ThreadPool> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads)
            .build()
            .context("Could not build the thread pool")?;
        log::info!("Using {} thread(s)", pool.current_num_threads());
        Ok(pool)
    }
}

/// Text formats for vectors of floats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FloatVectorFormat {
    /// One value per line.
    Ascii,
    /// A JSON array.
    Json,
}

impl FloatVectorFormat {
    /// Stores `values` at `path`, creating parent directories as needed.
    ///
    /// Values are printed with `precision` decimal digits, or, if
    /// `precision` is `None`, with the shortest representation that parses
    /// back to the same value (using [zmij](https://crates.io/crates/zmij)).
    pub fn store(
        &self,
        path: impl AsRef<Path>,
        values: &[f64],
        precision: Option<usize>,
    ) -> Result<()> {
        let path = path.as_ref();
        create_parent_dir(path)?;
        log::info!(
            "Storing {} value(s) in {:?} format at {}",
            values.len(),
            self,
            path.display()
        );
        let file = std::fs::File::create(path)
            .with_context(|| format!("Could not create {}", path.display()))?;
        let mut out = BufWriter::new(file);
        self.write(&mut out, values, precision)
            .and_then(|()| out.flush())
            .with_context(|| format!("Could not write vector to {}", path.display()))
    }

    fn write(
        &self,
        out: &mut impl Write,
        values: &[f64],
        precision: Option<usize>,
    ) -> std::io::Result<()> {
        let (open, separator, close) = match self {
            FloatVectorFormat::Ascii if values.is_empty() => return Ok(()),
            FloatVectorFormat::Ascii => ("", "\n", "\n"),
            FloatVectorFormat::Json => ("[", ", ", "]"),
        };
        let mut buf = zmij::Buffer::new();
        out.write_all(open.as_bytes())?;
        for (i, &x) in values.iter().enumerate() {
            if i > 0 {
                out.write_all(separator.as_bytes())?;
            }
            match precision {
                None => out.write_all(buf.format(x).as_bytes())?,
                Some(digits) => write!(out, "{x:.digits$}")?,
            }
        }
        out.write_all(close.as_bytes())
    }

    /// Loads a vector stored at `path`.
    ///
    /// In ASCII format, blank lines are ignored.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Vec<f64>> {
        let path = path.as_ref();
        log::info!("Loading vector in {:?} format from {}", self, path.display());
        let file = std::fs::File::open(path)
            .with_context(|| format!("Could not open {}", path.display()))?;
        let reader = BufReader::new(file);

        match self {
            FloatVectorFormat::Ascii => {
                let mut values = Vec::new();
                for (line_num, line) in reader.lines().enumerate() {
                    let line = line.with_context(|| {
                        format!("Could not read line {} of {}", line_num + 1, path.display())
                    })?;
                    let line = line.trim();
                    if !line.is_empty() {
                        values.push(line.parse::<f64>().with_context(|| {
                            format!("Line {} of {}: {:?}", line_num + 1, path.display(), line)
                        })?);
                    }
                }
                Ok(values)
            }
            FloatVectorFormat::Json => serde_json::from_reader(reader).with_context(|| {
                format!("{} does not contain a JSON array of numbers", path.display())
            }),
        }
    }
}

/// Creates the directory containing `path`, if it does not exist.
pub fn create_parent_dir(path: impl AsRef<Path>) -> Result<()> {
    match path.as_ref().parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir)
            .with_context(|| format!("Could not create directory {}", dir.display())),
        _ => Ok(()),
    }
}

/// Parses a duration.
///
/// A bare integer is a number of milliseconds; otherwise, the duration is
/// parsed by [`jiff`], which accepts both its friendly format (e.g., `10s`,
/// `1h 30m` or `2 days`) and ISO 8601 (e.g., `PT10S`). Days are 24 hours
/// long.
fn parse_duration(value: &str) -> Result<Duration> {
    let value = value.trim();
    if let Ok(millis) = value.parse::<u64>() {
        return Ok(Duration::from_millis(millis));
    }
    let span: jiff::Span = value
        .parse()
        .with_context(|| format!("Invalid duration {:?}", value))?;
    let duration = span.to_duration(SpanRelativeTo::days_are_24_hours())?;
    Duration::try_from(duration).with_context(|| format!("Negative duration {:?}", value))
}

/// Compact formatting of elapsed times, such as `1h2m5s500ms`.
struct ElapsedFormat {
    printer: SpanPrinter,
    round: SpanRound<'static>,
}

impl ElapsedFormat {
    fn new() -> Self {
        Self {
            printer: SpanPrinter::new()
                .spacing(Spacing::None)
                .designator(Designator::Compact),
            round: SpanRound::new()
                .largest(Unit::Day)
                .smallest(Unit::Millisecond)
                .days_are_24_hours(),
        }
    }

    fn format(&self, elapsed: Duration) -> Result<String, jiff::Error> {
        let span = jiff::Span::try_from(elapsed)?.round(self.round)?;
        Ok(self.printer.span_to_string(&span))
    }
}

/// Initializes [`env_logger`] with the `info` level as default.
///
/// Each record carries a timestamp and the time elapsed since initialization.
pub fn init_env_logger() -> Result<()> {
    let start = Instant::now();
    let elapsed = ElapsedFormat::new();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(move |buf, record| {
            let now =
                jiff::Timestamp::try_from(SystemTime::now()).map_err(std::io::Error::other)?;
            let since_start = elapsed
                .format(start.elapsed())
                .map_err(std::io::Error::other)?;
            let style = buf.default_level_style(record.level());
            writeln!(
                buf,
                "{} +{} {style}{:5}{style:#} {}: {}",
                now.strftime("%F %T%.3f"),
                since_start,
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init()?;
    Ok(())
}

/// Options shared by all commands.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    #[arg(long, value_parser = parse_duration, global = true, display_order = 1000)]
    /// How often to log progress (default: 10s). A bare number is in
    /// milliseconds; otherwise use units, as in "30s", "5m" or "1h 30m".
    pub log_interval: Option<Duration>,
}

#[derive(Subcommand, Debug)]
pub enum SubCommands {
    #[clap(name = "pagerank", visible_alias = "pr")]
    PageRank(pagerank::CliArgs),
}

#[derive(Parser, Debug)]
#[command(name = "sprank", version)]
/// Computes PageRank of weighted graphs given as lists of arcs.
///
/// Logging is configured by the RUST_LOG environment variable
/// <https://docs.rs/env_logger/latest/env_logger/>.
pub struct Cli {
    #[command(subcommand)]
    pub command: SubCommands,
    #[clap(flatten)]
    pub args: GlobalArgs,
}

/// Parses the command line and runs the selected command.
pub fn cli_main<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let start = Instant::now();
    let cli = Cli::parse_from(args);
    match cli.command {
        SubCommands::PageRank(args) => pagerank::main(cli.args, args)?,
    }
    log::info!("Completed in {}", ElapsedFormat::new().format(start.elapsed())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    mod float_vector_format {
        use super::*;

        #[test]
        fn test_ascii() -> Result<()> {
            let dir = tempfile::tempdir()?;
            let path = dir.path().join("test.txt");
            let values = vec![1.5, 2.75, 3.0];
            FloatVectorFormat::Ascii.store(&path, &values, None)?;
            let content = std::fs::read_to_string(&path)?;
            assert_eq!(content.lines().count(), 3);
            assert!(content.ends_with('\n'));
            for (line, expected) in content.lines().zip(&values) {
                assert_eq!(line.parse::<f64>()?, *expected);
            }
            Ok(())
        }

        #[test]
        fn test_precision() -> Result<()> {
            let dir = tempfile::tempdir()?;
            let values = [1.123456789, 2.987654321];
            let path = dir.path().join("test.txt");
            FloatVectorFormat::Ascii.store(&path, &values, Some(3))?;
            assert_eq!(std::fs::read_to_string(&path)?, "1.123\n2.988\n");
            let path = dir.path().join("test.json");
            FloatVectorFormat::Json.store(&path, &values, Some(2))?;
            assert_eq!(std::fs::read_to_string(&path)?, "[1.12, 2.99]");
            Ok(())
        }

        #[test]
        fn test_json() -> Result<()> {
            let dir = tempfile::tempdir()?;
            let path = dir.path().join("test.json");
            let values = vec![1.5, 2.75, 3.0];
            FloatVectorFormat::Json.store(&path, &values, None)?;
            let parsed: Vec<f64> = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
            assert_eq!(parsed, values);
            Ok(())
        }

        #[test]
        fn test_empty() -> Result<()> {
            let dir = tempfile::tempdir()?;
            let path = dir.path().join("test.json");
            FloatVectorFormat::Json.store(&path, &[], None)?;
            assert_eq!(std::fs::read_to_string(&path)?, "[]");
            assert!(FloatVectorFormat::Json.load(&path)?.is_empty());
            let path = dir.path().join("test.txt");
            FloatVectorFormat::Ascii.store(&path, &[], None)?;
            assert_eq!(std::fs::read_to_string(&path)?, "");
            assert!(FloatVectorFormat::Ascii.load(&path)?.is_empty());
            Ok(())
        }

        #[test]
        fn test_creates_parent_dirs() -> Result<()> {
            let dir = tempfile::tempdir()?;
            let path = dir.path().join("a").join("b").join("test.txt");
            FloatVectorFormat::Ascii.store(&path, &[1.0], None)?;
            assert!(path.exists());
            Ok(())
        }

        #[test]
        fn test_store_and_load() -> Result<()> {
            let dir = tempfile::tempdir()?;
            let values = vec![0.1, 1.0 / 3.0, 1E-300, 0.0];
            for (fmt, name) in [
                (FloatVectorFormat::Ascii, "v.txt"),
                (FloatVectorFormat::Json, "v.json"),
            ] {
                let path = dir.path().join(name);
                fmt.store(&path, &values, None)?;
                let loaded = fmt.load(&path)?;
                assert_eq!(loaded.len(), values.len());
                for (x, y) in loaded.iter().zip(&values) {
                    assert!((x - y).abs() <= y.abs() * 1E-15, "{fmt:?}: {x} != {y}");
                }
            }
            Ok(())
        }

        #[test]
        fn test_ascii_blank_and_bad_lines() -> Result<()> {
            let dir = tempfile::tempdir()?;
            let path = dir.path().join("test.txt");
            std::fs::write(&path, "0.25\n\n 0.75 \n")?;
            assert_eq!(FloatVectorFormat::Ascii.load(&path)?, vec![0.25, 0.75]);
            std::fs::write(&path, "0.25\nabc\n")?;
            assert!(FloatVectorFormat::Ascii.load(&path).is_err());
            Ok(())
        }
    }

    #[test]
    fn test_parse_duration() -> Result<()> {
        assert_eq!(parse_duration("100")?, Duration::from_millis(100));
        assert_eq!(parse_duration("10s")?, Duration::from_secs(10));
        assert_eq!(parse_duration("1h 30m")?, Duration::from_secs(5400));
        assert_eq!(parse_duration("1d")?, Duration::from_secs(86_400));
        assert_eq!(parse_duration("PT2M")?, Duration::from_secs(120));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("3x").is_err());
        assert!(parse_duration("-5s").is_err());
        Ok(())
    }

    #[test]
    fn test_elapsed_format() -> Result<()> {
        let elapsed = ElapsedFormat::new();
        for millis in [0, 1_500, 3_725_500, 90_061_001] {
            let duration = Duration::from_millis(millis);
            let formatted = elapsed.format(duration)?;
            assert!(!formatted.contains(' '), "{formatted}");
            assert_eq!(parse_duration(&formatted)?, duration, "{formatted}");
        }
        Ok(())
    }

    #[test]
    fn test_parse_num_threads() {
        assert_eq!(parse_num_threads("4").unwrap(), 4);
        assert!(parse_num_threads("0").is_err());
        assert!(parse_num_threads("-1").is_err());
    }

    #[test]
    fn test_cli_help() {
        use clap::CommandFactory;
        let help = Cli::command().render_long_help().to_string();
        assert!(help.contains("RUST_LOG"));
        assert!(help.contains("pagerank"));
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parallel_args() -> Result<()> {
        let cli = Cli::try_parse_from(["sprank", "pr", "in", "-o", "out", "-j", "3"])?;
        let SubCommands::PageRank(args) = cli.command;
        assert_eq!(args.parallel.num_threads, 3);
        assert_eq!(args.parallel.granularity(), Granularity::default());
        assert_eq!(args.parallel.thread_pool()?.current_num_threads(), 3);

        let cli = Cli::try_parse_from([
            "sprank",
            "pr",
            "in",
            "-o",
            "out",
            "--row-granularity",
            "10",
        ])?;
        let SubCommands::PageRank(args) = cli.command;
        assert_eq!(args.parallel.granularity(), Granularity::Rows(10));

        let cli = Cli::try_parse_from([
            "sprank",
            "pr",
            "in",
            "-o",
            "out",
            "--entry-granularity",
            "1000",
        ])?;
        let SubCommands::PageRank(args) = cli.command;
        assert_eq!(args.parallel.granularity(), Granularity::Entries(1000));

        assert!(
            Cli::try_parse_from([
                "sprank",
                "pr",
                "in",
                "-o",
                "out",
                "--row-granularity",
                "10",
                "--entry-granularity",
                "1000"
            ])
            .is_err()
        );
        Ok(())
    }
}
