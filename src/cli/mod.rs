//! Command-line parsing for `labfit`.
//!
//! Argument parsing stays here; dispatch lives in `crate::app`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Preset;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "labfit", version, about = "Sensor lab data reduction and curve fitting")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Tokenize a raw capture, split it into channels and write the snapshot.
    Parse(ParseArgs),
    /// Run the configured fit jobs on a snapshot and write the report.
    Fit(FitArgs),
    /// Per-channel count, mean, standard deviation and range of a snapshot.
    Stats(DatasetArgs),
    /// Hot-wire anemometer analysis (King's law fit) from the bench tables.
    Flow(OutputArgs),
    /// Lidar and ultrasonic linearity against the reference distances.
    Linearity(OutputArgs),
    /// Write a synthetic capture in a preset layout.
    Synth(SynthArgs),
}

/// Selects the lab configuration and the snapshot to use.
#[derive(Debug, Args, Clone)]
pub struct DatasetArgs {
    /// Built-in layout and fit jobs.
    #[arg(short = 'd', long, value_enum)]
    pub dataset: Option<Preset>,

    /// TOML lab configuration (overrides `--dataset` and `LABFIT_CONFIG`).
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Snapshot path (default: from the configuration).
    #[arg(long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ParseArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    /// Raw capture to read (default: from the configuration).
    #[arg(short = 'i', long, value_name = "FILE")]
    pub input: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    /// Reorder all channels by this channel before fitting.
    #[arg(long, value_name = "CHANNEL")]
    pub sort_by: Option<String>,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Disable the terminal preview.
    #[arg(long)]
    pub no_plot: bool,

    /// Preview width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Preview height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// Number of largest residuals to list per job.
    #[arg(long, default_value_t = 5)]
    pub top: usize,
}

#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    /// Report directory for charts and exports (default: `LABFIT_OUT_DIR` or `report/`).
    #[arg(short = 'o', long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SynthArgs {
    /// Layout to generate.
    #[arg(short = 'd', long, value_enum, default_value_t = Preset::Lab3)]
    pub dataset: Preset,

    /// Number of records.
    #[arg(short = 'n', long, default_value_t = 120)]
    pub records: usize,

    /// RNG seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// File to write.
    #[arg(long, value_name = "FILE")]
    pub output: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn fit_flags() {
        let cli = Cli::parse_from([
            "labfit", "fit", "--dataset", "lab3", "--sort-by", "pt100", "--no-plot", "--out-dir", "out",
        ]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.dataset.dataset, Some(Preset::Lab3));
        assert_eq!(args.sort_by.as_deref(), Some("pt100"));
        assert!(args.no_plot);
        assert_eq!(args.output.out_dir, Some(PathBuf::from("out")));
    }

    #[test]
    fn synth_requires_output() {
        assert!(Cli::try_parse_from(["labfit", "synth", "--dataset", "lab4"]).is_err());
        let cli = Cli::parse_from(["labfit", "synth", "-d", "lab4", "-n", "10", "--output", "x.txt"]);
        let Command::Synth(args) = cli.command else {
            panic!("expected synth");
        };
        assert_eq!(args.dataset, Preset::Lab4);
        assert_eq!(args.records, 10);
    }
}
