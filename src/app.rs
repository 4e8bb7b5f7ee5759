//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - resolves the lab configuration and applies flag overrides
//! - runs the requested workflow
//! - prints summaries and writes the report files

use std::path::Path;

use clap::Parser;

use crate::cli::{Command, DatasetArgs, FitArgs, OutputArgs, ParseArgs, SynthArgs};
use crate::config::{load_env, resolve_config, resolve_out_dir, validate};
use crate::domain::LabConfig;
use crate::error::Result;
use crate::labs::{distance, flow};
use crate::plot::{ChartSize, render_fit_preview, render_svg};
use crate::report::{
    channel_stats, format_channel_stats, format_fit_summary, format_ingest_summary, format_residual_table,
    worst_residuals,
};

pub mod pipeline;

/// Entry point for the `labfit` binary.
pub fn run() -> Result<()> {
    load_env();
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Parse(args) => handle_parse(args),
        Command::Fit(args) => handle_fit(args),
        Command::Stats(args) => handle_stats(args),
        Command::Flow(args) => handle_flow(args),
        Command::Linearity(args) => handle_linearity(args),
        Command::Synth(args) => handle_synth(args),
    }
}

/// Resolve the configuration and apply `--snapshot`.
fn lab_config(args: &DatasetArgs) -> Result<LabConfig> {
    let mut config = resolve_config(args.config.as_deref(), args.dataset)?;
    if let Some(snapshot) = &args.snapshot {
        config.dataset.snapshot = snapshot.clone();
    }
    Ok(config)
}

fn handle_parse(args: ParseArgs) -> Result<()> {
    let mut config = lab_config(&args.dataset)?;
    if let Some(input) = args.input {
        config.dataset.input = input;
    }

    let ingest = pipeline::run_parse(&config.dataset)?;
    println!("{}", format_ingest_summary(&config.dataset, &ingest));
    Ok(())
}

fn handle_fit(args: FitArgs) -> Result<()> {
    let mut config = lab_config(&args.dataset)?;
    if args.sort_by.is_some() {
        config.analysis.sort_by = args.sort_by.clone();
        validate(&config)?;
    }
    if config.fits.is_empty() {
        log::warn!("dataset `{}` defines no fit jobs", config.dataset.name);
    }

    let channels = pipeline::load_channels(&config)?;
    let run = pipeline::run_fit(&config, channels)?;

    println!("=== labfit - fit ({}) ===", config.dataset.name);
    println!("Snapshot: {} ({} record(s))\n", config.dataset.snapshot.display(), run.channels.len());
    for out in &run.jobs {
        println!("{}", format_fit_summary(&out.job, &out.fit));
        println!("Largest residuals:");
        println!("{}", format_residual_table(&worst_residuals(&out.residuals, args.top)));
        if !args.no_plot {
            let plot = render_fit_preview(&out.x, &out.y, &out.fit, out.job.subset.as_ref(), args.width, args.height);
            println!("{plot}");
        }
    }
    if !run.band_checks.is_empty() {
        println!("{}", crate::labs::thermistor::format_band_checks(&run.band_checks));
    }

    let out_dir = resolve_out_dir(args.output.out_dir.as_deref());
    let written = pipeline::write_report(&config, &run, &out_dir, ChartSize::default())?;
    println!("Wrote {} file(s) to {}", written.len(), out_dir.display());
    Ok(())
}

fn handle_stats(args: DatasetArgs) -> Result<()> {
    let config = lab_config(&args)?;
    let channels = crate::io::load_snapshot(&config.dataset.snapshot)?;
    let stats = channel_stats(&channels)?;
    println!("=== labfit - stats ({}) ===", config.dataset.name);
    println!("Snapshot: {}", config.dataset.snapshot.display());
    println!("{}", format_channel_stats(&stats));
    Ok(())
}

fn handle_flow(args: OutputArgs) -> Result<()> {
    let analysis = flow::analyze()?;
    println!("{}", flow::format_report(&analysis));

    let out_dir = resolve_out_dir(args.out_dir.as_deref());
    for (stem, spec) in flow::charts(&analysis) {
        render_chart(&out_dir, stem, &spec)?;
    }
    Ok(())
}

fn handle_linearity(args: OutputArgs) -> Result<()> {
    let results = distance::analyze()?;
    println!("{}", distance::format_report(&results));

    let out_dir = resolve_out_dir(args.out_dir.as_deref());
    render_chart(&out_dir, "linearity", &distance::chart(&results))
}

fn handle_synth(args: SynthArgs) -> Result<()> {
    let records = crate::data::write_capture(&args.output, args.dataset, args.records, args.seed)?;
    println!("Wrote {records} record(s) to {}", args.output.display());
    Ok(())
}

fn render_chart(out_dir: &Path, stem: &str, spec: &crate::plot::ChartSpec) -> Result<()> {
    let path = out_dir.join(format!("{stem}.svg"));
    render_svg(&path, spec, ChartSize::default())?;
    println!("Chart: {}", path.display());
    Ok(())
}
