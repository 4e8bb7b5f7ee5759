//! The parse and fit workflows, without any printing.
//!
//! capture -> tokens -> channels -> snapshot
//! snapshot -> (sort) -> fit jobs -> residuals / band checks -> exports + charts
//!
//! The CLI layer decides what to show; everything here returns data.

use std::path::{Path, PathBuf};

use crate::domain::{ChannelSet, DatasetConfig, FitJob, FitResult, LabConfig};
use crate::error::Result;
use crate::io::{IngestedData, ingest_dataset, load_snapshot, save_snapshot, write_fit_exports};
use crate::labs::thermistor::{self, BandCheck};
use crate::plot::{ChartSize, ChartSpec, Series, render_svg, sample_fit};
use crate::report::{Residual, compute_residuals};

/// Samples drawn along a fitted curve for charts.
const CURVE_SAMPLES: usize = 200;

/// Ingest the dataset's capture and persist it as a snapshot.
pub fn run_parse(dataset: &DatasetConfig) -> Result<IngestedData> {
    let ingest = ingest_dataset(dataset)?;
    save_snapshot(&dataset.snapshot, &ingest.channels)?;
    Ok(ingest)
}

/// Load the snapshot and apply the configured analysis steps.
pub fn load_channels(config: &LabConfig) -> Result<ChannelSet> {
    let channels = load_snapshot(&config.dataset.snapshot)?;
    match &config.analysis.sort_by {
        Some(key) => {
            log::info!("sorting {} record(s) by `{key}`", channels.len());
            channels.sorted_by(key)
        }
        None => Ok(channels),
    }
}

/// One fitted job with the data it was fitted on.
#[derive(Debug, Clone)]
pub struct JobOutput {
    pub job: FitJob,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub fit: FitResult,
    pub residuals: Vec<Residual>,
}

/// All computed outputs of a `labfit fit` run.
#[derive(Debug, Clone)]
pub struct FitRun {
    pub channels: ChannelSet,
    pub jobs: Vec<JobOutput>,
    pub band_checks: Vec<BandCheck>,
}

/// Fit every configured job against `channels`.
pub fn run_fit(config: &LabConfig, channels: ChannelSet) -> Result<FitRun> {
    let mut jobs = Vec::with_capacity(config.fits.len());
    for job in &config.fits {
        let x = channels.require(&job.x)?.to_vec();
        let y = channels.require(&job.y)?.to_vec();
        let fit = crate::fit::fit(job.model, &x, &y, job.bounds.as_ref(), job.subset.as_ref())?;
        log::info!(
            "{}: a={:.6e} b={:.6e} rmse={:.4e} (n={})",
            job.name,
            fit.a(),
            fit.b(),
            fit.quality.rmse,
            fit.quality.n
        );
        let residuals = compute_residuals(&x, &y, &fit)?;
        jobs.push(JobOutput {
            job: job.clone(),
            x,
            y,
            fit,
            residuals,
        });
    }

    let band_checks = match &config.analysis.limits {
        Some(limits) => thermistor::check_channels(&channels, &limits.temperature, &limits.channels)?,
        None => Vec::new(),
    };

    Ok(FitRun {
        channels,
        jobs,
        band_checks,
    })
}

/// Write exports and charts for a fit run into `out_dir`. Returns every file written.
pub fn write_report(config: &LabConfig, run: &FitRun, out_dir: &Path, size: ChartSize) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    for out in &run.jobs {
        let exports = write_fit_exports(out_dir, &out.job, &out.fit, &out.x, &out.y)?;
        written.push(exports.fit_json);
        written.push(exports.points_csv);

        let (raw, fitted) = job_charts(out);
        for (suffix, spec) in [("raw", raw), ("fit", fitted)] {
            let path = out_dir.join(format!("{}.{suffix}.svg", out.job.name));
            render_svg(&path, &spec, size)?;
            written.push(path);
        }
    }

    if let Some(limits) = &config.analysis.limits {
        let t = run.channels.require(&limits.temperature)?;
        for channel in &limits.channels {
            let spec = thermistor::limit_chart(channel, t, run.channels.require(channel)?);
            let path = out_dir.join(format!("{channel}.limits.svg"));
            render_svg(&path, &spec, size)?;
            written.push(path);
        }
    }

    log::info!("report: {} file(s) in {}", written.len(), out_dir.display());
    Ok(written)
}

/// Raw samples, and samples with the fitted curve, both starting at `chart_from`.
fn job_charts(out: &JobOutput) -> (ChartSpec, ChartSpec) {
    let job = &out.job;
    let x_label = job.x_label.clone().unwrap_or_else(|| job.x.clone());
    let y_label = job.y_label.clone().unwrap_or_else(|| job.y.clone());

    let shown: Vec<(f64, f64)> = out
        .x
        .iter()
        .copied()
        .zip(out.y.iter().copied())
        .skip(job.chart_from)
        .collect();

    let raw = ChartSpec::new(format!("{} vs {}", job.y, job.x), x_label.clone(), y_label.clone())
        .with_series(Series::markers(job.y.clone(), shown.clone()));

    let mut fitted = ChartSpec::new(
        format!("{} fit: {}", job.name, out.fit.model.formula()),
        x_label,
        y_label,
    )
    .with_series(Series::markers("Measured", shown.clone()));
    if let Some((lo, hi)) = crate::plot::finite_range(shown.iter().map(|p| p.0)) {
        fitted = fitted.with_series(Series::dashed("Fit", sample_fit(&out.fit, lo, hi, CURVE_SAMPLES)));
    }
    (raw, fitted)
}
