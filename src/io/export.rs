//! Export fit results.
//!
//! - `<job>.fit.json`: parameters, uncertainties, covariance and fit quality
//! - `<job>.points.csv`: per-sample observed vs fitted values
//!
//! Both are meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{FitJob, FitQuality, FitResult, ModelKind};
use crate::error::{LabError, Result};

/// Serialized form of one fit. Undetermined covariance entries become `null`.
#[derive(Debug, Serialize)]
struct FitExport<'a> {
    job: &'a str,
    x: &'a str,
    y: &'a str,
    model: ModelKind,
    formula: &'static str,
    a: f64,
    b: f64,
    std_errors: [f64; 2],
    covariance: [[f64; 2]; 2],
    subset: Option<String>,
    quality: &'a FitQuality,
    written_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct PointRow {
    index: usize,
    x: f64,
    y_obs: f64,
    y_fit: f64,
    residual: f64,
    in_fit: bool,
}

/// Paths written by [`write_fit_exports`].
#[derive(Debug, Clone)]
pub struct ExportPaths {
    pub fit_json: PathBuf,
    pub points_csv: PathBuf,
}

/// Write both exports for `job` into `out_dir`.
pub fn write_fit_exports(
    out_dir: &Path,
    job: &FitJob,
    fit: &FitResult,
    x: &[f64],
    y: &[f64],
) -> Result<ExportPaths> {
    std::fs::create_dir_all(out_dir)
        .map_err(|e| LabError::io(format!("failed to create '{}'", out_dir.display()), e))?;

    let paths = ExportPaths {
        fit_json: out_dir.join(format!("{}.fit.json", job.name)),
        points_csv: out_dir.join(format!("{}.points.csv", job.name)),
    };
    write_fit_json(&paths.fit_json, job, fit)?;
    write_points_csv(&paths.points_csv, job, fit, x, y)?;
    Ok(paths)
}

/// Write the fitted parameters as pretty JSON.
pub fn write_fit_json(path: &Path, job: &FitJob, fit: &FitResult) -> Result<()> {
    let file = File::create(path)
        .map_err(|e| LabError::io(format!("failed to create '{}'", path.display()), e))?;

    let export = FitExport {
        job: &job.name,
        x: &job.x,
        y: &job.y,
        model: fit.model,
        formula: fit.model.formula(),
        a: fit.a(),
        b: fit.b(),
        std_errors: fit.std_errors(),
        covariance: fit.covariance,
        subset: job.subset.as_ref().map(|s| s.describe()),
        quality: &fit.quality,
        written_at: Utc::now(),
    };

    serde_json::to_writer_pretty(file, &export)
        .map_err(|e| LabError::io(format!("failed to write '{}'", path.display()), e.into()))
}

/// Write observed vs fitted values for every sample (not only the fitted subset).
pub fn write_points_csv(path: &Path, job: &FitJob, fit: &FitResult, x: &[f64], y: &[f64]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| LabError::io(format!("failed to create '{}'", path.display()), e.into()))?;

    for (index, (&xi, &yi)) in x.iter().zip(y).enumerate() {
        let y_fit = fit.predict(xi);
        let row = PointRow {
            index,
            x: xi,
            y_obs: yi,
            y_fit,
            residual: yi - y_fit,
            in_fit: job.subset.as_ref().is_none_or(|s| s.keeps(index, yi)),
        };
        writer
            .serialize(&row)
            .map_err(|e| LabError::io(format!("failed to write '{}'", path.display()), e.into()))?;
    }

    writer
        .flush()
        .map_err(|e| LabError::io(format!("failed to write '{}'", path.display()), e))
}
