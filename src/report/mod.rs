//! Reporting utilities: residuals, channel statistics and formatted output.

pub mod format;

pub use format::*;

use crate::domain::{ChannelSet, FitResult};
use crate::error::{LabError, Result};

/// Observed vs fitted value for one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Residual {
    pub index: usize,
    pub x: f64,
    pub y_obs: f64,
    pub y_fit: f64,
    pub residual: f64,
}

/// Compute fitted values and residuals for each sample.
pub fn compute_residuals(x: &[f64], y: &[f64], fit: &FitResult) -> Result<Vec<Residual>> {
    let mut out = Vec::with_capacity(x.len());
    for (index, (&xi, &yi)) in x.iter().zip(y).enumerate() {
        let y_fit = fit.predict(xi);
        if !y_fit.is_finite() {
            return Err(LabError::InvalidInput(format!(
                "non-finite model prediction at x = {xi} (sample {index})"
            )));
        }
        out.push(Residual {
            index,
            x: xi,
            y_obs: yi,
            y_fit,
            residual: yi - y_fit,
        });
    }
    Ok(out)
}

/// The `top_n` samples with the largest absolute residual, largest first.
pub fn worst_residuals(residuals: &[Residual], top_n: usize) -> Vec<Residual> {
    let mut sorted = residuals.to_vec();
    sorted.sort_by(|a, b| b.residual.abs().total_cmp(&a.residual.abs()).then(a.index.cmp(&b.index)));
    sorted.truncate(top_n);
    sorted
}

/// Summary statistics of one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelStats {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (`n - 1` denominator); `None` for one sample.
    pub std_dev: Option<f64>,
    pub min: f64,
    pub max: f64,
}

/// Per-channel statistics, in channel-name order.
pub fn channel_stats(channels: &ChannelSet) -> Result<Vec<ChannelStats>> {
    if channels.is_empty() {
        return Err(LabError::InsufficientData { kept: 0, required: 1 });
    }

    Ok(channels
        .iter()
        .map(|(name, samples)| {
            let n = samples.len() as f64;
            let mean = samples.iter().sum::<f64>() / n;
            let std_dev = (samples.len() > 1).then(|| {
                let ss: f64 = samples.iter().map(|v| (v - mean).powi(2)).sum();
                (ss / (n - 1.0)).sqrt()
            });
            ChannelStats {
                name: name.to_string(),
                count: samples.len(),
                mean,
                std_dev,
                min: samples.iter().copied().fold(f64::INFINITY, f64::min),
                max: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            }
        })
        .collect())
}
