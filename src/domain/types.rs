//! Shared domain types.
//!
//! These types are kept small and serializable so they can be:
//!
//! - read from a TOML lab configuration
//! - used in-memory during fitting
//! - exported to JSON/CSV next to the rendered charts

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Offset between degrees Celsius and Kelvin.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Parametric model fitted to an `(x, y)` series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    /// `y = a*x + b`
    Affine,
    /// `y = a * exp(b / (x + 273.15))`, with `x` in degrees Celsius.
    ///
    /// This is the thermistor resistance–temperature law.
    ExponentialInverse,
}

impl ModelKind {
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Affine => "affine",
            ModelKind::ExponentialInverse => "exponential-inverse",
        }
    }

    pub fn formula(self) -> &'static str {
        match self {
            ModelKind::Affine => "y = a*x + b",
            ModelKind::ExponentialInverse => "y = a*exp(b/(x + 273.15))",
        }
    }

    /// Number of free parameters.
    pub fn param_count(self) -> usize {
        2
    }
}

/// Box constraints on `(a, b)`.
///
/// Missing sides default to unbounded, so `{ lower = [0.0, 0.0] }` in TOML
/// reads as "non-negative".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Bounds {
    #[serde(default = "neg_infinity_pair")]
    pub lower: [f64; 2],
    #[serde(default = "infinity_pair")]
    pub upper: [f64; 2],
}

fn neg_infinity_pair() -> [f64; 2] {
    [f64::NEG_INFINITY; 2]
}

fn infinity_pair() -> [f64; 2] {
    [f64::INFINITY; 2]
}

impl Bounds {
    pub fn unbounded() -> Self {
        Self {
            lower: neg_infinity_pair(),
            upper: infinity_pair(),
        }
    }

    /// `0 <= a`, `0 <= b`.
    pub fn non_negative() -> Self {
        Self {
            lower: [0.0, 0.0],
            upper: infinity_pair(),
        }
    }

    pub fn contains(&self, params: [f64; 2]) -> bool {
        (0..2).all(|i| params[i] >= self.lower[i] && params[i] <= self.upper[i])
    }

    pub fn clamp(&self, params: [f64; 2]) -> [f64; 2] {
        [
            params[0].clamp(self.lower[0], self.upper[0]),
            params[1].clamp(self.lower[1], self.upper[1]),
        ]
    }

    pub(crate) fn is_valid(&self) -> bool {
        (0..2).all(|i| !self.lower[i].is_nan() && !self.upper[i].is_nan() && self.lower[i] <= self.upper[i])
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Selects which `(x, y)` pairs take part in a fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Subset {
    /// Keep pairs with `y > threshold`.
    YAbove(f64),
    /// Keep pairs with `y < threshold`.
    YBelow(f64),
    /// Keep pairs with index in `start..end` (clipped to the series length).
    Range { start: usize, end: usize },
}

impl Subset {
    pub fn keeps(&self, index: usize, y: f64) -> bool {
        match *self {
            Subset::YAbove(threshold) => y > threshold,
            Subset::YBelow(threshold) => y < threshold,
            Subset::Range { start, end } => index >= start && index < end,
        }
    }

    pub fn describe(&self) -> String {
        match *self {
            Subset::YAbove(t) => format!("y > {t}"),
            Subset::YBelow(t) => format!("y < {t}"),
            Subset::Range { start, end } => format!("index {start}..{end}"),
        }
    }
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitQuality {
    pub sse: f64,
    pub rmse: f64,
    /// Points actually used (after the subset rule).
    pub n: usize,
    /// Solver iterations (0 for closed-form fits).
    pub iterations: usize,
}

/// Best-fit parameters for one `(x, y, model)` triple.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitResult {
    pub model: ModelKind,
    /// `[a, b]`
    pub params: [f64; 2],
    /// Residual-scaled covariance of `[a, b]`; `+inf` entries when undetermined.
    pub covariance: [[f64; 2]; 2],
    pub quality: FitQuality,
}

impl FitResult {
    pub fn a(&self) -> f64 {
        self.params[0]
    }

    pub fn b(&self) -> f64 {
        self.params[1]
    }

    /// Evaluate the fitted model at `x`.
    pub fn predict(&self, x: f64) -> f64 {
        crate::models::predict(self.model, x, &self.params)
    }

    /// One-sigma parameter uncertainties (square roots of the covariance diagonal).
    pub fn std_errors(&self) -> [f64; 2] {
        [self.covariance[0][0].sqrt(), self.covariance[1][1].sqrt()]
    }
}

/// Binds one column of a fixed-width record to a named channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnBinding {
    pub index: usize,
    pub channel: String,
}

impl ColumnBinding {
    pub fn new(index: usize, channel: impl Into<String>) -> Self {
        Self {
            index,
            channel: channel.into(),
        }
    }
}

/// How a raw capture file is laid out and where its snapshot lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DatasetConfig {
    pub name: String,
    pub input: PathBuf,
    pub snapshot: PathBuf,
    pub delimiter: char,
    pub record_width: usize,
    pub columns: Vec<ColumnBinding>,
}

/// One model fit to run against a channel set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FitJob {
    pub name: String,
    /// Independent-variable channel.
    pub x: String,
    /// Dependent-variable channel.
    pub y: String,
    pub model: ModelKind,
    #[serde(default)]
    pub bounds: Option<Bounds>,
    #[serde(default)]
    pub subset: Option<Subset>,
    #[serde(default)]
    pub x_label: Option<String>,
    #[serde(default)]
    pub y_label: Option<String>,
    /// First sample shown in charts (earlier samples are still fitted).
    #[serde(default)]
    pub chart_from: usize,
}

/// Steps applied to the loaded channels before fitting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Reorder every channel by ascending value of this channel.
    ///
    /// Off by default: samples are fitted in capture order.
    #[serde(default)]
    pub sort_by: Option<String>,
    /// Compare thermistor channels against the datasheet tolerance band.
    #[serde(default)]
    pub limits: Option<LimitCheck>,
}

/// Which channels to check against the NTC tolerance band, and the
/// temperature channel to check them at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct LimitCheck {
    pub temperature: String,
    pub channels: Vec<String>,
}

/// A complete lab configuration (TOML file or built-in preset).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabConfig {
    pub dataset: DatasetConfig,
    #[serde(default, rename = "fit")]
    pub fits: Vec<FitJob>,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subset_rules() {
        assert!(Subset::YAbove(50.0).keeps(0, 50.5));
        assert!(!Subset::YAbove(50.0).keeps(0, 50.0));
        assert!(Subset::YBelow(1.0).keeps(9, 0.5));
        let range = Subset::Range { start: 0, end: 6 };
        assert!(range.keeps(5, -1.0));
        assert!(!range.keeps(6, -1.0));
    }

    #[test]
    fn bounds_clamp_and_contain() {
        let b = Bounds::non_negative();
        assert!(b.contains([0.0, 3.0]));
        assert!(!b.contains([-1e-9, 3.0]));
        assert_eq!(b.clamp([-2.0, 5.0]), [0.0, 5.0]);
        assert!(b.is_valid());
        let bad = Bounds {
            lower: [1.0, 0.0],
            upper: [0.0, 1.0],
        };
        assert!(!bad.is_valid());
    }
}
