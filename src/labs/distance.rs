//! Distance sensor linearity (lidar and ultrasonic against a tape measure).

use crate::domain::{FitResult, ModelKind};
use crate::error::Result;
use crate::fit::fit;
use crate::plot::{ChartSpec, Series, sample_fit};
use crate::report::fmt_sci;

/// Reference distance, cm.
pub const REAL_CM: [f64; 8] = [36.0, 41.0, 46.0, 51.0, 56.0, 61.0, 66.0, 76.0];
pub const LIDAR_CM: [f64; 8] = [33.0, 38.0, 43.0, 48.0, 53.0, 58.0, 64.0, 69.0];
pub const ULTRASONIC_CM: [f64; 8] = [39.0, 43.0, 48.0, 53.0, 58.0, 62.0, 68.0, 78.0];

/// Chart x range, cm.
const CHART_RANGE: (f64, f64) = (30.0, 80.0);

#[derive(Debug, Clone)]
pub struct SensorLinearity {
    pub sensor: &'static str,
    pub readings: Vec<f64>,
    pub fit: FitResult,
    /// Largest |reading − fitted line| over the table, cm.
    pub max_deviation: f64,
}

pub fn analyze() -> Result<Vec<SensorLinearity>> {
    [("Lidar", &LIDAR_CM), ("Ultrasonic", &ULTRASONIC_CM)]
        .into_iter()
        .map(|(sensor, readings)| {
            let fit = fit(ModelKind::Affine, &REAL_CM, readings, None, None)?;
            let max_deviation = REAL_CM
                .iter()
                .zip(readings)
                .map(|(&x, &y)| (y - fit.predict(x)).abs())
                .fold(0.0, f64::max);
            log::info!(
                "{sensor}: reading = {:.4}·d + {:.4} (max deviation {max_deviation:.3} cm)",
                fit.a(),
                fit.b()
            );
            Ok(SensorLinearity {
                sensor,
                readings: readings.to_vec(),
                fit,
                max_deviation,
            })
        })
        .collect()
}

pub fn chart(results: &[SensorLinearity]) -> ChartSpec {
    let (lo, hi) = CHART_RANGE;
    let mut spec = ChartSpec::new(
        "Measured distances of Lidar and Ultrasonic sensors",
        "Real Distance [cm]",
        "Measured Distance [cm]",
    )
    .with_x_range(lo, hi);

    for r in results {
        spec = spec.with_series(Series::markers(
            r.sensor,
            REAL_CM.iter().copied().zip(r.readings.iter().copied()).collect(),
        ));
    }
    for r in results {
        spec = spec.with_series(Series::dashed(
            format!("{} Linear Fit", r.sensor),
            sample_fit(&r.fit, lo, hi, 100),
        ));
    }
    spec
}

pub fn format_report(results: &[SensorLinearity]) -> String {
    let mut out = String::from("=== labfit - distance linearity ===\n");
    for r in results {
        let [sa, sb] = r.fit.std_errors();
        out.push_str(&format!(
            "{:<11} slope = {} ± {}  offset = {} ± {} cm  max deviation = {:.3} cm\n",
            r.sensor,
            fmt_sci(r.fit.a()),
            fmt_sci(sa),
            fmt_sci(r.fit.b()),
            fmt_sci(sb),
            r.max_deviation
        ));
    }
    out
}
