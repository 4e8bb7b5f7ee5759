//! NTC thermistor checks against the datasheet tolerance band.
//!
//! The datasheet gives resistance limits at 20 °C steps. Between table
//! points the band is linearly interpolated; outside the table a sample is
//! reported as unchecked rather than guessed.

use crate::domain::ChannelSet;
use crate::error::Result;
use crate::plot::{ChartSpec, Series};

/// Datasheet temperatures, °C.
pub const LIMIT_TEMPERATURE: [f64; 7] = [-20.0, 0.0, 20.0, 40.0, 60.0, 80.0, 100.0];
/// Lower resistance limit, Ω.
pub const LIMIT_LOW: [f64; 7] = [10000.0, 4000.0, 1800.0, 800.0, 400.0, 200.0, 100.0];
/// Upper resistance limit, Ω.
pub const LIMIT_HIGH: [f64; 7] = [20000.0, 7000.0, 3000.0, 1300.0, 700.0, 400.0, 220.0];

/// Charts start the limit curves at this table row (20 °C).
const CHART_FROM: usize = 2;

/// Piecewise-linear interpolation; `None` outside `[xs[0], xs[last]]`.
///
/// `xs` must be strictly increasing.
pub fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> Option<f64> {
    let first = *xs.first()?;
    let last = *xs.last()?;
    if !(first..=last).contains(&x) {
        return None;
    }
    let hi = xs.iter().position(|&v| v >= x)?;
    if hi == 0 {
        return Some(ys[0]);
    }
    let (x0, x1) = (xs[hi - 1], xs[hi]);
    let (y0, y1) = (ys[hi - 1], ys[hi]);
    Some(y0 + (y1 - y0) * (x - x0) / (x1 - x0))
}

/// `(low, high)` resistance limits at `temperature`.
pub fn limit_band(temperature: f64) -> Option<(f64, f64)> {
    Some((
        interpolate(&LIMIT_TEMPERATURE, &LIMIT_LOW, temperature)?,
        interpolate(&LIMIT_TEMPERATURE, &LIMIT_HIGH, temperature)?,
    ))
}

/// How many samples of one channel fall inside the tolerance band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandCheck {
    pub channel: String,
    pub inside: usize,
    pub below: usize,
    pub above: usize,
    /// Samples taken outside the tabulated temperature range.
    pub unchecked: usize,
}

impl BandCheck {
    pub fn checked(&self) -> usize {
        self.inside + self.below + self.above
    }
}

pub fn check_band(channel: &str, temperature: &[f64], resistance: &[f64]) -> BandCheck {
    let mut check = BandCheck {
        channel: channel.to_string(),
        inside: 0,
        below: 0,
        above: 0,
        unchecked: 0,
    };
    for (&t, &r) in temperature.iter().zip(resistance) {
        match limit_band(t) {
            None => check.unchecked += 1,
            Some((low, _)) if r < low => check.below += 1,
            Some((_, high)) if r > high => check.above += 1,
            Some(_) => check.inside += 1,
        }
    }
    check
}

/// Band checks for every configured channel.
pub fn check_channels(set: &ChannelSet, temperature: &str, channels: &[String]) -> Result<Vec<BandCheck>> {
    let t = set.require(temperature)?;
    channels
        .iter()
        .map(|name| Ok(check_band(name, t, set.require(name)?)))
        .collect()
}

/// Measured resistance vs temperature with the low/high limit curves.
pub fn limit_chart(channel: &str, temperature: &[f64], resistance: &[f64]) -> ChartSpec {
    let table = |limits: &[f64; 7]| -> Vec<(f64, f64)> {
        LIMIT_TEMPERATURE[CHART_FROM..]
            .iter()
            .copied()
            .zip(limits[CHART_FROM..].iter().copied())
            .collect()
    };
    let label = channel.to_uppercase();

    ChartSpec::new(
        format!("{label} vs temperature with tolerance band"),
        "Temperature [°C]",
        format!("{label} [Ohm]"),
    )
    .with_series(Series::line(
        label.clone(),
        temperature.iter().copied().zip(resistance.iter().copied()).collect(),
    ))
    .with_series(Series::line("Low Limit", table(&LIMIT_LOW)))
    .with_series(Series::line("High Limit", table(&LIMIT_HIGH)))
}

pub fn format_band_checks(checks: &[BandCheck]) -> String {
    let mut out = String::from("Tolerance band (datasheet, linear interpolation):\n");
    for c in checks {
        out.push_str(&format!(
            "  {:<10} inside {:>5}/{:<5} below {:>5} above {:>5}",
            c.channel,
            c.inside,
            c.checked(),
            c.below,
            c.above
        ));
        if c.unchecked > 0 {
            out.push_str(&format!(" (unchecked {})", c.unchecked));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn band_at_table_points_and_between() {
        assert_eq!(limit_band(20.0), Some((1800.0, 3000.0)));
        assert_eq!(limit_band(-20.0), Some((10000.0, 20000.0)));
        let (low, high) = limit_band(30.0).unwrap();
        assert_relative_eq!(low, 1300.0);
        assert_relative_eq!(high, 2150.0);
        assert_eq!(limit_band(100.5), None);
        assert_eq!(limit_band(-25.0), None);
    }

    #[test]
    fn counts_samples_by_band_position() {
        let t = [20.0, 40.0, 60.0, 80.0, 120.0];
        let r = [2500.0, 700.0, 800.0, 300.0, 50.0];
        let check = check_band("ntc1", &t, &r);
        assert_eq!(check.inside, 2);
        assert_eq!(check.below, 1);
        assert_eq!(check.above, 1);
        assert_eq!(check.unchecked, 1);
        assert_eq!(check.checked(), 4);
    }

    #[test]
    fn checks_named_channels() {
        let set = ChannelSet::from_channels([
            ("pt100".to_string(), vec![25.0, 50.0]),
            ("ntc1".to_string(), vec![2000.0, 600.0]),
            ("ntc2".to_string(), vec![5000.0, 600.0]),
        ])
        .unwrap();
        let checks = check_channels(&set, "pt100", &["ntc1".to_string(), "ntc2".to_string()]).unwrap();
        assert_eq!(checks[0].inside, 2);
        assert_eq!(checks[1].above, 1);
        assert!(format_band_checks(&checks).contains("ntc2"));
    }

    #[test]
    fn limit_chart_starts_at_twenty_degrees() {
        let chart = limit_chart("ntc1", &[25.0], &[2000.0]);
        assert_eq!(chart.series.len(), 3);
        assert_eq!(chart.series[1].points.first(), Some(&(20.0, 1800.0)));
        assert_eq!(chart.series[2].points.len(), 5);
        assert_eq!(chart.y_label, "NTC1 [Ohm]");
    }
}
