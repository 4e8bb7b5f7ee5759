//! Hot-wire anemometer bench.
//!
//! Fan voltage sets the air flow; the tables record the bridge and sensor
//! voltages at each step. King's law predicts `I² = a·√Q_m + b` for a wire
//! held at constant temperature, which we fit on the low-flow steps where the
//! fan is not yet saturated.

use crate::domain::{FitResult, ModelKind, Subset};
use crate::error::Result;
use crate::fit::fit;
use crate::plot::{ChartSpec, Series, sample_fit};
use crate::report::fmt_sci;

/// Fan supply voltage per step, V.
pub const U_FAN: [f64; 8] = [3.5, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];

/// Constant-current run: bridge voltage, V.
pub const BRIDGE_U_BR: [f64; 8] = [0.12, 0.137, 0.165, 0.186, 0.203, 0.215, 0.215, 0.215];
/// Constant-current run: sensor voltage, V.
pub const BRIDGE_U_SENS: [f64; 8] = [0.429, 0.435, 0.4425, 0.4484, 0.4534, 0.4564, 0.4566, 0.4568];

/// Constant-temperature run: bridge supply voltage, V.
pub const CT_U_VCC: [f64; 8] = [8.0, 8.37, 8.83, 9.18, 9.51, 9.73, 9.74, 9.74];
/// Constant-temperature run: voltage across the shunt, V.
pub const CT_U_SENS: [f64; 8] = [0.492, 0.509, 0.537, 0.557, 0.577, 0.592, 0.593, 0.592];

/// Air density at 0 °C, kg/m³.
pub const AIR_DENSITY: f64 = 1.293;
/// Current-sense shunt, Ω.
pub const SHUNT_OHMS: f64 = 10.0;
/// Steps used for the King's law fit.
pub const FIT_STEPS: usize = 6;

/// Fan calibration: volume flow in m³/s.
pub fn volume_flow(u_fan: f64) -> f64 {
    (2.43 * u_fan - 4.81) * 1e-4
}

/// Mass flow in kg/s.
pub fn mass_flow(u_fan: f64) -> f64 {
    AIR_DENSITY * volume_flow(u_fan)
}

/// Wire current in A from the shunt voltage.
pub fn sensor_current(u_sens: f64) -> f64 {
    u_sens / SHUNT_OHMS
}

#[derive(Debug, Clone)]
pub struct FlowAnalysis {
    /// Mass flow per step, kg/s.
    pub q_m: Vec<f64>,
    /// Wire current per step (constant-temperature run), A.
    pub current: Vec<f64>,
    pub sqrt_q_m: Vec<f64>,
    pub current_squared: Vec<f64>,
    pub subset: Subset,
    /// `I² = a·√Q_m + b` on the first [`FIT_STEPS`] steps.
    pub kings_law: FitResult,
}

pub fn analyze() -> Result<FlowAnalysis> {
    let q_m: Vec<f64> = U_FAN.iter().map(|&u| mass_flow(u)).collect();
    let current: Vec<f64> = CT_U_SENS.iter().map(|&u| sensor_current(u)).collect();
    let sqrt_q_m: Vec<f64> = q_m.iter().map(|q| q.sqrt()).collect();
    let current_squared: Vec<f64> = current.iter().map(|i| i * i).collect();

    let subset = Subset::Range {
        start: 0,
        end: FIT_STEPS,
    };
    let kings_law = fit(ModelKind::Affine, &sqrt_q_m, &current_squared, None, Some(&subset))?;
    log::info!(
        "king's law: I² = {:.6e}·√Q_m + {:.6e} (n={})",
        kings_law.a(),
        kings_law.b(),
        kings_law.quality.n
    );

    Ok(FlowAnalysis {
        q_m,
        current,
        sqrt_q_m,
        current_squared,
        subset,
        kings_law,
    })
}

/// Charts as `(file stem, spec)` pairs.
pub fn charts(analysis: &FlowAnalysis) -> Vec<(&'static str, ChartSpec)> {
    let pairs = |xs: &[f64], ys: &[f64]| -> Vec<(f64, f64)> { xs.iter().copied().zip(ys.iter().copied()).collect() };
    let q_label = "Q_m [1e-3 kg/s]";

    let u_br = ChartSpec::new("Bridge voltage vs mass flow", q_label, "U_br [V]")
        .with_series(Series::line("U_br", pairs(&analysis.q_m, &BRIDGE_U_BR)))
        .with_x_tick_scale(1000.0);

    let u_sens = ChartSpec::new("Sensor voltage vs mass flow", q_label, "U_sens [V]")
        .with_series(Series::line("U_sens", pairs(&analysis.q_m, &BRIDGE_U_SENS)))
        .with_x_tick_scale(1000.0);

    let fitted: Vec<(f64, f64)> = analysis
        .sqrt_q_m
        .iter()
        .zip(&analysis.current_squared)
        .enumerate()
        .filter(|&(i, (_, &y))| analysis.subset.keeps(i, y))
        .map(|(_, (&x, &y))| (x, y))
        .collect();
    let (fit_lo, fit_hi) = fitted
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.0), hi.max(p.0)));
    let kings = ChartSpec::new("Least squares fit of I² vs √Q_m", "√Q_m [kg^1/2 s^-1/2]", "I² [A²]")
        .with_series(Series::markers(
            "Measured Values",
            pairs(&analysis.sqrt_q_m, &analysis.current_squared),
        ))
        .with_series(Series::line("Fitted Line", sample_fit(&analysis.kings_law, fit_lo, fit_hi, 100)))
        .with_series(Series::markers("Values Used for Fitting", fitted));

    let current = ChartSpec::new("Wire current vs mass flow", "Q_m [kg/s]", "I [A]")
        .with_series(Series::markers("Measured Values", pairs(&analysis.q_m, &analysis.current)));

    vec![
        ("flow_u_br", u_br),
        ("flow_u_sens", u_sens),
        ("flow_kings_law", kings),
        ("flow_current", current),
    ]
}

pub fn format_report(analysis: &FlowAnalysis) -> String {
    let mut out = String::from("=== labfit - hot-wire flow ===\n");
    out.push_str(&format!(
        "{:>6} {:>12} {:>10} {:>10} {:>10} {:>12}\n",
        "U_fan", "Q_m [kg/s]", "U_br", "U_VCC", "I [A]", "I² [A²]"
    ));
    for i in 0..U_FAN.len() {
        out.push_str(&format!(
            "{:>6.2} {:>12.4e} {:>10.4} {:>10.2} {:>10.5} {:>12.4e}\n",
            U_FAN[i],
            analysis.q_m[i],
            BRIDGE_U_BR[i],
            CT_U_VCC[i],
            analysis.current[i],
            analysis.current_squared[i]
        ));
    }
    let fit = &analysis.kings_law;
    let [sa, sb] = fit.std_errors();
    out.push_str(&format!("\nKing's law fit ({}):\n", analysis.subset.describe()));
    out.push_str("  I² = a·√Q_m + b\n");
    out.push_str(&format!("  slope     a = {} ± {} A²·s^1/2·kg^-1/2\n", fmt_sci(fit.a()), fmt_sci(sa)));
    out.push_str(&format!("  intercept b = {} ± {} A²\n", fmt_sci(fit.b()), fmt_sci(sb)));
    out
}
