//! Synthetic bench captures.
//!
//! Produces files in the same flat layout as the real loggers so the whole
//! parse → fit → report chain can be exercised without hardware. Output is a
//! pure function of `(preset, records, seed)`.

use std::path::Path;

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::config::Preset;
use crate::domain::KELVIN_OFFSET;
use crate::error::{LabError, Result};

/// Sweep range of the heated bath, °C.
const SWEEP_START: f64 = 20.0;
const SWEEP_END: f64 = 100.0;
/// Logger period, s.
const SAMPLE_PERIOD: f64 = 2.0;

/// Nominal NTC parameters for `R = a·exp(b/T_K)`: resistance at 20 °C and
/// the beta value.
const NTC1: (f64, f64) = (2400.0, 3450.0);
const NTC2: (f64, f64) = (2350.0, 3600.0);
/// Relative noise on NTC resistance.
const NTC_NOISE: f64 = 0.003;

/// EGR sensor is close to a PT100-style linear element.
const EGR_SLOPE: f64 = 0.385;
const EGR_OFFSET: f64 = 100.0;

/// Static distance capture, cm.
const TARGET_CM: f64 = 30.0;
const ULTRASONIC_BIAS_CM: f64 = 1.2;
const LIDAR_BIAS_CM: f64 = -2.5;

/// Render a capture as text in the preset's delimiter and record layout.
pub fn synth_capture(preset: Preset, records: usize, seed: u64) -> Result<String> {
    if records == 0 {
        return Err(LabError::InvalidInput("record count must be > 0".to_string()));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let text = match preset {
        Preset::Lab3 => thermistor_sweep(&mut rng, records)?,
        Preset::Lab4 => distance_capture(&mut rng, records)?,
    };
    Ok(text)
}

/// Write a synthetic capture to `path`. Returns the number of records.
pub fn write_capture(path: &Path, preset: Preset, records: usize, seed: u64) -> Result<usize> {
    let text = synth_capture(preset, records, seed)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| LabError::io(format!("failed to create '{}'", parent.display()), e))?;
    }
    std::fs::write(path, text).map_err(|e| LabError::io(format!("failed to write '{}'", path.display()), e))?;
    log::info!("wrote {records} synthetic {preset:?} record(s) to {}", path.display());
    Ok(records)
}

fn normal(std_dev: f64) -> Result<Normal<f64>> {
    Normal::new(0.0, std_dev).map_err(|e| LabError::InvalidInput(format!("noise distribution: {e}")))
}

fn ntc_resistance((r20, beta): (f64, f64), celsius: f64) -> f64 {
    let a = r20 / (beta / (20.0 + KELVIN_OFFSET)).exp();
    a * (beta / (celsius + KELVIN_OFFSET)).exp()
}

/// Records `meas_time;ntc2;ntc1;egr_sens;pt100`, one per line.
///
/// The EGR sensor reads 0 on the first record while it powers up, which is
/// what the `y > 50` subset of the lab3 preset filters out.
fn thermistor_sweep(rng: &mut StdRng, records: usize) -> Result<String> {
    let temp_noise = normal(0.05)?;
    let ntc_noise = normal(NTC_NOISE)?;
    let egr_noise = normal(0.1)?;

    let step = if records > 1 {
        (SWEEP_END - SWEEP_START) / (records - 1) as f64
    } else {
        0.0
    };

    let mut out = String::with_capacity(records * 40);
    for i in 0..records {
        let t = SWEEP_START + step * i as f64;
        let ntc1 = ntc_resistance(NTC1, t) * (1.0 + ntc_noise.sample(rng));
        let ntc2 = ntc_resistance(NTC2, t) * (1.0 + ntc_noise.sample(rng));
        let egr = if i == 0 {
            0.0
        } else {
            EGR_OFFSET + EGR_SLOPE * t + egr_noise.sample(rng)
        };
        let pt100 = t + temp_noise.sample(rng);
        out.push_str(&format!(
            "{:.1};{ntc2:.2};{ntc1:.2};{egr:.3};{pt100:.3}\n",
            SAMPLE_PERIOD * i as f64
        ));
    }
    Ok(out)
}

/// Records `t ultrasonic lidar 0` at a fixed target distance.
fn distance_capture(rng: &mut StdRng, records: usize) -> Result<String> {
    let ultrasonic_noise = normal(0.4)?;
    let lidar_noise = normal(0.8)?;

    let mut out = String::with_capacity(records * 24);
    for i in 0..records {
        // Both sensors report whole centimetres.
        let ultrasonic = (TARGET_CM + ULTRASONIC_BIAS_CM + ultrasonic_noise.sample(rng)).round();
        let lidar = (TARGET_CM + LIDAR_BIAS_CM + lidar_noise.sample(rng)).round();
        out.push_str(&format!("{} {ultrasonic} {lidar} 0\n", i * 100));
    }
    Ok(out)
}
