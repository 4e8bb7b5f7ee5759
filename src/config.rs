//! Run configuration: built-in presets, TOML files and environment defaults.
//!
//! Resolution order for the lab configuration:
//!
//! 1. `--config FILE`
//! 2. `--dataset lab3|lab4`
//! 3. `LABFIT_CONFIG` (from the environment or a `.env` file)
//! 4. the `lab3` preset
//!
//! CLI flags (`--input`, `--snapshot`, `--sort-by`) are applied on top by the
//! app layer.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use clap::ValueEnum;

use crate::domain::{
    AnalysisConfig, Bounds, ColumnBinding, DatasetConfig, FitJob, LabConfig, LimitCheck, ModelKind, Subset,
};
use crate::error::{LabError, Result};
use crate::io::RecordLayout;

pub const ENV_CONFIG: &str = "LABFIT_CONFIG";
pub const ENV_OUT_DIR: &str = "LABFIT_OUT_DIR";
pub const DEFAULT_OUT_DIR: &str = "report";

/// Built-in lab layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// Thermistor bench: `measurements.txt`, `;`-delimited, 5 columns.
    Lab3,
    /// Distance sensors: `30cm.txt`, space-delimited, 4 columns.
    Lab4,
}

impl Preset {
    pub fn config(self) -> LabConfig {
        match self {
            Preset::Lab3 => lab3(),
            Preset::Lab4 => lab4(),
        }
    }
}

fn lab3() -> LabConfig {
    let temperature = Some("Temperature [°C]".to_string());
    let ntc_job = |name: &str, label: &str| FitJob {
        name: name.to_string(),
        x: "pt100".to_string(),
        y: name.to_string(),
        model: ModelKind::ExponentialInverse,
        bounds: Some(Bounds::non_negative()),
        subset: None,
        x_label: temperature.clone(),
        y_label: Some(format!("{label} [Ohm]")),
        chart_from: 0,
    };

    LabConfig {
        dataset: DatasetConfig {
            name: "lab3".to_string(),
            input: PathBuf::from("measurements.txt"),
            snapshot: PathBuf::from("measurements.json"),
            delimiter: ';',
            record_width: 5,
            columns: vec![
                ColumnBinding::new(0, "meas_time"),
                ColumnBinding::new(1, "ntc2"),
                ColumnBinding::new(2, "ntc1"),
                ColumnBinding::new(3, "egr_sens"),
                ColumnBinding::new(4, "pt100"),
            ],
        },
        fits: vec![
            ntc_job("ntc1", "NTC1"),
            ntc_job("ntc2", "NTC2"),
            FitJob {
                name: "egr".to_string(),
                x: "pt100".to_string(),
                y: "egr_sens".to_string(),
                model: ModelKind::Affine,
                bounds: None,
                subset: Some(Subset::YAbove(50.0)),
                x_label: temperature.clone(),
                y_label: Some("EGR Sensor [Ohm]".to_string()),
                chart_from: 1,
            },
        ],
        analysis: AnalysisConfig {
            sort_by: None,
            limits: Some(LimitCheck {
                temperature: "pt100".to_string(),
                channels: vec!["ntc1".to_string(), "ntc2".to_string()],
            }),
        },
    }
}

fn lab4() -> LabConfig {
    LabConfig {
        dataset: DatasetConfig {
            name: "lab4".to_string(),
            input: PathBuf::from("30cm.txt"),
            snapshot: PathBuf::from("30cm.json"),
            delimiter: ' ',
            record_width: 4,
            columns: vec![
                ColumnBinding::new(0, "t"),
                ColumnBinding::new(1, "ultrasonic"),
                ColumnBinding::new(2, "lidar"),
            ],
        },
        fits: Vec::new(),
        analysis: AnalysisConfig::default(),
    }
}

/// Load `.env` if present. Missing files are not an error.
pub fn load_env() {
    match dotenvy::dotenv() {
        Ok(path) => log::debug!("loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => log::warn!("ignoring unreadable .env file: {e}"),
    }
}

/// Parse and validate a TOML lab configuration.
pub fn load_config_file(path: &Path) -> Result<LabConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => LabError::NotFound {
            path: path.to_path_buf(),
        },
        _ => LabError::io(format!("failed to read config '{}'", path.display()), e),
    })?;
    let config = parse_config(&text).map_err(|e| match e {
        LabError::Config(msg) => LabError::Config(format!("{}: {msg}", path.display())),
        other => other,
    })?;
    log::info!("configuration loaded from {}", path.display());
    Ok(config)
}

/// Parse and validate TOML text.
pub fn parse_config(text: &str) -> Result<LabConfig> {
    let config: LabConfig = toml::from_str(text).map_err(|e| LabError::Config(e.to_string()))?;
    validate(&config)?;
    Ok(config)
}

/// Pick the configuration for this run (see module docs for the order).
pub fn resolve_config(explicit: Option<&Path>, preset: Option<Preset>) -> Result<LabConfig> {
    if let Some(path) = explicit {
        return load_config_file(path);
    }
    if let Some(preset) = preset {
        return Ok(preset.config());
    }
    if let Some(path) = std::env::var_os(ENV_CONFIG).filter(|v| !v.is_empty()) {
        return load_config_file(Path::new(&path));
    }
    Ok(Preset::Lab3.config())
}

/// Report directory: explicit flag, then `LABFIT_OUT_DIR`, then `report/`.
pub fn resolve_out_dir(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(ENV_OUT_DIR).filter(|v| !v.is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR))
}

/// Structural checks that serde cannot express.
pub fn validate(config: &LabConfig) -> Result<()> {
    RecordLayout::from_config(&config.dataset)?;

    let channels: HashSet<&str> = config.dataset.columns.iter().map(|c| c.channel.as_str()).collect();
    let mut names = HashSet::new();

    for job in &config.fits {
        if job.name.trim().is_empty() {
            return Err(LabError::Config("fit job with an empty name".to_string()));
        }
        if !names.insert(job.name.as_str()) {
            return Err(LabError::Config(format!("fit job `{}` is defined twice", job.name)));
        }
        for channel in [&job.x, &job.y] {
            if !channels.contains(channel.as_str()) {
                return Err(LabError::Config(format!(
                    "fit job `{}` uses unknown channel `{channel}`",
                    job.name
                )));
            }
        }
        if let Some(bounds) = &job.bounds {
            if !bounds.is_valid() {
                return Err(LabError::Config(format!(
                    "fit job `{}` has invalid bounds (lower must not exceed upper)",
                    job.name
                )));
            }
        }
        if let Some(Subset::Range { start, end }) = job.subset {
            if start >= end {
                return Err(LabError::Config(format!(
                    "fit job `{}` has an empty index range {start}..{end}",
                    job.name
                )));
            }
        }
    }

    if let Some(key) = &config.analysis.sort_by {
        if !channels.contains(key.as_str()) {
            return Err(LabError::Config(format!("sort_by refers to unknown channel `{key}`")));
        }
    }
    if let Some(limits) = &config.analysis.limits {
        for channel in std::iter::once(&limits.temperature).chain(&limits.channels) {
            if !channels.contains(channel.as_str()) {
                return Err(LabError::Config(format!("limits refer to unknown channel `{channel}`")));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAB3_TOML: &str = r#"
[dataset]
name = "bench"
input = "capture.txt"
snapshot = "capture.json"
delimiter = ";"
record-width = 5
columns = [
    { index = 0, channel = "meas_time" },
    { index = 2, channel = "ntc1" },
    { index = 3, channel = "egr_sens" },
    { index = 4, channel = "pt100" },
]

[[fit]]
name = "ntc1"
x = "pt100"
y = "ntc1"
model = "exponential-inverse"
bounds = { lower = [0.0, 0.0] }

[[fit]]
name = "egr"
x = "pt100"
y = "egr_sens"
model = "affine"
subset = { y-above = 50.0 }

[analysis]
sort-by = "pt100"
"#;

    #[test]
    fn presets_are_valid() {
        for preset in [Preset::Lab3, Preset::Lab4] {
            validate(&preset.config()).unwrap();
        }
    }

    #[test]
    fn lab3_preset_matches_capture_layout() {
        let config = Preset::Lab3.config();
        assert_eq!(config.dataset.delimiter, ';');
        assert_eq!(config.dataset.columns[1], ColumnBinding::new(1, "ntc2"));
        assert_eq!(config.dataset.columns[2], ColumnBinding::new(2, "ntc1"));
        assert_eq!(config.fits.len(), 3);
        assert_eq!(config.fits[2].subset, Some(Subset::YAbove(50.0)));
        assert_eq!(config.fits[2].chart_from, 1);
        assert!(config.analysis.limits.is_some());
    }

    #[test]
    fn parses_toml_config() {
        let config = parse_config(LAB3_TOML).unwrap();
        assert_eq!(config.dataset.record_width, 5);
        assert_eq!(config.fits.len(), 2);
        let bounds = config.fits[0].bounds.unwrap();
        assert_eq!(bounds.lower, [0.0, 0.0]);
        assert_eq!(bounds.upper, [f64::INFINITY, f64::INFINITY]);
        assert_eq!(config.fits[1].model, ModelKind::Affine);
        assert_eq!(config.analysis.sort_by.as_deref(), Some("pt100"));
    }

    #[test]
    fn rejects_unknown_fit_channel() {
        let text = LAB3_TOML.replace("y = \"ntc1\"", "y = \"ntc2\"");
        let err = parse_config(&text).unwrap_err();
        assert!(err.to_string().contains("ntc2"));
    }

    #[test]
    fn rejects_column_outside_record() {
        let text = LAB3_TOML.replace("record-width = 5", "record-width = 4");
        assert!(matches!(parse_config(&text), Err(LabError::Config(_))));
    }

    #[test]
    fn rejects_unknown_keys() {
        let text = format!("{LAB3_TOML}\n[extra]\nfoo = 1\n");
        assert!(matches!(parse_config(&text), Err(LabError::Config(_))));
    }

    #[test]
    fn missing_config_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config_file(&dir.path().join("lab.toml")).unwrap_err();
        assert!(matches!(err, LabError::NotFound { .. }));
    }

    #[test]
    fn explicit_out_dir_wins() {
        assert_eq!(resolve_out_dir(Some(Path::new("out"))), PathBuf::from("out"));
    }
}
