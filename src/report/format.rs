//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{DatasetConfig, FitJob, FitResult};
use crate::io::IngestedData;
use crate::report::{ChannelStats, Residual};

/// Summary of a parse run (tokens, records, channels).
pub fn format_ingest_summary(dataset: &DatasetConfig, data: &IngestedData) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== labfit - parse ({}) ===\n", dataset.name));
    out.push_str(&format!("Input: {}\n", dataset.input.display()));
    out.push_str(&format!(
        "Tokens: {} | records: {} x {} column(s)",
        data.tokens_read, data.records, dataset.record_width
    ));
    if data.dropped_tokens > 0 {
        out.push_str(&format!(" | dropped: {}", data.dropped_tokens));
    }
    out.push('\n');

    let names: Vec<&str> = data.channels.names().collect();
    out.push_str(&format!("Channels: {}\n", names.join(", ")));
    out.push_str(&format!("Snapshot: {}\n", dataset.snapshot.display()));
    out
}

/// Parameters, uncertainties and quality of one fit.
pub fn format_fit_summary(job: &FitJob, fit: &FitResult) -> String {
    let mut out = String::new();
    let [sa, sb] = fit.std_errors();

    out.push_str(&format!(
        "--- {} : {} vs {} ({}) ---\n",
        job.name,
        job.y,
        job.x,
        fit.model.display_name()
    ));
    out.push_str(&format!("Model: {}\n", fit.model.formula()));
    if let Some(subset) = &job.subset {
        out.push_str(&format!("Subset: {}\n", subset.describe()));
    }
    out.push_str(&format!("a = {} ± {}\n", fmt_sci(fit.a()), fmt_sci(sa)));
    out.push_str(&format!("b = {} ± {}\n", fmt_sci(fit.b()), fmt_sci(sb)));
    out.push_str(&format!(
        "cov = [[{}, {}], [{}, {}]]\n",
        fmt_sci(fit.covariance[0][0]),
        fmt_sci(fit.covariance[0][1]),
        fmt_sci(fit.covariance[1][0]),
        fmt_sci(fit.covariance[1][1]),
    ));
    out.push_str(&format!(
        "n={} SSE={} RMSE={} iterations={}\n",
        fit.quality.n,
        fmt_sci(fit.quality.sse),
        fmt_sci(fit.quality.rmse),
        fit.quality.iterations
    ));
    out
}

/// Table of residuals (typically the worst few).
pub fn format_residual_table(rows: &[Residual]) -> String {
    let mut out = String::new();
    out.push_str(format!("{:>6} {:>12} {:>12} {:>12} {:>12}", "index", "x", "y_obs", "y_fit", "residual").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<6} {:-<12} {:-<12} {:-<12} {:-<12}", "", "", "", "", "").trim_end());
    out.push('\n');

    for r in rows {
        out.push_str(
            format!(
                "{:>6} {:>12.4} {:>12.4} {:>12.4} {:>12.4}",
                r.index, r.x, r.y_obs, r.y_fit, r.residual
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// Per-channel statistics table.
pub fn format_channel_stats(stats: &[ChannelStats]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<16} {:>8} {:>12} {:>12} {:>12} {:>12}\n",
        "channel", "count", "mean", "std", "min", "max"
    ));
    out.push_str(&format!(
        "{:-<16} {:-<8} {:-<12} {:-<12} {:-<12} {:-<12}\n",
        "", "", "", "", "", ""
    ));
    for s in stats {
        let std = s.std_dev.map(|v| format!("{v:.4}")).unwrap_or_else(|| "n/a".to_string());
        out.push_str(&format!(
            "{:<16} {:>8} {:>12.4} {:>12} {:>12.4} {:>12.4}\n",
            truncate(&s.name, 16),
            s.count,
            s.mean,
            std,
            s.min,
            s.max
        ));
    }
    out
}

/// Scientific notation, with `inf` spelled out as "undetermined".
pub fn fmt_sci(v: f64) -> String {
    if v.is_infinite() {
        "undetermined".to_string()
    } else {
        format!("{v:.6e}")
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitQuality, ModelKind, Subset};

    fn job() -> FitJob {
        FitJob {
            name: "egr".to_string(),
            x: "pt100".to_string(),
            y: "egr_sens".to_string(),
            model: ModelKind::Affine,
            bounds: None,
            subset: Some(Subset::YAbove(50.0)),
            x_label: None,
            y_label: None,
            chart_from: 0,
        }
    }

    #[test]
    fn fit_summary_mentions_subset_and_undetermined_errors() {
        let fit = FitResult {
            model: ModelKind::Affine,
            params: [1.5, -2.0],
            covariance: [[f64::INFINITY; 2]; 2],
            quality: FitQuality {
                sse: 0.0,
                rmse: 0.0,
                n: 3,
                iterations: 0,
            },
        };
        let text = format_fit_summary(&job(), &fit);
        assert!(text.contains("egr_sens vs pt100"));
        assert!(text.contains("Subset: y > 50"));
        assert!(text.contains("a = 1.500000e0 ± undetermined"));
    }

    #[test]
    fn stats_table_has_one_row_per_channel() {
        let stats = vec![
            ChannelStats {
                name: "lidar".to_string(),
                count: 3,
                mean: 30.0,
                std_dev: Some(0.5),
                min: 29.5,
                max: 30.5,
            },
            ChannelStats {
                name: "a_very_long_channel_name".to_string(),
                count: 1,
                mean: 1.0,
                std_dev: None,
                min: 1.0,
                max: 1.0,
            },
        ];
        let text = format_channel_stats(&stats);
        assert_eq!(text.lines().count(), 4);
        assert!(text.contains("n/a"));
        assert!(text.contains("a_very_long_cha."));
    }

    #[test]
    fn residual_table_lines_are_trimmed() {
        let rows = vec![Residual {
            index: 0,
            x: 1.0,
            y_obs: 2.0,
            y_fit: 2.5,
            residual: -0.5,
        }];
        let text = format_residual_table(&rows);
        assert!(text.lines().all(|l| !l.ends_with(' ')));
        assert!(text.contains("-0.5000"));
    }
}
