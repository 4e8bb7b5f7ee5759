//! Plotters-powered SVG charts for lab reports.
//!
//! A chart is described by plain data ([`ChartSpec`]): series, labels and
//! optional axis overrides. All data prep happens outside [`render_svg`], so
//! the render call only draws.

use std::path::Path;

use plotters::prelude::*;

use crate::error::{LabError, Result};
use crate::plot::{finite_range, pad_range};

/// How a series is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesStyle {
    /// Filled circle per sample.
    Markers,
    /// Solid polyline.
    Line,
    /// Dashed polyline (fitted curves).
    Dashed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub points: Vec<(f64, f64)>,
    pub style: SeriesStyle,
}

impl Series {
    pub fn markers(label: impl Into<String>, points: Vec<(f64, f64)>) -> Self {
        Self {
            label: label.into(),
            points,
            style: SeriesStyle::Markers,
        }
    }

    pub fn line(label: impl Into<String>, points: Vec<(f64, f64)>) -> Self {
        Self {
            label: label.into(),
            points,
            style: SeriesStyle::Line,
        }
    }

    pub fn dashed(label: impl Into<String>, points: Vec<(f64, f64)>) -> Self {
        Self {
            label: label.into(),
            points,
            style: SeriesStyle::Dashed,
        }
    }
}

/// A render-only chart description.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<Series>,
    /// Fixed x range; derived from the data when `None`.
    pub x_range: Option<(f64, f64)>,
    /// Tick labels show `x * x_tick_scale` (e.g. 1000 for kg/s → g/s).
    pub x_tick_scale: f64,
}

impl ChartSpec {
    pub fn new(title: impl Into<String>, x_label: impl Into<String>, y_label: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            x_label: x_label.into(),
            y_label: y_label.into(),
            series: Vec::new(),
            x_range: None,
            x_tick_scale: 1.0,
        }
    }

    pub fn with_series(mut self, series: Series) -> Self {
        self.series.push(series);
        self
    }

    pub fn with_x_range(mut self, min: f64, max: f64) -> Self {
        self.x_range = Some((min, max));
        self
    }

    pub fn with_x_tick_scale(mut self, scale: f64) -> Self {
        self.x_tick_scale = scale;
        self
    }

    /// Padded `(x, y)` bounds covering every series.
    pub fn bounds(&self) -> Option<([f64; 2], [f64; 2])> {
        let all = || self.series.iter().flat_map(|s| s.points.iter());
        let (x0, x1) = match self.x_range {
            Some(range) => range,
            None => {
                let (lo, hi) = finite_range(all().map(|p| p.0))?;
                pad_range(lo, hi, 0.03)
            }
        };
        let (y0, y1) = finite_range(all().map(|p| p.1))?;
        let (y0, y1) = pad_range(y0, y1, 0.05);
        (x1 > x0).then_some(([x0, x1], [y0, y1]))
    }
}

/// Output size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ChartSize {
    fn default() -> Self {
        Self {
            width: 900,
            height: 600,
        }
    }
}

const PALETTE: [RGBColor; 6] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
];

/// Draw `spec` into an SVG file at `path`.
pub fn render_svg(path: &Path, spec: &ChartSpec, size: ChartSize) -> Result<()> {
    let ([x0, x1], [y0, y1]) = spec
        .bounds()
        .ok_or_else(|| LabError::Render(format!("chart `{}` has no finite data", spec.title)))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| LabError::io(format!("failed to create '{}'", parent.display()), e))?;
    }

    draw(path, spec, size, (x0, x1), (y0, y1))
        .map_err(|e| LabError::Render(format!("chart `{}` ({}): {e}", spec.title, path.display())))?;
    log::debug!("chart written: {}", path.display());
    Ok(())
}

fn draw(
    path: &Path,
    spec: &ChartSpec,
    size: ChartSize,
    (x0, x1): (f64, f64),
    (y0, y1): (f64, f64),
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let root = SVGBackend::new(path, (size.width, size.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(&spec.title, ("sans-serif", 22))
        .margin(12)
        .set_label_area_size(LabelAreaPosition::Left, 70)
        .set_label_area_size(LabelAreaPosition::Bottom, 45)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    let scale = spec.x_tick_scale;
    chart
        .configure_mesh()
        .x_desc(spec.x_label.as_str())
        .y_desc(spec.y_label.as_str())
        .x_labels(8)
        .y_labels(8)
        .x_label_formatter(&|v| fmt_tick(*v * scale))
        .y_label_formatter(&|v| fmt_tick(*v))
        .draw()?;

    for (i, series) in spec.series.iter().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        let points = series.points.iter().copied().filter(|(x, y)| x.is_finite() && y.is_finite());
        match series.style {
            SeriesStyle::Markers => {
                chart
                    .draw_series(points.map(|p| Circle::new(p, 3, color.filled())))?
                    .label(series.label.as_str())
                    .legend(move |(x, y)| Circle::new((x + 10, y), 3, color.filled()));
            }
            SeriesStyle::Line => {
                chart
                    .draw_series(LineSeries::new(points, color.stroke_width(2)))?
                    .label(series.label.as_str())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
            }
            SeriesStyle::Dashed => {
                chart
                    .draw_series(DashedLineSeries::new(points, 8, 5, color.stroke_width(2)))?
                    .label(series.label.as_str())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
            }
        }
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.85))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

fn fmt_tick(v: f64) -> String {
    let a = v.abs();
    if a != 0.0 && (a >= 1e5 || a < 1e-2) {
        format!("{v:.1e}")
    } else if a >= 100.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.2}")
    }
}
