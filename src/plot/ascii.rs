//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - observed samples: `o`
//! - samples used by the fit (when a subset is active): `*`
//! - fitted curve: `-` line

use crate::domain::{FitResult, Subset};
use crate::plot::{finite_range, pad_range, sample_fit};

/// Render observed `(x, y)` samples with the fitted curve on top.
pub fn render_fit_preview(
    x: &[f64],
    y: &[f64],
    fit: &FitResult,
    subset: Option<&Subset>,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (x_min, x_max) = finite_range(x.iter().copied()).unwrap_or((0.0, 1.0));
    let curve = sample_fit(fit, x_min, x_max, width);

    let points: Vec<(f64, f64, char)> = x
        .iter()
        .zip(y)
        .enumerate()
        .map(|(i, (&xi, &yi))| {
            let marker = match subset {
                Some(rule) if rule.keeps(i, yi) => '*',
                _ => 'o',
            };
            (xi, yi, marker)
        })
        .collect();

    render_plot(&points, &curve, x_min, x_max, width, height)
}

fn render_plot(
    points: &[(f64, f64, char)],
    curve: &[(f64, f64)],
    x_min: f64,
    x_max: f64,
    width: usize,
    height: usize,
) -> String {
    let ys = points
        .iter()
        .map(|p| p.1)
        .chain(curve.iter().map(|p| p.1));
    let (y_min, y_max) = finite_range(ys).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Draw curve first (so points can overlay).
    draw_curve(&mut grid, curve, x_min, x_max, y_min, y_max);

    for &(x, y, marker) in points {
        if !(x.is_finite() && y.is_finite()) {
            continue;
        }
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        grid[row][col] = marker;
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: x=[{x_min:.3}, {x_max:.3}] | y=[{y_min:.2}, {y_max:.2}]\n"
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let span = x_max - x_min;
    let u = if span > 0.0 {
        ((x - x_min) / span).clamp(0.0, 1.0)
    } else {
        0.5
    };
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], x_min: f64, x_max: f64, y_min: f64, y_max: f64) {
    let height = grid.len();
    let width = grid[0].len();

    let mut prev: Option<(usize, usize)> = None;
    for &(x, y) in curve {
        if !y.is_finite() {
            prev = None;
            continue;
        }
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        match prev {
            Some((c0, r0)) => draw_line(grid, c0, r0, col, row, '-'),
            None => grid[row][col] = '-',
        }
        prev = Some((col, row));
    }
}

/// Integer line drawing (Bresenham).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let (mut x, mut y) = (x0 as isize, y0 as isize);
    let (x1, y1) = (x1 as isize, y1 as isize);

    let dx = (x1 - x).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let dy = -(y1 - y).abs();
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if let Some(cell) = grid.get_mut(y as usize).and_then(|r| r.get_mut(x as usize)) {
            if *cell == ' ' {
                *cell = ch;
            }
        }
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}
