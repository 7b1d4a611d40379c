//! PNG heatmaps of field maps.

use std::path::{Path, PathBuf};

use anyhow::anyhow;
use plotters::prelude::*;

use eim_rust::field::FieldMap;
use eim_rust::sweep::ScalarRow;

fn plot_error<E: std::fmt::Display>(err: E) -> anyhow::Error {
    anyhow!("plotting failed: {err}")
}

pub fn file_name(point: &ScalarRow) -> String {
    match point.gap {
        Some(gap) => format!(
            "{}_{}_w{}_g{}_l{}.png",
            point.kind, point.mode, point.width, gap, point.wavelength
        ),
        None => format!(
            "{}_{}_w{}_l{}.png",
            point.kind, point.mode, point.width, point.wavelength
        ),
    }
}

/// Cell edges around evenly spaced sample positions.
fn cell_edges(positions: &[f64]) -> Vec<(f64, f64)> {
    let half = match positions {
        [a, b, ..] => 0.5 * (b - a),
        _ => 0.5,
    };
    positions.iter().map(|p| (p - half, p + half)).collect()
}

/// Draw `|E|` normalised to its peak; lateral axis horizontal.
pub fn draw_field_map(point: &ScalarRow, map: &FieldMap, dir: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name(point));
    render(point, map, &path)?;
    Ok(path)
}

fn render(point: &ScalarRow, map: &FieldMap, path: &Path) -> anyhow::Result<()> {
    let rows = cell_edges(&map.transverse);
    let cols = cell_edges(&map.lateral);
    let (Some(&(y0, _)), Some(&(_, y1))) = (rows.first(), rows.last()) else {
        return Err(anyhow!("empty field map"));
    };
    let (Some(&(x0, _)), Some(&(_, x1))) = (cols.first(), cols.last()) else {
        return Err(anyhow!("empty field map"));
    };
    let (_, _, peak) = map.peak();
    let scale = if peak > 0.0 { 1.0 / peak } else { 0.0 };

    let root = BitMapBackend::new(path, (600, 500)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("{} |E|, neff = {:.4}", point.mode, point.neff),
            ("sans-serif", 24).into_font(),
        )
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x0..x1, y0..y1)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .x_desc("lateral")
        .y_desc("transverse")
        .disable_mesh()
        .draw()
        .map_err(plot_error)?;

    chart
        .draw_series(rows.iter().enumerate().flat_map(|(i, &(ya, yb))| {
            cols.iter().enumerate().map(move |(j, &(xa, xb))| {
                let v = (map.magnitude(i, j) * scale).clamp(0.0, 1.0);
                let shade = (255.0 * (1.0 - v)) as u8;
                Rectangle::new([(xa, ya), (xb, yb)], RGBColor(shade, shade, 255).filled())
            })
        }))
        .map_err(plot_error)?;

    root.present().map_err(plot_error)?;
    Ok(())
}
