//! Table placement and view fitting.

use crate::model::Position;

use super::types::{Bounds, LayoutConfig};

/// Spawn point for a new table: right of the rightmost existing footprint on
/// a fixed row, so new tables line up without overlap.
pub fn spawn_position<I>(config: &LayoutConfig, existing: I) -> Position
where
    I: IntoIterator<Item = Position>,
{
    let right_edge = existing
        .into_iter()
        .map(|p| p.x + config.table_width)
        .fold(None, |acc: Option<f64>, x| Some(acc.map_or(x, |m| m.max(x))));

    match right_edge {
        Some(edge) => Position::new(edge + config.spawn_margin, config.spawn_y),
        None => Position::new(config.origin_x, config.spawn_y),
    }
}

/// Bounding box of all table footprints, or `None` for an empty canvas.
pub fn content_bounds<I>(config: &LayoutConfig, positions: I) -> Option<Bounds>
where
    I: IntoIterator<Item = Position>,
{
    positions.into_iter().fold(None, |acc, p| {
        let b = Bounds {
            min_x: p.x,
            min_y: p.y,
            max_x: p.x + config.table_width,
            max_y: p.y + config.table_height,
        };
        Some(match acc {
            None => b,
            Some(a) => Bounds {
                min_x: a.min_x.min(b.min_x),
                min_y: a.min_y.min(b.min_y),
                max_x: a.max_x.max(b.max_x),
                max_y: a.max_y.max(b.max_y),
            },
        })
    })
}

/// Zoom level that fits `bounds` into the container with some padding.
pub fn fit_zoom(config: &LayoutConfig, bounds: &Bounds, container_width: f64, container_height: f64) -> f64 {
    let scale_x = container_width / bounds.width();
    let scale_y = container_height / bounds.height();
    clamp_zoom(scale_x.min(scale_y) * config.fit_padding, config.min_zoom, config.fit_max_zoom)
}

/// Like `f64::clamp`, but never panics: an inverted range resolves to `max`.
pub(crate) fn clamp_zoom(zoom: f64, min: f64, max: f64) -> f64 {
    zoom.max(min).min(max)
}

/// Round a coordinate to the nearest grid line.
pub fn snap(value: f64, pitch: f64) -> f64 {
    if pitch <= 0.0 {
        return value;
    }
    (value / pitch).round() * pitch
}
