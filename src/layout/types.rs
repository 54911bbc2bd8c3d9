//! Data structures for canvas layout.

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;
use crate::model::CanvasTableId;

/// Layout tunables. Every field can be overridden from JSON; missing keys keep
/// their defaults, and the result is validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LayoutOverrides")]
pub struct LayoutConfig {
    /// Fixed footprint of a table card
    pub table_width: f64,
    pub table_height: f64,
    /// Height of the draggable header strip
    pub header_height: f64,
    /// Spawn point of the first table
    pub origin_x: f64,
    pub spawn_y: f64,
    /// Horizontal gap between a new table and the rightmost one
    pub spawn_margin: f64,
    pub grid_pitch: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub zoom_step: f64,
    /// Upper bound for fit-to-view, tighter than `max_zoom`
    pub fit_max_zoom: f64,
    pub fit_padding: f64,
    pub minimap_scale: f64,
    pub minimap_width: f64,
    pub minimap_height: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            table_width: 220.0,
            table_height: 280.0,
            header_height: 40.0,
            origin_x: 50.0,
            spawn_y: 50.0,
            spawn_margin: 40.0,
            grid_pitch: 20.0,
            min_zoom: 0.5,
            max_zoom: 1.5,
            zoom_step: 0.1,
            fit_max_zoom: 1.2,
            fit_padding: 0.9,
            minimap_scale: 0.1,
            minimap_width: 200.0,
            minimap_height: 150.0,
        }
    }
}

impl LayoutConfig {
    /// Every setting finite, sizes and zoom bounds positive, and
    /// `min_zoom` below both zoom ceilings.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let settings = [
            ("table_width", self.table_width),
            ("table_height", self.table_height),
            ("header_height", self.header_height),
            ("origin_x", self.origin_x),
            ("spawn_y", self.spawn_y),
            ("spawn_margin", self.spawn_margin),
            ("grid_pitch", self.grid_pitch),
            ("min_zoom", self.min_zoom),
            ("max_zoom", self.max_zoom),
            ("zoom_step", self.zoom_step),
            ("fit_max_zoom", self.fit_max_zoom),
            ("fit_padding", self.fit_padding),
            ("minimap_scale", self.minimap_scale),
            ("minimap_width", self.minimap_width),
            ("minimap_height", self.minimap_height),
        ];
        if let Some((name, _)) = settings.into_iter().find(|(_, v)| !v.is_finite()) {
            return Err(LayoutError::NotFinite(name));
        }

        let positive = [
            ("table_width", self.table_width),
            ("table_height", self.table_height),
            ("min_zoom", self.min_zoom),
            ("zoom_step", self.zoom_step),
            ("fit_padding", self.fit_padding),
            ("minimap_scale", self.minimap_scale),
        ];
        if let Some((name, _)) = positive.into_iter().find(|(_, v)| *v <= 0.0) {
            return Err(LayoutError::NotPositive(name));
        }

        for max in [self.max_zoom, self.fit_max_zoom] {
            if self.min_zoom > max {
                return Err(LayoutError::ZoomBounds {
                    min: self.min_zoom,
                    max,
                });
            }
        }
        Ok(())
    }
}

/// Partial `LayoutConfig` as read from JSON.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LayoutOverrides {
    table_width: Option<f64>,
    table_height: Option<f64>,
    header_height: Option<f64>,
    origin_x: Option<f64>,
    spawn_y: Option<f64>,
    spawn_margin: Option<f64>,
    grid_pitch: Option<f64>,
    min_zoom: Option<f64>,
    max_zoom: Option<f64>,
    zoom_step: Option<f64>,
    fit_max_zoom: Option<f64>,
    fit_padding: Option<f64>,
    minimap_scale: Option<f64>,
    minimap_width: Option<f64>,
    minimap_height: Option<f64>,
}

impl TryFrom<LayoutOverrides> for LayoutConfig {
    type Error = LayoutError;

    fn try_from(o: LayoutOverrides) -> Result<Self, LayoutError> {
        let d = LayoutConfig::default();
        let config = LayoutConfig {
            table_width: o.table_width.unwrap_or(d.table_width),
            table_height: o.table_height.unwrap_or(d.table_height),
            header_height: o.header_height.unwrap_or(d.header_height),
            origin_x: o.origin_x.unwrap_or(d.origin_x),
            spawn_y: o.spawn_y.unwrap_or(d.spawn_y),
            spawn_margin: o.spawn_margin.unwrap_or(d.spawn_margin),
            grid_pitch: o.grid_pitch.unwrap_or(d.grid_pitch),
            min_zoom: o.min_zoom.unwrap_or(d.min_zoom),
            max_zoom: o.max_zoom.unwrap_or(d.max_zoom),
            zoom_step: o.zoom_step.unwrap_or(d.zoom_step),
            fit_max_zoom: o.fit_max_zoom.unwrap_or(d.fit_max_zoom),
            fit_padding: o.fit_padding.unwrap_or(d.fit_padding),
            minimap_scale: o.minimap_scale.unwrap_or(d.minimap_scale),
            minimap_width: o.minimap_width.unwrap_or(d.minimap_width),
            minimap_height: o.minimap_height.unwrap_or(d.minimap_height),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Axis-aligned box in canvas units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// A table footprint projected into the minimap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MinimapRect {
    pub id: CanvasTableId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Minimap {
    pub width: f64,
    pub height: f64,
    pub tables: Vec<MinimapRect>,
}
