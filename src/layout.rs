//! Canvas geometry: zoom, grid snap, fit-to-view, spawn placement, table
//! dragging and the minimap. Knows nothing about query semantics.

mod drag;
mod minimap;
mod placement;
mod types;

use std::collections::HashMap;

use crate::model::{CanvasTable, CanvasTableId, Position};
use placement::clamp_zoom;

pub use drag::{DragState, PointerHost, PositionSink};
pub use placement::{content_bounds, fit_zoom, snap, spawn_position};
pub use types::{Bounds, LayoutConfig, Minimap, MinimapRect};

/// View state of the canvas.
///
/// Authoritative table positions live in the query graph. While a drag is in
/// flight the engine holds a shadow position for the dragged table, written
/// back once on release.
pub struct CanvasLayout {
    pub(crate) config: LayoutConfig,
    pub(crate) zoom: f64,
    pub(crate) grid_snap: bool,
    pub(crate) drag: DragState,
    pub(crate) shadow: HashMap<CanvasTableId, Position>,
}

impl Default for CanvasLayout {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl CanvasLayout {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            zoom: 1.0,
            grid_snap: false,
            drag: DragState::Idle,
            shadow: HashMap::new(),
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = clamp_zoom(round_zoom(zoom), self.config.min_zoom, self.config.max_zoom);
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom + self.config.zoom_step);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom - self.config.zoom_step);
    }

    pub fn reset_zoom(&mut self) {
        self.zoom = 1.0;
    }

    pub fn grid_snap(&self) -> bool {
        self.grid_snap
    }

    pub fn set_grid_snap(&mut self, enabled: bool) {
        self.grid_snap = enabled;
    }

    /// Choose a zoom level so every table fits the container. Leaves the zoom
    /// untouched on an empty canvas.
    pub fn fit_to_view(&mut self, tables: &[CanvasTable], container_width: f64, container_height: f64) -> f64 {
        let positions = tables.iter().map(|t| self.position_of(t));
        if let Some(bounds) = content_bounds(&self.config, positions) {
            self.zoom = fit_zoom(&self.config, &bounds, container_width, container_height);
        }
        self.zoom
    }

    /// Position to render: the shadow copy while dragging, else the stored one.
    pub fn position_of(&self, table: &CanvasTable) -> Position {
        self.shadow.get(&table.id).copied().unwrap_or(table.position)
    }

    pub fn shadow_position(&self, id: CanvasTableId) -> Option<Position> {
        self.shadow.get(&id).copied()
    }

    pub fn has_shadow(&self) -> bool {
        !self.shadow.is_empty()
    }

    /// Screen point to canvas coordinates.
    pub(crate) fn to_canvas(&self, screen: Position) -> Position {
        Position::new(screen.x / self.zoom, screen.y / self.zoom)
    }
}

// Keeps repeated 0.1 steps from drifting (1.0 + 0.1 + 0.1 != 1.2).
fn round_zoom(zoom: f64) -> f64 {
    (zoom * 100.0).round() / 100.0
}
