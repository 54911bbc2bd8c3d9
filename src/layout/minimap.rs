//! Minimap projection.

use crate::model::CanvasTable;

use super::CanvasLayout;
use super::types::{Minimap, MinimapRect};

impl CanvasLayout {
    /// Project every table at the fixed minimap scale. Derived on each call.
    pub fn minimap(&self, tables: &[CanvasTable]) -> Minimap {
        let scale = self.config.minimap_scale;
        let tables = tables
            .iter()
            .map(|t| {
                let p = self.position_of(t);
                MinimapRect {
                    id: t.id,
                    x: p.x * scale,
                    y: p.y * scale,
                    width: self.config.table_width * scale,
                    height: self.config.table_height * scale,
                }
            })
            .collect();

        Minimap {
            width: self.config.minimap_width,
            height: self.config.minimap_height,
            tables,
        }
    }
}
