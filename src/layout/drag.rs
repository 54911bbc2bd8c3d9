//! Table drag gesture.
//!
//! `Idle -> Dragging` on pointer-down inside a table header, `Dragging -> Idle`
//! on pointer-up (commit) or teardown (discard). Global pointer listeners are
//! attached for exactly the lifetime of one `Dragging` state.

use tracing::debug;

use crate::model::{CanvasTable, CanvasTableId, Position};

use super::CanvasLayout;
use super::placement::snap;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        table_id: CanvasTableId,
        /// Pointer minus table origin, in canvas units
        offset: Position,
    },
}

/// Registers the global move/up handlers a gesture needs.
pub trait PointerHost {
    fn attach(&mut self);
    fn detach(&mut self);
}

/// Receives the final position of a dragged table.
pub trait PositionSink {
    fn commit_position(&mut self, table_id: CanvasTableId, position: Position);
}

impl CanvasLayout {
    pub fn drag_state(&self) -> DragState {
        self.drag
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.drag, DragState::Dragging { .. })
    }

    /// Start dragging `table` if `pointer` (screen units) lands on its header.
    pub fn pointer_down(&mut self, table: &CanvasTable, pointer: Position, host: &mut impl PointerHost) -> bool {
        if self.is_dragging() {
            return false;
        }

        let point = self.to_canvas(pointer);
        let origin = table.position;
        let on_header = point.x >= origin.x
            && point.x <= origin.x + self.config.table_width
            && point.y >= origin.y
            && point.y <= origin.y + self.config.header_height;
        if !on_header {
            return false;
        }

        self.drag = DragState::Dragging {
            table_id: table.id,
            offset: Position::new(point.x - origin.x, point.y - origin.y),
        };
        self.shadow.insert(table.id, origin);
        host.attach();
        debug!(table_id = %table.id, "layout.drag_start");
        true
    }

    /// Move the shadow of the dragged table. Returns the new shadow position.
    pub fn pointer_move(&mut self, pointer: Position) -> Option<Position> {
        let DragState::Dragging { table_id, offset } = self.drag else {
            return None;
        };

        let point = self.to_canvas(pointer);
        let mut x = (point.x - offset.x).max(0.0);
        let mut y = (point.y - offset.y).max(0.0);
        if self.grid_snap {
            x = snap(x, self.config.grid_pitch);
            y = snap(y, self.config.grid_pitch);
        }

        let position = Position::new(x, y);
        self.shadow.insert(table_id, position);
        Some(position)
    }

    /// Finish the gesture, committing the shadow position exactly once.
    pub fn pointer_up(
        &mut self,
        sink: &mut impl PositionSink,
        host: &mut impl PointerHost,
    ) -> Option<(CanvasTableId, Position)> {
        let DragState::Dragging { table_id, .. } = std::mem::take(&mut self.drag) else {
            return None;
        };
        host.detach();

        let position = self.shadow.remove(&table_id)?;
        sink.commit_position(table_id, position);
        debug!(%table_id, x = position.x, y = position.y, "layout.drag_commit");
        Some((table_id, position))
    }

    /// Abandon an in-flight gesture without committing.
    pub fn teardown(&mut self, host: &mut impl PointerHost) {
        if let DragState::Dragging { table_id, .. } = std::mem::take(&mut self.drag) {
            host.detach();
            debug!(%table_id, "layout.drag_abandoned");
        }
        self.shadow.clear();
    }
}
