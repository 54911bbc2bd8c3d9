//! Dispatch of drop events onto graph mutations.
//!
//! | payload      | target       | action                          |
//! |--------------|--------------|---------------------------------|
//! | `Table`      | `Canvas`     | add the table                   |
//! | `Field`      | `ColumnList` | add a column                    |
//! | `Column`     | `Column`     | move the column to that slot    |
//! | `TableLink`  | `Table`      | join the two tables             |
//!
//! Every other combination is ignored.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::DropError;
use crate::join;
use crate::model::*;
use crate::store::QueryGraph;

/// What is being dragged, as decoded from the drag data.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DragPayload {
    Table(TableDrag),
    Field(FieldDrag),
    #[serde(rename_all = "camelCase")]
    Column { column_id: ColumnId },
    /// Drag from one canvas table's connector onto another table.
    #[serde(rename_all = "camelCase")]
    TableLink { source_table_id: CanvasTableId },
}

impl DragPayload {
    pub fn from_json(data: &str) -> Result<Self, DropError> {
        serde_json::from_str(data).map_err(|e| DropError::Malformed(e.to_string()))
    }
}

/// Catalog table carried by a drag from the table browser. Fields are optional
/// because drag data is not trusted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDrag {
    pub table_id: Option<CatalogTableId>,
    pub table_name: Option<String>,
    pub schema_name: Option<String>,
    pub database_id: Option<DatabaseId>,
    #[serde(default)]
    pub fields: Vec<FieldMeta>,
}

impl TableDrag {
    pub fn into_spec(self) -> Result<TableSpec, DropError> {
        Ok(TableSpec {
            table_id: self.table_id.ok_or(DropError::MissingField("tableId"))?,
            table_name: self
                .table_name
                .filter(|n| !n.is_empty())
                .ok_or(DropError::MissingField("tableName"))?,
            schema_name: self.schema_name,
            database_id: self.database_id.ok_or(DropError::MissingField("databaseId"))?,
            fields: self.fields,
        })
    }
}

/// A field of a canvas table.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDrag {
    pub canvas_table_id: Option<CanvasTableId>,
    pub field_id: Option<FieldId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    Canvas,
    ColumnList,
    Column(ColumnId),
    Table(CanvasTableId),
}

/// Two tables the user wants joined, waiting for manual key selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinDraft {
    pub source_table_id: CanvasTableId,
    pub target_table_id: CanvasTableId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DropOutcome {
    Ignored,
    TableAdded(CanvasTableId),
    ColumnAdded(ColumnId),
    ColumnMoved { from: usize, to: usize },
    JoinAdded(JoinId),
    JoinDraft(JoinDraft),
    /// The message has also been recorded as the graph error.
    Rejected(String),
}

/// Apply a drop of `payload` onto `target`.
pub fn on_drop(graph: &mut QueryGraph, payload: DragPayload, target: DropTarget) -> DropOutcome {
    match (payload, target) {
        (DragPayload::Table(table), DropTarget::Canvas) => match table.into_spec() {
            Ok(spec) => match graph.add_table(spec) {
                Ok(id) => DropOutcome::TableAdded(id),
                Err(err) => DropOutcome::Rejected(err.to_string()),
            },
            Err(err) => reject(graph, err.to_string()),
        },
        (DragPayload::Field(field), DropTarget::ColumnList) => on_field_activated(graph, field),
        (DragPayload::Column { column_id }, DropTarget::Column(over)) => {
            move_column(graph, column_id, over)
        }
        (DragPayload::TableLink { source_table_id }, DropTarget::Table(target_table_id)) => {
            link_tables(graph, source_table_id, target_table_id)
        }
        (payload, target) => {
            debug!(?payload, ?target, "router.ignored_drop");
            DropOutcome::Ignored
        }
    }
}

/// Decode raw drag data and apply it. Undecodable data is rejected with a
/// message.
pub fn on_drop_json(graph: &mut QueryGraph, data: &str, target: DropTarget) -> DropOutcome {
    match DragPayload::from_json(data) {
        Ok(payload) => on_drop(graph, payload, target),
        Err(err) => {
            warn!(error = %err, "router.malformed_payload");
            reject(graph, err.to_string())
        }
    }
}

/// Add `field` as a column. Shared by drops on the column list and
/// double-clicks on a field.
pub fn on_field_activated(graph: &mut QueryGraph, field: FieldDrag) -> DropOutcome {
    let (Some(table_id), Some(field_id)) = (field.canvas_table_id, field.field_id) else {
        let missing = if field.canvas_table_id.is_none() {
            "canvasTableId"
        } else {
            "fieldId"
        };
        return reject(graph, DropError::MissingField(missing).to_string());
    };

    let added = graph
        .field_spec(table_id, field_id)
        .and_then(|spec| graph.add_column(spec));
    match added {
        Ok(id) => DropOutcome::ColumnAdded(id),
        Err(err) => reject(graph, err.to_string()),
    }
}

fn move_column(graph: &mut QueryGraph, dragged: ColumnId, over: ColumnId) -> DropOutcome {
    let (Some(from), Some(to)) = (graph.column_index(dragged), graph.column_index(over)) else {
        return DropOutcome::Ignored;
    };
    if from == to {
        return DropOutcome::Ignored;
    }
    match graph.reorder_columns(from, to) {
        Ok(()) => DropOutcome::ColumnMoved { from, to },
        Err(err) => reject(graph, err.to_string()),
    }
}

fn link_tables(graph: &mut QueryGraph, source: CanvasTableId, target: CanvasTableId) -> DropOutcome {
    if source == target {
        return DropOutcome::Ignored;
    }
    let (Some(s), Some(t)) = (graph.table(source), graph.table(target)) else {
        return DropOutcome::Ignored;
    };

    let Some(keys) = join::suggest(s, t) else {
        debug!(%source, %target, "router.join_needs_keys");
        return DropOutcome::JoinDraft(JoinDraft {
            source_table_id: source,
            target_table_id: target,
        });
    };

    let added = graph.add_join(JoinSpec {
        source_table_id: source,
        target_table_id: target,
        source_field_id: keys.source_field_id,
        target_field_id: keys.target_field_id,
        join_type: JoinType::default(),
    });
    match added {
        Ok(id) => DropOutcome::JoinAdded(id),
        Err(err) => reject(graph, err.to_string()),
    }
}

fn reject(graph: &mut QueryGraph, message: String) -> DropOutcome {
    debug!(%message, "router.rejected");
    graph.set_error(Some(message.clone()));
    DropOutcome::Rejected(message)
}
