//! The query graph: tables, joins, selected columns and filters placed by the
//! user, plus transient execution status.
//!
//! Every mutation validates first and either applies completely or returns a
//! [`GraphError`] leaving the graph untouched. Cross references are plain ids,
//! so removing a table is a filter over the other collections.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::TypeClass;
use crate::error::{ExecutionError, GraphError};
use crate::layout::{LayoutConfig, PositionSink, spawn_position};
use crate::model::*;
use crate::request::QueryResult;

/// Loading a snapshot re-checks every invariant a mutation would; see
/// [`GraphSnapshot`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "GraphSnapshot")]
pub struct QueryGraph {
    database_id: Option<DatabaseId>,
    tables: Vec<CanvasTable>,
    joins: Vec<JoinDefinition>,
    columns: Vec<SelectedColumn>,
    filters: Vec<FilterCondition>,

    #[serde(skip)]
    is_executing: bool,
    #[serde(skip)]
    error: Option<String>,
    #[serde(skip)]
    last_result: Option<QueryResult>,
    /// Bumped on every execution start and cancel; stale completions carry an
    /// older value.
    #[serde(skip)]
    execution_generation: u64,

    #[serde(skip)]
    layout: LayoutConfig,
    #[serde(skip)]
    last_id: u64,
}

/// Handle for one in-flight execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionTicket(u64);

impl QueryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config` for spawn placement of new tables.
    pub fn with_layout(config: LayoutConfig) -> Self {
        Self {
            layout: config,
            ..Self::default()
        }
    }

    pub fn database_id(&self) -> Option<DatabaseId> {
        self.database_id
    }

    pub fn tables(&self) -> &[CanvasTable] {
        &self.tables
    }

    pub fn joins(&self) -> &[JoinDefinition] {
        &self.joins
    }

    pub fn columns(&self) -> &[SelectedColumn] {
        &self.columns
    }

    pub fn filters(&self) -> &[FilterCondition] {
        &self.filters
    }

    pub fn table(&self, id: CanvasTableId) -> Option<&CanvasTable> {
        self.tables.iter().find(|t| t.id == id)
    }

    pub fn join(&self, id: JoinId) -> Option<&JoinDefinition> {
        self.joins.iter().find(|j| j.id == id)
    }

    pub fn column(&self, id: ColumnId) -> Option<&SelectedColumn> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn column_index(&self, id: ColumnId) -> Option<usize> {
        self.columns.iter().position(|c| c.id == id)
    }

    pub fn filter(&self, id: FilterId) -> Option<&FilterCondition> {
        self.filters.iter().find(|f| f.id == id)
    }

    pub fn is_executing(&self) -> bool {
        self.is_executing
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn last_result(&self) -> Option<&QueryResult> {
        self.last_result.as_ref()
    }

    /// Drop everything and return to the empty session state.
    pub fn reset(&mut self) {
        let layout = std::mem::take(&mut self.layout);
        let generation = self.execution_generation + 1;
        *self = Self {
            layout,
            execution_generation: generation,
            ..Self::default()
        };
        debug!("graph.reset");
    }

    pub fn set_database_id(&mut self, id: Option<DatabaseId>) -> Result<(), GraphError> {
        if !self.tables.is_empty() && id != self.database_id {
            return Err(self.reject(GraphError::DatabaseLocked));
        }
        self.database_id = id;
        Ok(())
    }

    // ==================== Tables ====================

    /// Place a catalog table on the canvas. The first table fixes the
    /// graph's database.
    pub fn add_table(&mut self, spec: TableSpec) -> Result<CanvasTableId, GraphError> {
        if self.tables.iter().any(|t| t.table_id == spec.table_id) {
            return Err(self.reject(GraphError::TableAlreadyOnCanvas));
        }
        if let Some(expected) = self.database_id
            && expected != spec.database_id
        {
            return Err(self.reject(GraphError::DatabaseMismatch {
                expected,
                found: spec.database_id,
            }));
        }

        let id = CanvasTableId(self.next_id());
        let position = spawn_position(&self.layout, self.tables.iter().map(|t| t.position));
        let alias = self.unique_alias(&spec.table_name);

        debug!(%id, table_id = spec.table_id, %alias, "graph.add_table");
        self.database_id = Some(spec.database_id);
        self.tables.push(CanvasTable {
            id,
            table_id: spec.table_id,
            table_name: spec.table_name,
            schema_name: spec.schema_name,
            alias,
            database_id: spec.database_id,
            position,
            fields: spec.fields,
        });
        self.error = None;
        Ok(id)
    }

    /// Remove a table together with every join, column and filter that
    /// references it. Removing the last table releases the database.
    pub fn remove_table(&mut self, id: CanvasTableId) -> Result<CanvasTable, GraphError> {
        let index = self
            .tables
            .iter()
            .position(|t| t.id == id)
            .ok_or(GraphError::UnknownTable(id))?;

        let table = self.tables.remove(index);
        self.joins.retain(|j| !j.touches(id));
        self.columns.retain(|c| c.canvas_table_id != id);
        self.filters.retain(|f| f.canvas_table_id != id);
        if self.tables.is_empty() {
            self.database_id = None;
        }

        debug!(%id, "graph.remove_table");
        Ok(table)
    }

    pub fn move_table(&mut self, id: CanvasTableId, position: Position) -> Result<(), GraphError> {
        let table = self
            .tables
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(GraphError::UnknownTable(id))?;
        table.position = position;
        Ok(())
    }

    // ==================== Joins ====================

    pub fn add_join(&mut self, spec: JoinSpec) -> Result<JoinId, GraphError> {
        self.check_join(
            spec.source_table_id,
            spec.target_table_id,
            spec.source_field_id,
            spec.target_field_id,
        )?;

        let id = JoinId(self.next_id());
        debug!(%id, source = %spec.source_table_id, target = %spec.target_table_id, "graph.add_join");
        self.joins.push(JoinDefinition {
            id,
            source_table_id: spec.source_table_id,
            target_table_id: spec.target_table_id,
            source_field_id: spec.source_field_id,
            target_field_id: spec.target_field_id,
            join_type: spec.join_type,
        });
        Ok(id)
    }

    pub fn update_join(&mut self, id: JoinId, patch: JoinPatch) -> Result<(), GraphError> {
        let current = self.join(id).ok_or(GraphError::UnknownJoin(id))?;
        let merged = JoinDefinition {
            id,
            source_table_id: patch.source_table_id.unwrap_or(current.source_table_id),
            target_table_id: patch.target_table_id.unwrap_or(current.target_table_id),
            source_field_id: patch.source_field_id.unwrap_or(current.source_field_id),
            target_field_id: patch.target_field_id.unwrap_or(current.target_field_id),
            join_type: patch.join_type.unwrap_or(current.join_type),
        };
        self.check_join(
            merged.source_table_id,
            merged.target_table_id,
            merged.source_field_id,
            merged.target_field_id,
        )?;

        if let Some(join) = self.joins.iter_mut().find(|j| j.id == id) {
            *join = merged;
        }
        Ok(())
    }

    pub fn remove_join(&mut self, id: JoinId) -> Result<JoinDefinition, GraphError> {
        let index = self
            .joins
            .iter()
            .position(|j| j.id == id)
            .ok_or(GraphError::UnknownJoin(id))?;
        Ok(self.joins.remove(index))
    }

    fn check_join(
        &self,
        source: CanvasTableId,
        target: CanvasTableId,
        source_field: FieldId,
        target_field: FieldId,
    ) -> Result<(), GraphError> {
        if source == target {
            return Err(GraphError::SelfJoin);
        }
        for (table_id, field_id) in [(source, source_field), (target, target_field)] {
            let table = self.table(table_id).ok_or(GraphError::UnknownTable(table_id))?;
            if !table.has_field(field_id) {
                return Err(GraphError::FieldNotInTable {
                    field_id,
                    table: table.table_name.clone(),
                });
            }
        }
        Ok(())
    }

    // ==================== Columns ====================

    /// Describe `field_id` of a canvas table as a column/filter spec.
    pub fn field_spec(&self, table_id: CanvasTableId, field_id: FieldId) -> Result<FieldSpec, GraphError> {
        let table = self.table(table_id).ok_or(GraphError::UnknownTable(table_id))?;
        let field = table.field(field_id).ok_or_else(|| GraphError::FieldNotInTable {
            field_id,
            table: table.table_name.clone(),
        })?;
        Ok(FieldSpec {
            canvas_table_id: table_id,
            field_id,
            field_name: field.name.clone(),
            table_name: table.table_name.clone(),
            base_type: field.base_type.clone(),
        })
    }

    /// Append a projected column with no aggregation. Names and base type
    /// are taken from the table's field metadata, not from `spec`.
    pub fn add_column(&mut self, spec: FieldSpec) -> Result<ColumnId, GraphError> {
        let spec = self.field_spec(spec.canvas_table_id, spec.field_id)?;
        if self
            .columns
            .iter()
            .any(|c| c.canvas_table_id == spec.canvas_table_id && c.field_id == spec.field_id)
        {
            return Err(GraphError::DuplicateColumn);
        }

        let id = ColumnId(self.next_id());
        debug!(%id, table = %spec.canvas_table_id, field_id = spec.field_id, "graph.add_column");
        self.columns.push(SelectedColumn {
            id,
            canvas_table_id: spec.canvas_table_id,
            field_id: spec.field_id,
            field_name: spec.field_name,
            table_name: spec.table_name,
            base_type: spec.base_type,
            aggregation: Aggregation::None,
            alias: None,
        });
        Ok(id)
    }

    /// Aggregations on non-numeric columns are coerced to `none`.
    pub fn update_column(&mut self, id: ColumnId, patch: ColumnPatch) -> Result<(), GraphError> {
        let column = self
            .columns
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(GraphError::UnknownColumn(id))?;

        if let Some(aggregation) = patch.aggregation {
            column.aggregation = if TypeClass::of(&column.base_type).is_aggregatable() {
                aggregation
            } else {
                if aggregation != Aggregation::None {
                    debug!(%id, base_type = %column.base_type, "graph.aggregation_coerced");
                }
                Aggregation::None
            };
        }
        if let Some(alias) = patch.alias {
            column.alias = alias.filter(|a| !a.trim().is_empty());
        }
        Ok(())
    }

    pub fn remove_column(&mut self, id: ColumnId) -> Result<SelectedColumn, GraphError> {
        let index = self.column_index(id).ok_or(GraphError::UnknownColumn(id))?;
        Ok(self.columns.remove(index))
    }

    /// Move the column at `from` to `to`, shifting the ones in between.
    pub fn reorder_columns(&mut self, from: usize, to: usize) -> Result<(), GraphError> {
        let len = self.columns.len();
        for index in [from, to] {
            if index >= len {
                return Err(GraphError::IndexOutOfRange { index, len });
            }
        }
        if from != to {
            let column = self.columns.remove(from);
            self.columns.insert(to, column);
            debug!(from, to, "graph.reorder_columns");
        }
        Ok(())
    }

    // ==================== Filters ====================

    /// Append a filter defaulting to `= null`, combined with AND. Names and
    /// base type come from the table's field metadata.
    pub fn add_filter(&mut self, spec: FieldSpec) -> Result<FilterId, GraphError> {
        let spec = self.field_spec(spec.canvas_table_id, spec.field_id)?;

        let id = FilterId(self.next_id());
        debug!(%id, table = %spec.canvas_table_id, field_id = spec.field_id, "graph.add_filter");
        self.filters.push(FilterCondition {
            id,
            canvas_table_id: spec.canvas_table_id,
            field_id: spec.field_id,
            field_name: spec.field_name,
            table_name: spec.table_name,
            base_type: spec.base_type,
            operator: FilterOperator::Eq,
            value: None,
            logic: FilterLogic::And,
        });
        Ok(id)
    }

    pub fn update_filter(&mut self, id: FilterId, patch: FilterPatch) -> Result<(), GraphError> {
        let filter = self
            .filters
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or(GraphError::UnknownFilter(id))?;

        if let Some(operator) = patch.operator
            && !TypeClass::of(&filter.base_type).supports(operator)
        {
            return Err(GraphError::UnsupportedOperator {
                operator,
                base_type: filter.base_type.clone(),
            });
        }

        if let Some(operator) = patch.operator {
            filter.operator = operator;
        }
        if let Some(value) = patch.value {
            filter.value = value;
        }
        if filter.operator.is_unary() {
            filter.value = None;
        }
        if let Some(logic) = patch.logic {
            filter.logic = logic;
        }
        Ok(())
    }

    pub fn remove_filter(&mut self, id: FilterId) -> Result<FilterCondition, GraphError> {
        let index = self
            .filters
            .iter()
            .position(|f| f.id == id)
            .ok_or(GraphError::UnknownFilter(id))?;
        Ok(self.filters.remove(index))
    }

    // ==================== Execution status ====================

    pub fn set_executing(&mut self, executing: bool) {
        self.is_executing = executing;
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    pub fn set_query_result(&mut self, result: QueryResult) {
        self.last_result = Some(result);
        self.error = None;
    }

    /// Mark an execution as started. Any earlier ticket becomes stale.
    pub fn begin_execution(&mut self) -> ExecutionTicket {
        self.execution_generation += 1;
        self.is_executing = true;
        ExecutionTicket(self.execution_generation)
    }

    pub fn is_current(&self, ticket: ExecutionTicket) -> bool {
        ticket.0 == self.execution_generation
    }

    /// Apply the outcome of the execution behind `ticket`. A failure keeps the
    /// previous result. Returns `false` and changes nothing for stale tickets.
    pub fn finish_execution(
        &mut self,
        ticket: ExecutionTicket,
        outcome: Result<QueryResult, ExecutionError>,
    ) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.is_executing = false;
        match outcome {
            Ok(result) => self.set_query_result(result),
            Err(err) => self.error = Some(err.to_string()),
        }
        true
    }

    /// Drop the execution behind `ticket` without recording an outcome.
    pub fn abandon_execution(&mut self, ticket: ExecutionTicket) {
        if self.is_current(ticket) {
            self.is_executing = false;
        }
    }

    /// Invalidate any in-flight execution.
    pub fn cancel_execution(&mut self) {
        self.execution_generation += 1;
        self.is_executing = false;
    }

    // ==================== Internals ====================

    /// Record a table-admission failure as the graph's error message.
    fn reject(&mut self, err: GraphError) -> GraphError {
        debug!(error = %err, "graph.rejected");
        self.error = Some(err.to_string());
        err
    }

    fn next_id(&mut self) -> u64 {
        // Snapshots loaded from JSON carry ids the counter has not seen.
        let used = self
            .tables
            .iter()
            .map(|t| t.id.0)
            .chain(self.joins.iter().map(|j| j.id.0))
            .chain(self.columns.iter().map(|c| c.id.0))
            .chain(self.filters.iter().map(|f| f.id.0))
            .max()
            .unwrap_or(0);
        self.last_id = self.last_id.max(used) + 1;
        self.last_id
    }

    fn unique_alias(&self, table_name: &str) -> String {
        let base = initials(table_name);
        let taken = |candidate: &str| self.tables.iter().any(|t| t.alias == candidate);
        if !taken(&base) {
            return base;
        }
        (2..)
            .map(|n| format!("{base}{n}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or(base)
    }
}

/// Unchecked graph as read from JSON.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    #[serde(default)]
    pub database_id: Option<DatabaseId>,
    #[serde(default)]
    pub tables: Vec<CanvasTable>,
    #[serde(default)]
    pub joins: Vec<JoinDefinition>,
    #[serde(default)]
    pub columns: Vec<SelectedColumn>,
    #[serde(default)]
    pub filters: Vec<FilterCondition>,
}

impl TryFrom<GraphSnapshot> for QueryGraph {
    type Error = GraphError;

    /// Rebuild the graph entity by entity with the same checks the mutations
    /// apply. Column and filter metadata is refreshed from the owning table,
    /// aggregations on non-numeric columns fall back to `none`, and unary
    /// filters lose their value.
    fn try_from(snapshot: GraphSnapshot) -> Result<Self, GraphError> {
        let mut ids = HashSet::new();
        let all_ids = snapshot
            .tables
            .iter()
            .map(|t| t.id.0)
            .chain(snapshot.joins.iter().map(|j| j.id.0))
            .chain(snapshot.columns.iter().map(|c| c.id.0))
            .chain(snapshot.filters.iter().map(|f| f.id.0));
        for id in all_ids {
            if !ids.insert(id) {
                return Err(GraphError::InvalidSnapshot(format!("id {id} is used twice")));
            }
        }

        let mut graph = QueryGraph {
            database_id: snapshot.database_id,
            ..Self::default()
        };

        for table in snapshot.tables {
            if graph.tables.iter().any(|t| t.table_id == table.table_id) {
                return Err(GraphError::TableAlreadyOnCanvas);
            }
            if graph.tables.iter().any(|t| t.alias == table.alias) {
                return Err(GraphError::InvalidSnapshot(format!(
                    "alias {} is used twice",
                    table.alias
                )));
            }
            match graph.database_id {
                Some(expected) if expected != table.database_id => {
                    return Err(GraphError::DatabaseMismatch {
                        expected,
                        found: table.database_id,
                    });
                }
                _ => graph.database_id = Some(table.database_id),
            }
            graph.tables.push(table);
        }

        for join in snapshot.joins {
            graph.check_join(
                join.source_table_id,
                join.target_table_id,
                join.source_field_id,
                join.target_field_id,
            )?;
            graph.joins.push(join);
        }

        for mut column in snapshot.columns {
            let spec = graph.field_spec(column.canvas_table_id, column.field_id)?;
            if graph
                .columns
                .iter()
                .any(|c| c.canvas_table_id == spec.canvas_table_id && c.field_id == spec.field_id)
            {
                return Err(GraphError::DuplicateColumn);
            }
            if !TypeClass::of(&spec.base_type).is_aggregatable() {
                column.aggregation = Aggregation::None;
            }
            column.alias = column.alias.filter(|a| !a.trim().is_empty());
            column.field_name = spec.field_name;
            column.table_name = spec.table_name;
            column.base_type = spec.base_type;
            graph.columns.push(column);
        }

        for mut filter in snapshot.filters {
            let spec = graph.field_spec(filter.canvas_table_id, filter.field_id)?;
            if !TypeClass::of(&spec.base_type).supports(filter.operator) {
                return Err(GraphError::UnsupportedOperator {
                    operator: filter.operator,
                    base_type: spec.base_type,
                });
            }
            if filter.operator.is_unary() {
                filter.value = None;
            }
            filter.field_name = spec.field_name;
            filter.table_name = spec.table_name;
            filter.base_type = spec.base_type;
            graph.filters.push(filter);
        }

        Ok(graph)
    }
}

impl PositionSink for QueryGraph {
    fn commit_position(&mut self, table_id: CanvasTableId, position: Position) {
        if let Err(err) = self.move_table(table_id, position) {
            debug!(error = %err, "graph.stale_drag_commit");
        }
    }
}

/// First letter of each word: `order_items` -> `oi`.
fn initials(name: &str) -> String {
    let alias: String = name
        .split(|c: char| c == '_' || c == '-' || c == '.' || c.is_whitespace())
        .filter_map(|word| word.chars().find(|c| c.is_alphanumeric()))
        .flat_map(char::to_lowercase)
        .collect();
    if alias.is_empty() { "t".to_string() } else { alias }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn field(id: FieldId, name: &str, base_type: &str) -> FieldMeta {
        FieldMeta {
            id,
            name: name.to_string(),
            display_name: name.to_string(),
            base_type: base_type.to_string(),
            semantic_type: None,
            fk_target_field_id: None,
        }
    }

    fn spec(table_id: CatalogTableId, name: &str, database_id: DatabaseId) -> TableSpec {
        TableSpec {
            table_id,
            table_name: name.to_string(),
            schema_name: None,
            database_id,
            fields: vec![
                field(table_id * 100 + 1, "id", "type/Integer"),
                field(table_id * 100 + 2, "name", "type/Text"),
                field(table_id * 100 + 3, "total", "type/Float"),
            ],
        }
    }

    /// orders (1) and customers (2) on database 1, joined and with one column
    /// and one filter each.
    fn populated() -> (QueryGraph, CanvasTableId, CanvasTableId) {
        let mut g = QueryGraph::new();
        let o = g.add_table(spec(1, "orders", 1)).unwrap();
        let c = g.add_table(spec(2, "customers", 1)).unwrap();
        g.add_join(JoinSpec {
            source_table_id: o,
            target_table_id: c,
            source_field_id: 101,
            target_field_id: 201,
            join_type: JoinType::Left,
        })
        .unwrap();
        for (t, f) in [(o, 103), (c, 202)] {
            let s = g.field_spec(t, f).unwrap();
            g.add_column(s.clone()).unwrap();
            g.add_filter(s).unwrap();
        }
        (g, o, c)
    }

    #[test]
    fn test_first_table_fixes_database() {
        let mut g = QueryGraph::new();
        assert_eq!(g.database_id(), None);

        g.add_table(spec(1, "orders", 7)).unwrap();
        g.add_table(spec(2, "customers", 7)).unwrap();
        assert_eq!(g.database_id(), Some(7));

        let err = g.add_table(spec(3, "products", 8)).unwrap_err();
        assert_eq!(err, GraphError::DatabaseMismatch { expected: 7, found: 8 });
        assert_eq!(g.tables().len(), 2);
        assert_eq!(g.error(), Some(err.to_string().as_str()));
    }

    #[test]
    fn test_preselected_database_is_enforced() {
        let mut g = QueryGraph::new();
        g.set_database_id(Some(3)).unwrap();
        assert!(matches!(
            g.add_table(spec(1, "orders", 4)),
            Err(GraphError::DatabaseMismatch { expected: 3, found: 4 })
        ));
        assert!(g.tables().is_empty());
    }

    #[test]
    fn test_duplicate_table_rejected() {
        let mut g = QueryGraph::new();
        g.add_table(spec(1, "orders", 1)).unwrap();
        assert_eq!(
            g.add_table(spec(1, "orders", 1)),
            Err(GraphError::TableAlreadyOnCanvas)
        );
        assert_eq!(g.tables().len(), 1);
        assert_eq!(g.error(), Some("Table is already on the canvas"));

        // a later success supersedes the message
        g.add_table(spec(2, "customers", 1)).unwrap();
        assert_eq!(g.error(), None);
    }

    #[test]
    fn test_database_locked_while_tables_present() {
        let mut g = QueryGraph::new();
        g.add_table(spec(1, "orders", 1)).unwrap();
        assert_eq!(g.set_database_id(Some(2)), Err(GraphError::DatabaseLocked));
        assert_eq!(g.database_id(), Some(1));
        assert!(g.set_database_id(Some(1)).is_ok());
    }

    #[test]
    fn test_spawn_positions_line_up() {
        let mut g = QueryGraph::new();
        g.add_table(spec(1, "orders", 1)).unwrap();
        g.add_table(spec(2, "customers", 1)).unwrap();
        let xs: Vec<f64> = g.tables().iter().map(|t| t.position.x).collect();
        let ys: Vec<f64> = g.tables().iter().map(|t| t.position.y).collect();
        assert_eq!(xs, vec![50.0, 310.0]);
        assert_eq!(ys, vec![50.0, 50.0]);
    }

    #[test]
    fn test_aliases_are_unique() {
        let mut g = QueryGraph::new();
        g.add_table(spec(1, "orders", 1)).unwrap();
        g.add_table(spec(2, "order_items", 1)).unwrap();
        g.add_table(spec(3, "offices", 1)).unwrap();
        g.add_table(spec(4, "Outlets", 1)).unwrap();
        let aliases: Vec<&str> = g.tables().iter().map(|t| t.alias.as_str()).collect();
        assert_eq!(aliases, vec!["o", "oi", "o2", "o3"]);
    }

    #[test]
    fn test_initials() {
        assert_eq!(initials("orders"), "o");
        assert_eq!(initials("order_line items"), "oli");
        assert_eq!(initials("__"), "t");
    }

    #[test]
    fn test_remove_table_cascades() {
        let (mut g, o, c) = populated();
        g.remove_table(c).unwrap();

        assert!(g.joins().is_empty());
        assert!(g.columns().iter().all(|col| col.canvas_table_id == o));
        assert!(g.filters().iter().all(|f| f.canvas_table_id == o));
        assert_eq!(g.columns().len(), 1);
        assert_eq!(g.database_id(), Some(1));
    }

    #[test]
    fn test_remove_join_source_table_cascades() {
        let (mut g, o, _) = populated();
        g.remove_table(o).unwrap();
        assert!(g.joins().is_empty());
    }

    #[test]
    fn test_remove_last_table_releases_database() {
        let (mut g, o, c) = populated();
        g.remove_table(o).unwrap();
        g.remove_table(c).unwrap();
        assert_eq!(g.database_id(), None);
        assert!(g.add_table(spec(9, "events", 2)).is_ok());
        assert_eq!(g.remove_table(o), Err(GraphError::UnknownTable(o)));
    }

    #[test]
    fn test_invalid_joins_rejected() {
        let (mut g, o, c) = populated();
        let before = g.joins().len();

        let self_join = JoinSpec {
            source_table_id: o,
            target_table_id: o,
            source_field_id: 101,
            target_field_id: 101,
            join_type: JoinType::Inner,
        };
        assert_eq!(g.add_join(self_join), Err(GraphError::SelfJoin));

        let foreign_field = JoinSpec {
            source_table_id: o,
            target_table_id: c,
            source_field_id: 201,
            target_field_id: 201,
            join_type: JoinType::Inner,
        };
        assert!(matches!(
            g.add_join(foreign_field),
            Err(GraphError::FieldNotInTable { field_id: 201, .. })
        ));
        assert_eq!(g.joins().len(), before);
        assert_eq!(g.error(), None);
    }

    #[test]
    fn test_update_join_validates_merged() {
        let (mut g, _, c) = populated();
        let id = g.joins()[0].id;

        g.update_join(id, JoinPatch { join_type: Some(JoinType::Inner), ..Default::default() })
            .unwrap();
        assert_eq!(g.join(id).unwrap().join_type, JoinType::Inner);

        let err = g
            .update_join(id, JoinPatch { source_table_id: Some(c), ..Default::default() })
            .unwrap_err();
        assert_eq!(err, GraphError::SelfJoin);
        assert_eq!(g.join(id).unwrap().source_field_id, 101);

        g.remove_join(id).unwrap();
        assert_eq!(g.remove_join(id), Err(GraphError::UnknownJoin(id)));
    }

    #[test]
    fn test_duplicate_column_is_noop() {
        let (mut g, o, _) = populated();
        let before = g.columns().len();
        let again = g.field_spec(o, 103).unwrap();
        assert_eq!(g.add_column(again), Err(GraphError::DuplicateColumn));
        assert_eq!(g.columns().len(), before);
    }

    #[test]
    fn test_column_requires_known_field() {
        let (mut g, o, _) = populated();
        let mut s = g.field_spec(o, 101).unwrap();
        s.field_id = 999;
        assert!(matches!(g.add_column(s), Err(GraphError::FieldNotInTable { .. })));
        assert!(g.field_spec(CanvasTableId(999), 1).is_err());
    }

    #[test]
    fn test_aggregation_forced_off_for_text() {
        let (mut g, o, c) = populated();
        let numeric = g.columns()[0].id;
        let text = g.columns()[1].id;
        assert_eq!(g.column(numeric).unwrap().canvas_table_id, o);
        assert_eq!(g.column(text).unwrap().canvas_table_id, c);

        g.update_column(numeric, ColumnPatch { aggregation: Some(Aggregation::Sum), ..Default::default() })
            .unwrap();
        g.update_column(text, ColumnPatch { aggregation: Some(Aggregation::Avg), ..Default::default() })
            .unwrap();
        assert_eq!(g.column(numeric).unwrap().aggregation, Aggregation::Sum);
        assert_eq!(g.column(text).unwrap().aggregation, Aggregation::None);

        g.update_column(text, ColumnPatch { alias: Some(Some("Customer".into())), ..Default::default() })
            .unwrap();
        assert_eq!(g.column(text).unwrap().alias.as_deref(), Some("Customer"));
        g.update_column(text, ColumnPatch { alias: Some(Some("  ".into())), ..Default::default() })
            .unwrap();
        assert_eq!(g.column(text).unwrap().alias, None);
    }

    #[test]
    fn test_field_metadata_comes_from_table() {
        let (mut g, o, _) = populated();
        // orders.name is text; the caller claims it is an integer
        let lying = FieldSpec {
            canvas_table_id: o,
            field_id: 102,
            field_name: "amount".to_string(),
            table_name: "payments".to_string(),
            base_type: "type/Integer".to_string(),
        };
        let col = g.add_column(lying.clone()).unwrap();
        let column = g.column(col).unwrap();
        assert_eq!(column.base_type, "type/Text");
        assert_eq!(column.field_name, "name");
        assert_eq!(column.table_name, "orders");

        g.update_column(col, ColumnPatch { aggregation: Some(Aggregation::Sum), ..Default::default() })
            .unwrap();
        assert_eq!(g.column(col).unwrap().aggregation, Aggregation::None);

        let filter = g.add_filter(lying).unwrap();
        assert_eq!(g.filter(filter).unwrap().base_type, "type/Text");
        let err = g
            .update_filter(filter, FilterPatch { operator: Some(FilterOperator::Gt), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, GraphError::UnsupportedOperator { .. }));
    }

    fn snapshot_json(columns: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "databaseId": 1,
            "tables": [{
                "id": 1,
                "tableId": 7,
                "tableName": "orders",
                "alias": "o",
                "databaseId": 1,
                "position": {"x": 50.0, "y": 50.0},
                "fields": [
                    {"id": 70, "name": "status", "base_type": "type/Text"},
                    {"id": 71, "name": "total", "base_type": "type/Float"}
                ]
            }],
            "columns": columns
        })
    }

    fn column_json(id: u64, table: u64, field: i64, aggregation: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "canvasTableId": table,
            "fieldId": field,
            "fieldName": "x",
            "tableName": "x",
            "baseType": "type/Integer",
            "aggregation": aggregation
        })
    }

    #[test]
    fn test_snapshot_with_dangling_reference_rejected() {
        let json = snapshot_json(serde_json::json!([column_json(2, 99, 555, "none")]));
        let err = serde_json::from_value::<QueryGraph>(json).unwrap_err();
        assert!(err.to_string().contains("Unknown table"));

        let json = snapshot_json(serde_json::json!([column_json(2, 1, 555, "none")]));
        assert!(serde_json::from_value::<QueryGraph>(json).is_err());
    }

    #[test]
    fn test_snapshot_duplicates_rejected() {
        let dup_column = snapshot_json(serde_json::json!([
            column_json(2, 1, 71, "none"),
            column_json(3, 1, 71, "sum")
        ]));
        assert!(serde_json::from_value::<QueryGraph>(dup_column).is_err());

        let dup_id = snapshot_json(serde_json::json!([column_json(1, 1, 71, "none")]));
        let err = serde_json::from_value::<QueryGraph>(dup_id).unwrap_err();
        assert!(err.to_string().contains("id 1 is used twice"));

        let mut other_db = snapshot_json(serde_json::json!([]));
        other_db["databaseId"] = serde_json::json!(2);
        assert!(serde_json::from_value::<QueryGraph>(other_db).is_err());
    }

    #[test]
    fn test_snapshot_normalized_on_load() {
        let json = snapshot_json(serde_json::json!([
            column_json(2, 1, 70, "sum"),
            column_json(3, 1, 71, "sum")
        ]));
        let g: QueryGraph = serde_json::from_value(json).unwrap();
        assert_eq!(g.columns()[0].aggregation, Aggregation::None);
        assert_eq!(g.columns()[0].base_type, "type/Text");
        assert_eq!(g.columns()[0].field_name, "status");
        assert_eq!(g.columns()[1].aggregation, Aggregation::Sum);
        assert_eq!(g.database_id(), Some(1));

        let text = g.compile().unwrap().fields;
        assert_eq!(
            serde_json::to_value(text).unwrap(),
            serde_json::json!([["field", 70, null], ["sum", ["field", 71, null]]])
        );
    }

    #[test]
    fn test_snapshot_round_trips() {
        let (g, _, _) = populated();
        let json = serde_json::to_string(&g).unwrap();
        let back: QueryGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back.compile(), g.compile());
        assert_eq!(back.tables(), g.tables());
    }

    #[test]
    fn test_reorder_columns() {
        let mut g = QueryGraph::new();
        let t = g.add_table(spec(1, "orders", 1)).unwrap();
        for f in [101, 102, 103] {
            let s = g.field_spec(t, f).unwrap();
            g.add_column(s).unwrap();
        }
        let names = |g: &QueryGraph| g.columns().iter().map(|c| c.field_name.clone()).collect::<Vec<_>>();

        g.reorder_columns(0, 2).unwrap();
        assert_eq!(names(&g), vec!["name", "total", "id"]);
        g.reorder_columns(2, 0).unwrap();
        assert_eq!(names(&g), vec!["id", "name", "total"]);
        g.reorder_columns(1, 1).unwrap();
        assert_eq!(names(&g), vec!["id", "name", "total"]);
        assert_eq!(
            g.reorder_columns(0, 3),
            Err(GraphError::IndexOutOfRange { index: 3, len: 3 })
        );
    }

    #[test]
    fn test_filter_defaults_and_updates() {
        let (mut g, _, _) = populated();
        let numeric = g.filters()[0].id;
        let text = g.filters()[1].id;

        let f = g.filter(numeric).unwrap();
        assert_eq!(f.operator, FilterOperator::Eq);
        assert_eq!(f.value, None);
        assert_eq!(f.logic, FilterLogic::And);

        g.update_filter(
            numeric,
            FilterPatch {
                operator: Some(FilterOperator::Gt),
                value: Some(Some(Scalar::Int(10))),
                logic: Some(FilterLogic::Or),
            },
        )
        .unwrap();
        let f = g.filter(numeric).unwrap();
        assert_eq!(f.operator, FilterOperator::Gt);
        assert_eq!(f.value, Some(Scalar::Int(10)));
        assert_eq!(f.logic, FilterLogic::Or);

        // switching to a null check drops the value
        g.update_filter(numeric, FilterPatch { operator: Some(FilterOperator::IsNull), ..Default::default() })
            .unwrap();
        assert_eq!(g.filter(numeric).unwrap().value, None);

        let err = g
            .update_filter(numeric, FilterPatch { operator: Some(FilterOperator::Contains), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, GraphError::UnsupportedOperator { .. }));
        assert_eq!(g.filter(numeric).unwrap().operator, FilterOperator::IsNull);

        g.update_filter(text, FilterPatch { operator: Some(FilterOperator::Contains), ..Default::default() })
            .unwrap();
        g.remove_filter(text).unwrap();
        assert_eq!(g.filters().len(), 1);
    }

    #[test]
    fn test_failed_execution_keeps_result() {
        let mut g = QueryGraph::new();
        let ticket = g.begin_execution();
        assert!(g.is_executing());
        let ok = QueryResult::default();
        assert!(g.finish_execution(ticket, Ok(ok.clone())));
        assert!(!g.is_executing());

        let ticket = g.begin_execution();
        assert!(g.finish_execution(ticket, Err(ExecutionError("boom".into()))));
        assert_eq!(g.error(), Some("boom"));
        assert_eq!(g.last_result(), Some(&ok));
        assert!(!g.is_executing());
    }

    #[test]
    fn test_stale_execution_ignored() {
        let mut g = QueryGraph::new();
        let first = g.begin_execution();
        g.cancel_execution();
        assert!(!g.is_executing());
        assert!(!g.finish_execution(first, Err(ExecutionError("late".into()))));
        assert_eq!(g.error(), None);
    }

    #[test]
    fn test_snapshot_round_trip_keeps_ids_fresh() {
        let (g, _, _) = populated();
        let json = serde_json::to_string(&g).unwrap();
        let mut loaded: QueryGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.tables(), g.tables());
        assert_eq!(loaded.columns(), g.columns());

        let t = loaded.add_table(spec(3, "products", 1)).unwrap();
        let mut ids: Vec<u64> = loaded.tables().iter().map(|t| t.id.0).collect();
        ids.extend(loaded.joins().iter().map(|j| j.id.0));
        ids.extend(loaded.columns().iter().map(|c| c.id.0));
        ids.extend(loaded.filters().iter().map(|f| f.id.0));
        let unique: std::collections::HashSet<u64> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());
        assert!(loaded.table(t).is_some());
    }

    #[test]
    fn test_drag_commit_moves_table() {
        let (mut g, o, _) = populated();
        g.commit_position(o, Position::new(400.0, 20.0));
        assert_eq!(g.table(o).unwrap().position, Position::new(400.0, 20.0));
        // a table removed mid-drag is ignored
        g.commit_position(CanvasTableId(999), Position::new(1.0, 1.0));
    }

    #[test]
    fn test_reset() {
        let (mut g, _, _) = populated();
        g.set_error(Some("x".into()));
        g.reset();
        assert!(g.tables().is_empty());
        assert!(g.columns().is_empty());
        assert_eq!(g.database_id(), None);
        assert_eq!(g.error(), None);
    }

    #[derive(Debug, Clone)]
    enum Op {
        AddTable { table_id: i64, database_id: i64 },
        RemoveTable(usize),
        AddColumn { table: usize, field: usize },
        AddFilter { table: usize, field: usize },
        Join { source: usize, target: usize },
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1i64..6, 1i64..3).prop_map(|(table_id, database_id)| Op::AddTable { table_id, database_id }),
            (0usize..6).prop_map(Op::RemoveTable),
            (0usize..6, 0usize..3).prop_map(|(table, field)| Op::AddColumn { table, field }),
            (0usize..6, 0usize..3).prop_map(|(table, field)| Op::AddFilter { table, field }),
            (0usize..6, 0usize..6).prop_map(|(source, target)| Op::Join { source, target }),
        ]
    }

    fn apply(g: &mut QueryGraph, op: Op) {
        let ids: Vec<(CanvasTableId, CatalogTableId)> =
            g.tables().iter().map(|t| (t.id, t.table_id)).collect();
        let pick = |i: usize| ids.get(i % ids.len().max(1)).copied();
        match op {
            Op::AddTable { table_id, database_id } => {
                let _ = g.add_table(spec(table_id, "t", database_id));
            }
            Op::RemoveTable(i) => {
                if let Some((id, _)) = pick(i) {
                    g.remove_table(id).unwrap();
                }
            }
            Op::AddColumn { table, field } | Op::AddFilter { table, field } => {
                if let Some((id, catalog)) = pick(table) {
                    let s = g.field_spec(id, catalog * 100 + 1 + field as i64).unwrap();
                    if matches!(op, Op::AddFilter { .. }) {
                        g.add_filter(s).unwrap();
                    } else {
                        let _ = g.add_column(s);
                    }
                }
            }
            Op::Join { source, target } => {
                if let (Some((s, sc)), Some((t, tc))) = (pick(source), pick(target)) {
                    let _ = g.add_join(JoinSpec {
                        source_table_id: s,
                        target_table_id: t,
                        source_field_id: sc * 100 + 1,
                        target_field_id: tc * 100 + 1,
                        join_type: JoinType::Left,
                    });
                }
            }
        }
    }

    fn assert_invariants(g: &QueryGraph) {
        let mut catalog_ids: Vec<_> = g.tables().iter().map(|t| t.table_id).collect();
        catalog_ids.sort();
        catalog_ids.dedup();
        assert_eq!(catalog_ids.len(), g.tables().len());
        if let Some(first) = g.tables().first() {
            assert!(g.tables().iter().all(|t| t.database_id == first.database_id));
            assert_eq!(g.database_id(), Some(first.database_id));
        }
        for j in g.joins() {
            assert_ne!(j.source_table_id, j.target_table_id);
            assert!(g.table(j.source_table_id).unwrap().has_field(j.source_field_id));
            assert!(g.table(j.target_table_id).unwrap().has_field(j.target_field_id));
        }
        let mut pairs: Vec<_> = g.columns().iter().map(|c| (c.canvas_table_id, c.field_id)).collect();
        pairs.sort();
        pairs.dedup();
        assert_eq!(pairs.len(), g.columns().len());
        assert!(g.columns().iter().all(|c| g.table(c.canvas_table_id).is_some()));
        assert!(g.filters().iter().all(|f| g.table(f.canvas_table_id).is_some()));
    }

    proptest! {
        #[test]
        fn prop_invariants_hold_after_any_sequence(ops in prop::collection::vec(arb_op(), 1..60)) {
            let mut g = QueryGraph::new();
            for op in ops {
                apply(&mut g, op);
                assert_invariants(&g);
            }
        }

        #[test]
        fn prop_remove_table_leaves_no_references(ops in prop::collection::vec(arb_op(), 1..40), victim in 0usize..6) {
            let mut g = QueryGraph::new();
            for op in ops {
                apply(&mut g, op);
            }
            prop_assume!(!g.tables().is_empty());
            let id = g.tables()[victim % g.tables().len()].id;
            g.remove_table(id).unwrap();
            prop_assert!(g.joins().iter().all(|j| !j.touches(id)));
            prop_assert!(g.columns().iter().all(|c| c.canvas_table_id != id));
            prop_assert!(g.filters().iter().all(|f| f.canvas_table_id != id));
        }

        #[test]
        fn prop_reorder_is_a_move(len in 1usize..8, from in 0usize..8, to in 0usize..8) {
            let from = from % len;
            let to = to % len;
            let mut g = QueryGraph::new();
            let fields = (0..len as i64)
                .map(|i| field(100 + i, &format!("f{i}"), "type/Integer"))
                .collect();
            let t = g
                .add_table(TableSpec { table_id: 1, table_name: "t".into(), schema_name: None, database_id: 1, fields })
                .unwrap();
            for i in 0..len as i64 {
                let s = g.field_spec(t, 100 + i).unwrap();
                g.add_column(s).unwrap();
            }
            let before: Vec<ColumnId> = g.columns().iter().map(|c| c.id).collect();
            g.reorder_columns(from, to).unwrap();
            let after: Vec<ColumnId> = g.columns().iter().map(|c| c.id).collect();

            prop_assert_eq!(after[to], before[from]);
            let rest_before: Vec<_> = before.iter().filter(|id| **id != before[from]).collect();
            let rest_after: Vec<_> = after.iter().filter(|id| **id != before[from]).collect();
            prop_assert_eq!(rest_before, rest_after);
        }
    }
}
