//! Lowering of a query graph snapshot into a [`QueryRequest`].
//!
//! Pure read of the graph, recomputed on every call. Joins are emitted in
//! creation order without reachability checks. Filters fold strictly left to
//! right, each condition's logic tag joining it to everything before it.

use crate::error::GraphError;
use crate::model::{Aggregation, CanvasTableId, FieldId, FilterCondition};
use crate::request::{
    DatasetRequest, FieldRef, FilterExpr, JoinClause, JoinCondition, Projection, QueryRequest,
};
use crate::store::QueryGraph;

/// Compile `graph`, or `None` while it has no source table.
pub fn compile(graph: &QueryGraph) -> Option<QueryRequest> {
    let root = graph.tables().first()?;
    let field_ref = |table_id: CanvasTableId, field_id: FieldId| FieldRef {
        field_id,
        join_alias: if table_id == root.id {
            None
        } else {
            graph.table(table_id).map(|t| t.alias.clone())
        },
    };

    let joins = graph
        .joins()
        .iter()
        .filter_map(|join| {
            let target = graph.table(join.target_table_id)?;
            Some(JoinClause {
                alias: target.alias.clone(),
                source_table: target.table_id,
                condition: JoinCondition {
                    lhs: field_ref(join.source_table_id, join.source_field_id),
                    rhs: field_ref(join.target_table_id, join.target_field_id),
                },
                strategy: join.join_type,
            })
        })
        .collect();

    let fields = graph
        .columns()
        .iter()
        .map(|column| {
            let field = field_ref(column.canvas_table_id, column.field_id);
            match column.aggregation {
                Aggregation::None => Projection::Field(field),
                aggregation => Projection::Aggregate { aggregation, field },
            }
        })
        .collect();

    let filter = graph.filters().iter().fold(None, |acc, condition| {
        let clause = compare(condition, field_ref(condition.canvas_table_id, condition.field_id));
        Some(match acc {
            None => clause,
            Some(lhs) => FilterExpr::Logical {
                logic: condition.logic,
                lhs: Box::new(lhs),
                rhs: Box::new(clause),
            },
        })
    });

    Some(QueryRequest {
        source_table: root.table_id,
        joins,
        fields,
        filter,
    })
}

fn compare(condition: &FilterCondition, field: FieldRef) -> FilterExpr {
    FilterExpr::Compare {
        operator: condition.operator,
        field,
        value: if condition.operator.is_unary() {
            None
        } else {
            condition.value.clone()
        },
    }
}

/// Execution body for the current graph.
pub fn dataset_request(graph: &QueryGraph) -> Result<DatasetRequest, GraphError> {
    let query = compile(graph).ok_or(GraphError::NotCompilable)?;
    let database = graph.database_id().ok_or(GraphError::MissingDatabase)?;
    Ok(DatasetRequest::new(database, query))
}

impl QueryGraph {
    pub fn compile(&self) -> Option<QueryRequest> {
        compile(self)
    }
}
