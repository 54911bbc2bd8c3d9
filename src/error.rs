use crate::model::{
    CanvasTableId, ColumnId, DatabaseId, FieldId, FilterId, FilterOperator, JoinId,
};

/// Validation failures of graph mutations. The display text is what the
/// builder shows the user.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("Table is already on the canvas")]
    TableAlreadyOnCanvas,
    #[error("All tables must be from the same database (expected {expected}, got {found})")]
    DatabaseMismatch {
        expected: DatabaseId,
        found: DatabaseId,
    },
    #[error("Remove all tables before switching database")]
    DatabaseLocked,
    #[error("Unknown table: {0}")]
    UnknownTable(CanvasTableId),
    #[error("Unknown join: {0}")]
    UnknownJoin(JoinId),
    #[error("Unknown column: {0}")]
    UnknownColumn(ColumnId),
    #[error("Unknown filter: {0}")]
    UnknownFilter(FilterId),
    #[error("A join must connect two different tables")]
    SelfJoin,
    #[error("Field {field_id} does not belong to {table}")]
    FieldNotInTable { field_id: FieldId, table: String },
    #[error("Column is already selected")]
    DuplicateColumn,
    #[error("Operator {operator} is not available for {base_type} fields")]
    UnsupportedOperator {
        operator: FilterOperator,
        base_type: String,
    },
    #[error("Column index {index} out of range ({len} columns)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Add a table to build a query")]
    NotCompilable,
    #[error("No database selected")]
    MissingDatabase,
    #[error("Invalid graph snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Layout settings that would leave the canvas without a usable zoom range.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("Layout setting {0} must be a finite number")]
    NotFinite(&'static str),
    #[error("Layout setting {0} must be positive")]
    NotPositive(&'static str),
    #[error("Zoom bounds out of order: minimum {min} exceeds maximum {max}")]
    ZoomBounds { min: f64, max: f64 },
}

/// Rejection from the query execution service.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct ExecutionError(pub String);

/// Rejection from the visualization persistence service.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct PersistenceError(pub String);

/// Failure of the catalog metadata provider.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Catalog error: {0}")]
pub struct CatalogError(pub String);

/// Drag payload that could not be turned into a graph mutation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DropError {
    #[error("Dropped item is missing {0}")]
    MissingField(&'static str),
    #[error("Unreadable drop payload: {0}")]
    Malformed(String),
}

/// Failure of a save request. Kept apart from the graph's error field.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SaveError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("Failed to save visualization: {0}")]
    Persistence(#[from] PersistenceError),
}
