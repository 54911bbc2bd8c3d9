//! Entities of the query graph.
//!
//! Every entity lives in a flat collection on [`crate::store::QueryGraph`] and
//! refers to others by id only. Catalog ids (tables, fields, databases) come
//! from the metadata provider; canvas ids are handed out per session.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalog::TypeClass;

/// Catalog database identifier.
pub type DatabaseId = i64;
/// Catalog table identifier.
pub type CatalogTableId = i64;
/// Catalog field identifier.
pub type FieldId = i64;

macro_rules! session_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

session_id!(
    /// Session-local id of a table placed on the canvas.
    CanvasTableId
);
session_id!(
    /// Session-local id of a join.
    JoinId
);
session_id!(
    /// Session-local id of a selected column.
    ColumnId
);
session_id!(
    /// Session-local id of a filter condition.
    FilterId
);

/// Canvas coordinates in unscaled units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Field metadata as delivered by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMeta {
    pub id: FieldId,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    pub base_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fk_target_field_id: Option<FieldId>,
}

impl FieldMeta {
    pub fn type_class(&self) -> TypeClass {
        TypeClass::of(&self.base_type)
    }

    pub fn is_primary_key(&self) -> bool {
        self.semantic_type.as_deref() == Some("type/PK")
    }

    pub fn is_foreign_key(&self) -> bool {
        self.fk_target_field_id.is_some() || self.semantic_type.as_deref() == Some("type/FK")
    }
}

/// A table instance on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasTable {
    pub id: CanvasTableId,
    pub table_id: CatalogTableId,
    pub table_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    pub alias: String,
    pub database_id: DatabaseId,
    pub position: Position,
    pub fields: Vec<FieldMeta>,
}

impl CanvasTable {
    pub fn field(&self, field_id: FieldId) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.id == field_id)
    }

    pub fn has_field(&self, field_id: FieldId) -> bool {
        self.field(field_id).is_some()
    }
}

/// Input to [`crate::store::QueryGraph::add_table`]. Position and alias are
/// assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSpec {
    pub table_id: CatalogTableId,
    pub table_name: String,
    #[serde(default)]
    pub schema_name: Option<String>,
    pub database_id: DatabaseId,
    pub fields: Vec<FieldMeta>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    Inner,
    #[default]
    Left,
    Right,
    Full,
}

impl JoinType {
    /// Strategy keyword understood by the query backend.
    pub fn strategy(self) -> &'static str {
        match self {
            Self::Inner => "inner-join",
            Self::Left => "left-join",
            Self::Right => "right-join",
            Self::Full => "full-join",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinDefinition {
    pub id: JoinId,
    pub source_table_id: CanvasTableId,
    pub target_table_id: CanvasTableId,
    pub source_field_id: FieldId,
    pub target_field_id: FieldId,
    pub join_type: JoinType,
}

impl JoinDefinition {
    pub fn touches(&self, table: CanvasTableId) -> bool {
        self.source_table_id == table || self.target_table_id == table
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSpec {
    pub source_table_id: CanvasTableId,
    pub target_table_id: CanvasTableId,
    pub source_field_id: FieldId,
    pub target_field_id: FieldId,
    #[serde(default)]
    pub join_type: JoinType,
}

/// Partial update for a join; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinPatch {
    pub source_table_id: Option<CanvasTableId>,
    pub target_table_id: Option<CanvasTableId>,
    pub source_field_id: Option<FieldId>,
    pub target_field_id: Option<FieldId>,
    pub join_type: Option<JoinType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    None,
    Count,
    Distinct,
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregation {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Count => "count",
            Self::Distinct => "distinct",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedColumn {
    pub id: ColumnId,
    pub canvas_table_id: CanvasTableId,
    pub field_id: FieldId,
    pub field_name: String,
    pub table_name: String,
    pub base_type: String,
    pub aggregation: Aggregation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// Identifies one field of one canvas table; shared by column and filter specs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub canvas_table_id: CanvasTableId,
    pub field_id: FieldId,
    pub field_name: String,
    pub table_name: String,
    pub base_type: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnPatch {
    pub aggregation: Option<Aggregation>,
    /// `Some(None)` clears the alias.
    pub alias: Option<Option<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FilterOperator {
    #[default]
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "is-null")]
    IsNull,
    #[serde(rename = "not-null")]
    NotNull,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "does-not-contain")]
    DoesNotContain,
    #[serde(rename = "starts-with")]
    StartsWith,
    #[serde(rename = "ends-with")]
    EndsWith,
}

impl FilterOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::IsNull => "is-null",
            Self::NotNull => "not-null",
            Self::Contains => "contains",
            Self::DoesNotContain => "does-not-contain",
            Self::StartsWith => "starts-with",
            Self::EndsWith => "ends-with",
        }
    }

    /// Null checks take no comparison value.
    pub fn is_unary(self) -> bool {
        matches!(self, Self::IsNull | Self::NotNull)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterLogic {
    #[default]
    And,
    Or,
}

impl FilterLogic {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// Scalar comparison value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCondition {
    pub id: FilterId,
    pub canvas_table_id: CanvasTableId,
    pub field_id: FieldId,
    pub field_name: String,
    pub table_name: String,
    pub base_type: String,
    pub operator: FilterOperator,
    pub value: Option<Scalar>,
    /// How this condition combines with the one before it. Ignored on the
    /// first condition.
    pub logic: FilterLogic,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPatch {
    pub operator: Option<FilterOperator>,
    /// `Some(None)` clears the value.
    pub value: Option<Option<Scalar>>,
    pub logic: Option<FilterLogic>,
}
