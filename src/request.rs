//! Wire shapes exchanged with the query backend.
//!
//! Clauses of the compiled query are positional arrays
//! (`["=", ["field", 12, null], 5]`), so the AST nodes serialize by hand.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};

use crate::model::{
    Aggregation, CatalogTableId, DatabaseId, FieldId, FieldMeta, FilterLogic, FilterOperator,
    JoinType, Scalar,
};

/// Compiled structured query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRequest {
    #[serde(rename = "source-table")]
    pub source_table: CatalogTableId,
    pub joins: Vec<JoinClause>,
    pub fields: Vec<Projection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterExpr>,
}

/// `["field", id, null]`, or `["field", id, {"join-alias": alias}]` for a
/// field reached through a join.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRef {
    pub field_id: FieldId,
    pub join_alias: Option<String>,
}

impl Serialize for FieldRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(3))?;
        seq.serialize_element("field")?;
        seq.serialize_element(&self.field_id)?;
        match &self.join_alias {
            Some(alias) => seq.serialize_element(&JoinAliasOption(alias))?,
            None => seq.serialize_element(&())?,
        }
        seq.end()
    }
}

struct JoinAliasOption<'a>(&'a str);

impl Serialize for JoinAliasOption<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("join-alias", self.0)?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinClause {
    pub alias: String,
    #[serde(rename = "source-table")]
    pub source_table: CatalogTableId,
    pub condition: JoinCondition,
    #[serde(serialize_with = "serialize_strategy")]
    pub strategy: JoinType,
}

fn serialize_strategy<S: Serializer>(join_type: &JoinType, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(join_type.strategy())
}

/// Equality between the two join keys: `["=", lhs, rhs]`.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinCondition {
    pub lhs: FieldRef,
    pub rhs: FieldRef,
}

impl Serialize for JoinCondition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(3))?;
        seq.serialize_element("=")?;
        seq.serialize_element(&self.lhs)?;
        seq.serialize_element(&self.rhs)?;
        seq.end()
    }
}

/// One projected column.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Field(FieldRef),
    /// `[aggregation, field-ref]`
    Aggregate {
        aggregation: Aggregation,
        field: FieldRef,
    },
}

impl Serialize for Projection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Field(field) => field.serialize(serializer),
            Self::Aggregate { aggregation, field } => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(aggregation.keyword())?;
                seq.serialize_element(field)?;
                seq.end()
            }
        }
    }
}

/// Boolean filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// `[op, field-ref, value]`; null checks drop the value.
    Compare {
        operator: FilterOperator,
        field: FieldRef,
        value: Option<Scalar>,
    },
    /// `["and" | "or", lhs, rhs]`
    Logical {
        logic: FilterLogic,
        lhs: Box<FilterExpr>,
        rhs: Box<FilterExpr>,
    },
}

impl Serialize for FilterExpr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Compare {
                operator,
                field,
                value,
            } => {
                let unary = operator.is_unary();
                let mut seq = serializer.serialize_seq(Some(if unary { 2 } else { 3 }))?;
                seq.serialize_element(operator.symbol())?;
                seq.serialize_element(field)?;
                if !unary {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
            Self::Logical { logic, lhs, rhs } => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(logic.keyword())?;
                seq.serialize_element(lhs.as_ref())?;
                seq.serialize_element(rhs.as_ref())?;
                seq.end()
            }
        }
    }
}

/// Body accepted by the query execution service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetRequest {
    pub database: DatabaseId,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub query: QueryRequest,
}

impl DatasetRequest {
    pub fn new(database: DatabaseId, query: QueryRequest) -> Self {
        Self {
            database,
            kind: "query",
            query,
        }
    }
}

/// Rows returned by the execution service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub data: ResultData,
    #[serde(default)]
    pub row_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultData {
    #[serde(default)]
    pub cols: Vec<FieldMeta>,
    #[serde(default)]
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// Body accepted by the visualization persistence service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveVisualizationRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub database_id: DatabaseId,
    pub query_type: &'static str,
    pub query: QueryRequest,
    pub visualization_type: String,
    pub visualization_settings: serde_json::Value,
}
