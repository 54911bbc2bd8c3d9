//! Catalog metadata: base-type classification and the read-only provider
//! the builder browses tables through.

use std::collections::HashMap;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CatalogError;
use crate::model::{CatalogTableId, DatabaseId, FieldMeta, FilterOperator, TableSpec};

/// Coarse classification of a field's base type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    Numeric,
    Text,
    Temporal,
    Boolean,
    Other,
}

impl TypeClass {
    /// Classify a base type tag. Accepts both namespaced tags
    /// (`type/BigInteger`) and bare SQL-ish names (`bigint`).
    pub fn of(base_type: &str) -> Self {
        let lower = base_type.to_lowercase();
        let base = lower.strip_prefix("type/").unwrap_or(&lower);
        let base = base.split('(').next().unwrap_or(base).trim();

        match base {
            // Integer types
            "integer" | "int" | "biginteger" | "bigint" | "smallint" | "tinyint" | "serial"
            | "bigserial" => Self::Numeric,

            // Floating point and fixed precision
            "float" | "double" | "real" | "decimal" | "numeric" | "number" | "currency"
            | "percentage" => Self::Numeric,

            // String types
            "text" | "varchar" | "char" | "string" | "uuid" | "email" | "url" | "category"
            | "name" | "title" => Self::Text,

            // Date/time
            "date" | "datetime" | "time" | "timestamp" | "datetimewithtz"
            | "datetimewithlocaltz" | "datetimewithzoneoffset" | "timewithtz" | "instant" => {
                Self::Temporal
            }

            "boolean" | "bool" => Self::Boolean,

            _ => Self::Other,
        }
    }

    /// Whether reducing aggregations (sum/avg/...) apply.
    pub fn is_aggregatable(self) -> bool {
        matches!(self, Self::Numeric)
    }

    /// Filter operators offered for fields of this class.
    pub fn operators(self) -> &'static [FilterOperator] {
        use FilterOperator::*;
        match self {
            Self::Numeric | Self::Temporal => &[Eq, Ne, Gt, Lt, Gte, Lte, IsNull, NotNull],
            Self::Text => &[
                Eq,
                Ne,
                Contains,
                DoesNotContain,
                StartsWith,
                EndsWith,
                IsNull,
                NotNull,
            ],
            Self::Boolean | Self::Other => &[Eq, Ne, IsNull, NotNull],
        }
    }

    pub fn supports(self, operator: FilterOperator) -> bool {
        self.operators().contains(&operator)
    }
}

/// Database entry in the catalog listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub id: DatabaseId,
    pub name: String,
    #[serde(default)]
    pub engine: Option<String>,
}

/// Table entry with its fields, as returned per database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogTable {
    pub id: CatalogTableId,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub schema: Option<String>,
    pub db_id: DatabaseId,
    #[serde(default)]
    pub fields: Vec<FieldMeta>,
}

impl CatalogTable {
    pub fn to_spec(&self) -> TableSpec {
        TableSpec {
            table_id: self.id,
            table_name: self.name.clone(),
            schema_name: self.schema.clone(),
            database_id: self.db_id,
            fields: self.fields.clone(),
        }
    }
}

/// Read-only metadata source.
pub trait CatalogProvider {
    fn databases(&self) -> impl Future<Output = Result<Vec<DatabaseInfo>, CatalogError>>;

    fn tables(
        &self,
        database_id: DatabaseId,
    ) -> impl Future<Output = Result<Vec<CatalogTable>, CatalogError>>;
}

/// Lazily expanded view over a [`CatalogProvider`]. Each database is fetched
/// at most once.
pub struct CatalogBrowser<P> {
    provider: P,
    databases: Option<Vec<DatabaseInfo>>,
    expanded: HashMap<DatabaseId, Vec<CatalogTable>>,
}

impl<P: CatalogProvider> CatalogBrowser<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            databases: None,
            expanded: HashMap::new(),
        }
    }

    pub async fn databases(&mut self) -> Result<&[DatabaseInfo], CatalogError> {
        if self.databases.is_none() {
            let list = self.provider.databases().await?;
            debug!(count = list.len(), "catalog.databases_loaded");
            self.databases = Some(list);
        }
        Ok(self.databases.as_deref().unwrap_or_default())
    }

    pub async fn expand(&mut self, database_id: DatabaseId) -> Result<&[CatalogTable], CatalogError> {
        if !self.expanded.contains_key(&database_id) {
            let tables = self.provider.tables(database_id).await?;
            debug!(database_id, count = tables.len(), "catalog.database_expanded");
            self.expanded.insert(database_id, tables);
        }
        Ok(self
            .expanded
            .get(&database_id)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    pub fn is_expanded(&self, database_id: DatabaseId) -> bool {
        self.expanded.contains_key(&database_id)
    }

    /// Look up an already-expanded table.
    pub fn table(&self, table_id: CatalogTableId) -> Option<&CatalogTable> {
        self.expanded
            .values()
            .flat_map(|tables| tables.iter())
            .find(|t| t.id == table_id)
    }
}
