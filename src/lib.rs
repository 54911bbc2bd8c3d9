pub mod catalog;
pub mod compiler;
pub mod error;
pub mod join;
pub mod layout;
pub mod model;
pub mod request;
pub mod router;
pub mod session;
pub mod store;

use wasm_bindgen::prelude::*;

use catalog::CatalogTable;
use compiler::compile;
use store::QueryGraph;

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Compile a graph snapshot to a query request. Returns `"null"` while the
/// graph has no tables.
#[wasm_bindgen(js_name = "compileQuery")]
pub fn compile_query(graph_json: &str) -> Result<String, String> {
    let graph: QueryGraph = serde_json::from_str(graph_json).map_err(|e| e.to_string())?;
    serde_json::to_string(&compile(&graph)).map_err(|e| e.to_string())
}

/// Suggest join keys between two catalog tables. Returns `"null"` when no
/// pair is found.
#[wasm_bindgen(js_name = "suggestJoin")]
pub fn suggest_join(source_json: &str, target_json: &str) -> Result<String, String> {
    let source: CatalogTable = serde_json::from_str(source_json).map_err(|e| e.to_string())?;
    let target: CatalogTable = serde_json::from_str(target_json).map_err(|e| e.to_string())?;
    serde_json::to_string(&join::suggest(&source, &target)).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_compile_query_empty_graph() {
        assert_eq!(compile_query("{}").unwrap(), "null");
    }

    #[test]
    fn test_compile_query_snapshot() {
        let graph = json!({
            "databaseId": 1,
            "tables": [{
                "id": 1,
                "tableId": 7,
                "tableName": "orders",
                "alias": "o",
                "databaseId": 1,
                "position": {"x": 50.0, "y": 50.0},
                "fields": [{"id": 70, "name": "id", "base_type": "type/Integer"}]
            }],
            "columns": [{
                "id": 2,
                "canvasTableId": 1,
                "fieldId": 70,
                "fieldName": "id",
                "tableName": "orders",
                "baseType": "type/Integer",
                "aggregation": "count"
            }]
        });
        let out: Value = serde_json::from_str(&compile_query(&graph.to_string()).unwrap()).unwrap();
        assert_eq!(
            out,
            json!({"source-table": 7, "joins": [], "fields": [["count", ["field", 70, null]]]})
        );
    }

    #[test]
    fn test_compile_query_rejects_garbage() {
        assert!(compile_query("not json").is_err());
    }

    #[test]
    fn test_suggest_join() {
        let orders = json!({
            "id": 1, "name": "orders", "db_id": 1,
            "fields": [
                {"id": 10, "name": "id", "base_type": "type/Integer"},
                {"id": 11, "name": "customer_id", "base_type": "type/Integer", "fk_target_field_id": 20}
            ]
        });
        let customers = json!({
            "id": 2, "name": "customers", "db_id": 1,
            "fields": [{"id": 20, "name": "id", "base_type": "type/Integer"}]
        });
        let out: Value =
            serde_json::from_str(&suggest_join(&orders.to_string(), &customers.to_string()).unwrap()).unwrap();
        assert_eq!(out, json!({"sourceFieldId": 11, "targetFieldId": 20}));
    }
}
