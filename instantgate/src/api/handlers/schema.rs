//! Schema description endpoints.

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use crate::api::error::ApiError;
use crate::api::AppState;

/// `GET /api/schema` — known table names.
pub async fn list_tables(State(state): State<AppState>) -> Json<Value> {
    let mut tables = state.schema.tables();
    tables.sort();

    Json(json!({
        "tables": tables,
        "count": tables.len(),
    }))
}

/// `GET /api/schema/{table}` — one table's description.
pub async fn table_schema(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let schema = state.schema.get(&table).ok_or(ApiError::TableNotFound)?;

    let columns: Vec<Value> = schema
        .sorted_column_names()
        .into_iter()
        .filter_map(|name| schema.column(name))
        .map(|column| {
            json!({
                "name": column.name.clone(),
                "type": column.native_type.clone(),
                "abstract_type": column.abstract_type,
                "nullable": column.nullable,
                "is_primary_key": column.is_primary_key,
                "is_auto_increment": column.is_auto_increment,
                "max_length": column.max_length,
            })
        })
        .collect();

    Ok(Json(json!({
        "name": schema.name.clone(),
        "primary_key": schema.primary_key.clone(),
        "columns": columns,
        "relationships": schema.relationships.clone(),
    })))
}
