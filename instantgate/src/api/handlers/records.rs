//! Generic CRUD orchestration over any allowed table.
//!
//! Each verb walks the same pipeline: access check, filter parsing, SQL
//! compilation against the schema cache snapshot, execution, and response
//! shaping. The access check runs before any parsing or compilation, so a
//! blocked table never reaches SQL.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use instantgate_core::{parse_query, rows, RowObject, ScalarValue};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::api::error::ApiError;
use crate::api::AppState;
use crate::cache::ResponseCache;

static X_TOTAL_COUNT: HeaderName = HeaderName::from_static("x-total-count");
static X_LIMIT: HeaderName = HeaderName::from_static("x-limit");
static X_OFFSET: HeaderName = HeaderName::from_static("x-offset");

/// List response body; also the unit stored in the response cache.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListEnvelope {
    pub data: Vec<RowObject>,
    pub count: usize,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub limit: u32,
    pub offset: u64,
    pub total: i64,
}

/// `GET /api/api/{table}` — filtered, sorted, paginated listing.
pub async fn list(
    State(state): State<AppState>,
    Path(table): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response, ApiError> {
    ensure_table_access(&state, &table)?;
    if !state.schema.table_exists(&table) {
        return Err(ApiError::TableNotFound);
    }

    let params = parse_query(query.as_deref().unwrap_or(""))?;
    let select = state.builder.build_select(&table, &params)?;

    let cache_key = ResponseCache::query_key(&table, &params);
    if let Some(cache) = &state.cache {
        if let Some(envelope) = cache.get_json::<ListEnvelope>(&cache_key).await {
            return Ok(list_response(envelope));
        }
    }

    let data = rows::fetch_rows(&state.pool, &select).await?;

    // COUNT failures are non-fatal; the listing still goes out.
    let total = match state.builder.build_count(&table, &params) {
        Ok(count_stmt) => rows::fetch_count(&state.pool, &count_stmt)
            .await
            .unwrap_or_else(|err| {
                tracing::warn!(table = %table, error = %err, "count query failed");
                0
            }),
        Err(_) => 0,
    };

    let envelope = ListEnvelope {
        count: data.len(),
        data,
        pagination: PaginationMeta {
            limit: params.pagination.limit,
            offset: params.pagination.offset,
            total,
        },
    };

    if let Some(cache) = &state.cache {
        cache.put_json(&cache_key, &envelope).await;
    }

    Ok(list_response(envelope))
}

/// `GET /api/api/{table}/{id}` — single row by primary key.
pub async fn read(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>, ApiError> {
    ensure_table_access(&state, &table)?;

    let params = parse_query(query.as_deref().unwrap_or(""))?;
    let statement = state
        .builder
        .build_select_by_id(&table, &path_id(&id), &params.fields)?;

    let mut results = rows::fetch_rows(&state.pool, &statement).await?;
    match results.pop() {
        Some(row) => Ok(Json(Value::Object(row))),
        None => Err(ApiError::RecordNotFound),
    }
}

/// `POST /api/api/{table}` — insert one row.
pub async fn create(
    State(state): State<AppState>,
    Path(table): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    ensure_table_access(&state, &table)?;
    if !state.schema.table_exists(&table) {
        return Err(ApiError::TableNotFound);
    }

    let payload = object_payload(body)?;
    let statement = state.builder.build_insert(&table, &payload)?;
    let outcome = rows::execute(&state.pool, &statement).await?;

    invalidate_cache(&state, &table).await;

    let body = json!({
        "id": outcome.last_insert_id,
        "message": "Record created successfully",
    });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

/// `PATCH /api/api/{table}/{id}` — partial update by primary key.
pub async fn update(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    ensure_table_access(&state, &table)?;
    if !state.schema.table_exists(&table) {
        return Err(ApiError::TableNotFound);
    }

    let payload = object_payload(body)?;
    let statement = state.builder.build_update(&table, &path_id(&id), &payload)?;
    let outcome = rows::execute(&state.pool, &statement).await?;

    if outcome.rows_affected == 0 {
        return Err(ApiError::RecordNotFound);
    }

    invalidate_cache(&state, &table).await;

    Ok(Json(json!({
        "message": "Record updated successfully",
        "id": id,
    })))
}

/// `DELETE /api/api/{table}/{id}` — delete by primary key.
pub async fn remove(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    ensure_table_access(&state, &table)?;
    if !state.schema.table_exists(&table) {
        return Err(ApiError::TableNotFound);
    }

    let statement = state.builder.build_delete(&table, &path_id(&id))?;
    let outcome = rows::execute(&state.pool, &statement).await?;

    if outcome.rows_affected == 0 {
        return Err(ApiError::RecordNotFound);
    }

    invalidate_cache(&state, &table).await;

    Ok(Json(json!({
        "message": "Record deleted successfully",
        "id": id,
    })))
}

fn ensure_table_access(state: &AppState, table: &str) -> Result<(), ApiError> {
    if !state.access.is_table_allowed(table) {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

/// An integer-looking id binds as an integer so numeric primary keys
/// compare natively; anything else binds as text.
fn path_id(raw: &str) -> ScalarValue {
    match raw.parse::<i64>() {
        Ok(id) => ScalarValue::Int(id),
        Err(_) => ScalarValue::Text(raw.to_string()),
    }
}

/// Unwraps the JSON body into a non-empty object.
fn object_payload(
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Map<String, Value>, ApiError> {
    let Json(value) = body.map_err(|_| ApiError::InvalidInput("invalid JSON body".to_string()))?;
    let Value::Object(payload) = value else {
        return Err(ApiError::InvalidInput(
            "request body must be a JSON object".to_string(),
        ));
    };
    if payload.is_empty() {
        return Err(ApiError::InvalidInput("request body is empty".to_string()));
    }
    Ok(payload)
}

fn list_response(envelope: ListEnvelope) -> Response {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&envelope.pagination.total.to_string()) {
        headers.insert(X_TOTAL_COUNT.clone(), value);
    }
    if let Ok(value) = HeaderValue::from_str(&envelope.pagination.limit.to_string()) {
        headers.insert(X_LIMIT.clone(), value);
    }
    if let Ok(value) = HeaderValue::from_str(&envelope.pagination.offset.to_string()) {
        headers.insert(X_OFFSET.clone(), value);
    }
    (StatusCode::OK, headers, Json(envelope)).into_response()
}

async fn invalidate_cache(state: &AppState, table: &str) {
    if let Some(cache) = &state.cache {
        cache.invalidate_table(table).await;
    }
}
