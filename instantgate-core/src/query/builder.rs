//! Compilation of query parameters into parameterized SQL.
//!
//! Every identifier in the emitted SQL comes from the cached schema, never
//! from request input: table names must exist in the cache and every field
//! (filter, sort, projection, insert or update column) must exist in the
//! target table's column map. Values are always bound through positional
//! `?` placeholders. Identifiers are backtick-quoted so reserved words in
//! the catalog cannot collide with keywords.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{GateError, Result};
use crate::models::TableSchema;
use crate::query::filter::{Filter, FilterOperand, FilterOperator, QueryParams, ScalarValue};
use crate::schema::SchemaCache;

/// A compiled statement: SQL text plus the values to bind, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    pub sql: String,
    pub params: Vec<ScalarValue>,
}

/// Compiles `(table, QueryParams)` pairs into bound statements against the
/// schema cache snapshot current at compile time.
pub struct QueryBuilder {
    schema: Arc<SchemaCache>,
}

impl QueryBuilder {
    pub fn new(schema: Arc<SchemaCache>) -> Self {
        Self { schema }
    }

    fn table_schema(&self, table: &str) -> Result<Arc<TableSchema>> {
        self.schema
            .get(table)
            .ok_or_else(|| GateError::table_not_found(table))
    }

    /// Builds a SELECT over the table with filters, sorting and pagination.
    pub fn build_select(&self, table: &str, params: &QueryParams) -> Result<BoundStatement> {
        let schema = self.table_schema(table)?;

        let columns = projected_columns(&schema, &params.fields)?;
        let mut sql = format!(
            "SELECT {} FROM {}",
            join_idents(&columns),
            quote_ident(&schema.name)
        );

        let (predicate, bound) = compile_filters(&schema, &params.filters)?;
        if !predicate.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate);
        }

        if let Some(sorting) = &params.sorting {
            if !schema.has_column(&sorting.field) {
                return Err(GateError::unknown_column(&schema.name, &sorting.field));
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(&quote_ident(&sorting.field));
            sql.push(' ');
            sql.push_str(sorting.direction.sql());
        }

        if params.pagination.limit > 0 {
            sql.push_str(&format!(" LIMIT {}", params.pagination.limit));
        }
        if params.pagination.offset > 0 {
            sql.push_str(&format!(" OFFSET {}", params.pagination.offset));
        }

        Ok(BoundStatement { sql, params: bound })
    }

    /// Builds a single-row SELECT keyed by the table's primary key.
    pub fn build_select_by_id(
        &self,
        table: &str,
        id: &ScalarValue,
        fields: &[String],
    ) -> Result<BoundStatement> {
        let schema = self.table_schema(table)?;
        let primary_key = schema
            .primary_key
            .as_deref()
            .ok_or_else(|| GateError::no_primary_key(table))?;

        let columns = projected_columns(&schema, fields)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ? LIMIT 1",
            join_idents(&columns),
            quote_ident(&schema.name),
            quote_ident(primary_key)
        );

        Ok(BoundStatement {
            sql,
            params: vec![id.clone()],
        })
    }

    /// Builds a COUNT over the same predicate as [`Self::build_select`].
    ///
    /// Sorting, projection and pagination are ignored.
    pub fn build_count(&self, table: &str, params: &QueryParams) -> Result<BoundStatement> {
        let schema = self.table_schema(table)?;

        let mut sql = format!("SELECT COUNT(*) FROM {}", quote_ident(&schema.name));
        let (predicate, bound) = compile_filters(&schema, &params.filters)?;
        if !predicate.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate);
        }

        Ok(BoundStatement { sql, params: bound })
    }

    /// Builds an INSERT from a JSON object payload.
    ///
    /// Auto-increment columns are silently dropped; unknown columns are
    /// rejected. A payload with zero effective columns fails with
    /// [`GateError::NoUpdatableColumns`].
    pub fn build_insert(&self, table: &str, payload: &Map<String, Value>) -> Result<BoundStatement> {
        let schema = self.table_schema(table)?;

        let mut columns: Vec<&str> = Vec::with_capacity(payload.len());
        let mut values: Vec<ScalarValue> = Vec::with_capacity(payload.len());

        for key in sorted_keys(payload) {
            let column = schema
                .column(key)
                .ok_or_else(|| GateError::unknown_column(table, key))?;
            if column.is_auto_increment {
                continue;
            }
            columns.push(key);
            values.push(ScalarValue::from_json(&payload[key]));
        }

        if columns.is_empty() {
            return Err(GateError::no_updatable_columns(table));
        }

        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&schema.name),
            join_idents(&columns),
            placeholders
        );

        Ok(BoundStatement {
            sql,
            params: values,
        })
    }

    /// Builds an UPDATE keyed by the primary key.
    ///
    /// Primary-key and auto-increment columns are silently dropped from the
    /// SET clause; unknown columns are rejected; at least one effective
    /// column is required.
    pub fn build_update(
        &self,
        table: &str,
        id: &ScalarValue,
        payload: &Map<String, Value>,
    ) -> Result<BoundStatement> {
        let schema = self.table_schema(table)?;
        let primary_key = schema
            .primary_key
            .as_deref()
            .ok_or_else(|| GateError::no_primary_key(table))?;

        let mut assignments: Vec<String> = Vec::with_capacity(payload.len());
        let mut values: Vec<ScalarValue> = Vec::with_capacity(payload.len() + 1);

        for key in sorted_keys(payload) {
            let column = schema
                .column(key)
                .ok_or_else(|| GateError::unknown_column(table, key))?;
            if column.is_primary_key || column.is_auto_increment {
                continue;
            }
            assignments.push(format!("{} = ?", quote_ident(key)));
            values.push(ScalarValue::from_json(&payload[key]));
        }

        if assignments.is_empty() {
            return Err(GateError::no_updatable_columns(table));
        }

        values.push(id.clone());
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote_ident(&schema.name),
            assignments.join(", "),
            quote_ident(primary_key)
        );

        Ok(BoundStatement {
            sql,
            params: values,
        })
    }

    /// Builds a DELETE keyed by the primary key.
    pub fn build_delete(&self, table: &str, id: &ScalarValue) -> Result<BoundStatement> {
        let schema = self.table_schema(table)?;
        let primary_key = schema
            .primary_key
            .as_deref()
            .ok_or_else(|| GateError::no_primary_key(table))?;

        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            quote_ident(&schema.name),
            quote_ident(primary_key)
        );

        Ok(BoundStatement {
            sql,
            params: vec![id.clone()],
        })
    }
}

/// Resolves the projected column list: requested fields validated against
/// the schema, or all columns in sorted order when no projection was given.
fn projected_columns<'a>(schema: &'a TableSchema, fields: &'a [String]) -> Result<Vec<&'a str>> {
    if fields.is_empty() {
        return Ok(schema.sorted_column_names());
    }

    let mut columns = Vec::with_capacity(fields.len());
    for field in fields {
        if !schema.has_column(field) {
            return Err(GateError::unknown_column(&schema.name, field));
        }
        columns.push(field.as_str());
    }
    Ok(columns)
}

/// Compiles the filter conjunction, validating every field.
fn compile_filters(
    schema: &TableSchema,
    filters: &[Filter],
) -> Result<(String, Vec<ScalarValue>)> {
    let mut clauses: Vec<String> = Vec::with_capacity(filters.len());
    let mut bound: Vec<ScalarValue> = Vec::new();

    for filter in filters {
        if !schema.has_column(&filter.field) {
            return Err(GateError::unknown_column(&schema.name, &filter.field));
        }
        let column = quote_ident(&filter.field);

        match (&filter.operator, &filter.operand) {
            (FilterOperator::In, FilterOperand::List(values)) => {
                if values.is_empty() {
                    // IN over an empty set matches nothing.
                    clauses.push("1 = 0".to_string());
                } else {
                    let placeholders = vec!["?"; values.len()].join(", ");
                    clauses.push(format!("{column} IN ({placeholders})"));
                    bound.extend(values.iter().cloned());
                }
            }
            (FilterOperator::NotIn, FilterOperand::List(values)) => {
                if values.is_empty() {
                    clauses.push("1 = 1".to_string());
                } else {
                    let placeholders = vec!["?"; values.len()].join(", ");
                    clauses.push(format!("{column} NOT IN ({placeholders})"));
                    bound.extend(values.iter().cloned());
                }
            }
            (operator, FilterOperand::Scalar(value)) => {
                let comparator = match operator {
                    FilterOperator::Eq => "=",
                    FilterOperator::Ne => "<>",
                    FilterOperator::Gt => ">",
                    FilterOperator::Gte => ">=",
                    FilterOperator::Lt => "<",
                    FilterOperator::Lte => "<=",
                    FilterOperator::Like => "LIKE",
                    FilterOperator::NotLike => "NOT LIKE",
                    FilterOperator::In | FilterOperator::NotIn => {
                        return Err(GateError::invalid_filter(
                            &filter.field,
                            "list operator requires a list operand",
                        ));
                    }
                };
                clauses.push(format!("{column} {comparator} ?"));
                bound.push(value.clone());
            }
            (_, FilterOperand::List(_)) => {
                return Err(GateError::invalid_filter(
                    &filter.field,
                    "scalar operator cannot take a list operand",
                ));
            }
        }
    }

    Ok((clauses.join(" AND "), bound))
}

/// Payload keys in sorted order, so a given payload always compiles to the
/// same statement.
fn sorted_keys(payload: &Map<String, Value>) -> Vec<&str> {
    let mut keys: Vec<&str> = payload.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}

fn join_idents(names: &[&str]) -> String {
    names
        .iter()
        .map(|name| quote_ident(name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Backtick-quotes an identifier taken from the schema.
fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AbstractType, ColumnInfo, TableSchema};
    use crate::query::filter::parse_query;
    use std::collections::HashMap;

    fn column(name: &str, abstract_type: AbstractType, pk: bool, auto: bool) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            native_type: "int".to_string(),
            abstract_type,
            nullable: false,
            is_primary_key: pk,
            is_auto_increment: auto,
            max_length: None,
        }
    }

    fn users_schema() -> TableSchema {
        let mut columns = HashMap::new();
        columns.insert("id".to_string(), column("id", AbstractType::Integer, true, true));
        columns.insert("email".to_string(), column("email", AbstractType::Text, false, false));
        columns.insert("age".to_string(), column("age", AbstractType::Integer, false, false));
        columns.insert(
            "created_at".to_string(),
            column("created_at", AbstractType::Temporal, false, false),
        );
        columns.insert("active".to_string(), column("active", AbstractType::Boolean, false, false));
        TableSchema {
            name: "users".to_string(),
            columns,
            primary_key: Some("id".to_string()),
            relationships: Vec::new(),
        }
    }

    fn notes_schema() -> TableSchema {
        let mut columns = HashMap::new();
        columns.insert("body".to_string(), column("body", AbstractType::Text, false, false));
        TableSchema {
            name: "notes".to_string(),
            columns,
            primary_key: None,
            relationships: Vec::new(),
        }
    }

    fn builder() -> QueryBuilder {
        let cache = SchemaCache::new();
        let mut tables = HashMap::new();
        tables.insert("users".to_string(), users_schema());
        tables.insert("notes".to_string(), notes_schema());
        cache.replace(tables);
        QueryBuilder::new(Arc::new(cache))
    }

    fn payload(json: serde_json::Value) -> Map<String, Value> {
        match json {
            Value::Object(map) => map,
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn test_select_with_filter_sort_and_limit() {
        let builder = builder();
        let params = parse_query("age=gt.18&order=created_at.desc&limit=2").unwrap();
        let stmt = builder.build_select("users", &params).unwrap();

        assert_eq!(
            stmt.sql,
            "SELECT `active`, `age`, `created_at`, `email`, `id` FROM `users` \
             WHERE `age` > ? ORDER BY `created_at` DESC LIMIT 2"
        );
        assert_eq!(stmt.params, vec![ScalarValue::Int(18)]);
    }

    #[test]
    fn test_select_with_projection() {
        let builder = builder();
        let params = parse_query("email=like.%25@example.com&fields=id,email").unwrap();
        let stmt = builder.build_select("users", &params).unwrap();

        assert_eq!(
            stmt.sql,
            "SELECT `id`, `email` FROM `users` WHERE `email` LIKE ? LIMIT 50"
        );
        assert_eq!(
            stmt.params,
            vec![ScalarValue::Text("%@example.com".to_string())]
        );
    }

    #[test]
    fn test_select_offset_appended_when_positive() {
        let builder = builder();
        let params = parse_query("limit=10&page=3").unwrap();
        let stmt = builder.build_select("users", &params).unwrap();
        assert!(stmt.sql.ends_with("LIMIT 10 OFFSET 20"));
    }

    #[test]
    fn test_select_rejects_unknown_table() {
        let builder = builder();
        let params = QueryParams::default();
        let err = builder.build_select("missing", &params).unwrap_err();
        assert!(matches!(err, GateError::TableNotFound { .. }));
    }

    #[test]
    fn test_select_rejects_unknown_filter_field() {
        let builder = builder();
        let params = parse_query("payload=eq.1%3B%20DROP%20TABLE%20users").unwrap();
        let err = builder.build_select("users", &params).unwrap_err();
        assert!(matches!(err, GateError::UnknownColumn { .. }));
    }

    #[test]
    fn test_select_rejects_unknown_sort_field() {
        let builder = builder();
        let params = parse_query("order=evil.desc").unwrap();
        let err = builder.build_select("users", &params).unwrap_err();
        assert!(matches!(err, GateError::UnknownColumn { ref column, .. } if column == "evil"));
    }

    #[test]
    fn test_select_rejects_unknown_projection_field() {
        let builder = builder();
        let params = parse_query("fields=id,secret").unwrap();
        let err = builder.build_select("users", &params).unwrap_err();
        assert!(matches!(err, GateError::UnknownColumn { ref column, .. } if column == "secret"));
    }

    #[test]
    fn test_no_user_text_leaks_into_sql() {
        let builder = builder();
        let params = parse_query("email=eq.'; DROP TABLE users; --").unwrap();
        let stmt = builder.build_select("users", &params).unwrap();
        assert!(!stmt.sql.contains("DROP"));
        assert!(stmt.sql.contains("`email` = ?"));
    }

    #[test]
    fn test_in_operator_expands_placeholders() {
        let builder = builder();
        let params = parse_query("email=in.a,b,c").unwrap();
        let stmt = builder.build_select("users", &params).unwrap();
        assert!(stmt.sql.contains("`email` IN (?, ?, ?)"));
        assert_eq!(stmt.params.len(), 3);
    }

    #[test]
    fn test_empty_list_operands_become_constant_predicates() {
        let builder = builder();

        let mut params = QueryParams::default();
        params.filters.push(Filter {
            field: "email".to_string(),
            operator: FilterOperator::In,
            operand: FilterOperand::List(Vec::new()),
        });
        let stmt = builder.build_select("users", &params).unwrap();
        assert!(stmt.sql.contains("WHERE 1 = 0"));
        assert!(stmt.params.is_empty());

        params.filters[0].operator = FilterOperator::NotIn;
        let stmt = builder.build_select("users", &params).unwrap();
        assert!(stmt.sql.contains("WHERE 1 = 1"));
    }

    #[test]
    fn test_select_by_id() {
        let builder = builder();
        let stmt = builder
            .build_select_by_id("users", &ScalarValue::Int(42), &[])
            .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT `active`, `age`, `created_at`, `email`, `id` FROM `users` \
             WHERE `id` = ? LIMIT 1"
        );
        assert_eq!(stmt.params, vec![ScalarValue::Int(42)]);
    }

    #[test]
    fn test_select_by_id_with_fields() {
        let builder = builder();
        let fields = vec!["id".to_string(), "email".to_string()];
        let stmt = builder
            .build_select_by_id("users", &ScalarValue::Int(7), &fields)
            .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT `id`, `email` FROM `users` WHERE `id` = ? LIMIT 1"
        );
    }

    #[test]
    fn test_select_by_id_requires_primary_key() {
        let builder = builder();
        let err = builder
            .build_select_by_id("notes", &ScalarValue::Int(1), &[])
            .unwrap_err();
        assert!(matches!(err, GateError::NoPrimaryKey { .. }));
    }

    #[test]
    fn test_count_ignores_sorting_and_pagination() {
        let builder = builder();
        let params = parse_query("age=gte.21&order=created_at.desc&limit=5&offset=10").unwrap();
        let stmt = builder.build_count("users", &params).unwrap();
        assert_eq!(stmt.sql, "SELECT COUNT(*) FROM `users` WHERE `age` >= ?");
        assert_eq!(stmt.params, vec![ScalarValue::Int(21)]);
    }

    #[test]
    fn test_insert_drops_auto_increment() {
        let builder = builder();
        let body = payload(serde_json::json!({"id": 99, "email": "a@b", "age": 30}));
        let stmt = builder.build_insert("users", &body).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO `users` (`age`, `email`) VALUES (?, ?)"
        );
        assert_eq!(
            stmt.params,
            vec![ScalarValue::Int(30), ScalarValue::Text("a@b".to_string())]
        );
    }

    #[test]
    fn test_insert_rejects_unknown_column() {
        let builder = builder();
        let body = payload(serde_json::json!({"email": "a@b", "bogus": 1}));
        let err = builder.build_insert("users", &body).unwrap_err();
        assert!(matches!(err, GateError::UnknownColumn { ref column, .. } if column == "bogus"));
    }

    #[test]
    fn test_insert_with_only_auto_increment_fails() {
        let builder = builder();
        let body = payload(serde_json::json!({"id": 5}));
        let err = builder.build_insert("users", &body).unwrap_err();
        assert!(matches!(err, GateError::NoUpdatableColumns { .. }));
    }

    #[test]
    fn test_update_drops_key_columns() {
        let builder = builder();
        let body = payload(serde_json::json!({"id": 8, "email": "x@y"}));
        let stmt = builder
            .build_update("users", &ScalarValue::Int(7), &body)
            .unwrap();
        assert_eq!(stmt.sql, "UPDATE `users` SET `email` = ? WHERE `id` = ?");
        assert_eq!(
            stmt.params,
            vec![ScalarValue::Text("x@y".to_string()), ScalarValue::Int(7)]
        );
    }

    #[test]
    fn test_update_with_only_key_columns_fails() {
        let builder = builder();
        let body = payload(serde_json::json!({"id": 8}));
        let err = builder
            .build_update("users", &ScalarValue::Int(7), &body)
            .unwrap_err();
        assert!(matches!(err, GateError::NoUpdatableColumns { .. }));
    }

    #[test]
    fn test_update_requires_primary_key() {
        let builder = builder();
        let body = payload(serde_json::json!({"body": "hi"}));
        let err = builder
            .build_update("notes", &ScalarValue::Int(1), &body)
            .unwrap_err();
        assert!(matches!(err, GateError::NoPrimaryKey { .. }));
    }

    #[test]
    fn test_delete() {
        let builder = builder();
        let stmt = builder
            .build_delete("users", &ScalarValue::Int(3))
            .unwrap();
        assert_eq!(stmt.sql, "DELETE FROM `users` WHERE `id` = ?");
        assert_eq!(stmt.params, vec![ScalarValue::Int(3)]);
    }

    #[test]
    fn test_delete_requires_primary_key() {
        let builder = builder();
        let err = builder
            .build_delete("notes", &ScalarValue::Int(3))
            .unwrap_err();
        assert!(matches!(err, GateError::NoPrimaryKey { .. }));
    }

    #[test]
    fn test_same_payload_compiles_identically() {
        let builder = builder();
        let body = payload(serde_json::json!({"email": "a@b", "age": 1, "active": true}));
        let first = builder.build_insert("users", &body).unwrap();
        let second = builder.build_insert("users", &body).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_quote_ident_escapes_backticks() {
        assert_eq!(quote_ident("plain"), "`plain`");
        assert_eq!(quote_ident("odd`name"), "`odd``name`");
    }
}
