//! End-to-end pipeline tests: query-string parsing through SQL compilation
//! against a hand-built schema cache. No live database required.

use std::collections::HashMap;
use std::sync::Arc;

use instantgate_core::{
    parse_query, AbstractType, AccessControl, ColumnInfo, QueryBuilder, ScalarValue, SchemaCache,
    TableSchema,
};

fn column(name: &str, native: &str, pk: bool, auto: bool) -> ColumnInfo {
    ColumnInfo {
        name: name.to_string(),
        native_type: native.to_string(),
        abstract_type: instantgate_core::typemap::map_native_type(native),
        nullable: !pk,
        is_primary_key: pk,
        is_auto_increment: auto,
        max_length: if native.starts_with("varchar") {
            Some(255)
        } else {
            None
        },
    }
}

/// users(id PK auto_inc, email varchar(255), age int, created_at datetime, active bool)
fn users_table() -> TableSchema {
    let mut columns = HashMap::new();
    columns.insert("id".to_string(), column("id", "int", true, true));
    columns.insert(
        "email".to_string(),
        column("email", "varchar(255)", false, false),
    );
    columns.insert("age".to_string(), column("age", "int", false, false));
    columns.insert(
        "created_at".to_string(),
        column("created_at", "datetime", false, false),
    );
    columns.insert(
        "active".to_string(),
        column("active", "tinyint(1)", false, false),
    );
    TableSchema {
        name: "users".to_string(),
        columns,
        primary_key: Some("id".to_string()),
        relationships: Vec::new(),
    }
}

fn pipeline() -> QueryBuilder {
    let cache = SchemaCache::new();
    let mut tables = HashMap::new();
    tables.insert("users".to_string(), users_table());
    cache.replace(tables);
    QueryBuilder::new(Arc::new(cache))
}

#[test]
fn filtered_sorted_paged_list() {
    let builder = pipeline();
    let params = parse_query("age=gt.18&order=created_at.desc&limit=2").unwrap();

    let stmt = builder.build_select("users", &params).unwrap();
    assert_eq!(
        stmt.sql,
        "SELECT `active`, `age`, `created_at`, `email`, `id` FROM `users` \
         WHERE `age` > ? ORDER BY `created_at` DESC LIMIT 2"
    );
    assert_eq!(stmt.params, vec![ScalarValue::Int(18)]);
    assert_eq!(params.pagination.limit, 2);
    assert_eq!(params.pagination.offset, 0);
}

#[test]
fn projected_like_filter() {
    let builder = pipeline();
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
fn select_by_numeric_id() {
    let builder = pipeline();
    let stmt = builder
        .build_select_by_id("users", &ScalarValue::Int(42), &[])
        .unwrap();

    assert!(stmt.sql.starts_with("SELECT "));
    assert!(stmt.sql.ends_with("FROM `users` WHERE `id` = ? LIMIT 1"));
    assert_eq!(stmt.params, vec![ScalarValue::Int(42)]);
}

#[test]
fn insert_drops_auto_increment_id() {
    let builder = pipeline();
    let body = serde_json::json!({"id": 99, "email": "a@b", "age": 30});
    let serde_json::Value::Object(payload) = body else {
        unreachable!()
    };

    let stmt = builder.build_insert("users", &payload).unwrap();
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
fn update_drops_primary_key_from_set_clause() {
    let builder = pipeline();
    let body = serde_json::json!({"id": 8, "email": "x@y"});
    let serde_json::Value::Object(payload) = body else {
        unreachable!()
    };

    let stmt = builder
        .build_update("users", &ScalarValue::Int(7), &payload)
        .unwrap();
    assert_eq!(stmt.sql, "UPDATE `users` SET `email` = ? WHERE `id` = ?");
    assert_eq!(
        stmt.params,
        vec![ScalarValue::Text("x@y".to_string()), ScalarValue::Int(7)]
    );
}

#[test]
fn blacklisted_table_is_denied_before_compilation() {
    let access = AccessControl::new(true, &[], &["orders".to_string()]);
    assert!(!access.is_table_allowed("orders"));
    // The orchestrator checks access first; compilation is never reached for
    // a denied table, so there is nothing else to assert here.
}

#[test]
fn compiled_sql_contains_no_request_text() {
    let builder = pipeline();
    let hostile = "email=like.%27%29%3B%20DROP%20TABLE%20users%3B--&order=created_at.desc";
    let params = parse_query(hostile).unwrap();

    let stmt = builder.build_select("users", &params).unwrap();
    assert!(!stmt.sql.contains("DROP"));
    assert!(!stmt.sql.contains("--"));
    // The hostile text survives only as a bound parameter value.
    assert_eq!(
        stmt.params,
        vec![ScalarValue::Text("'); DROP TABLE users;--".to_string())]
    );
}

#[test]
fn identical_requests_compile_identically() {
    let builder = pipeline();
    let query = "age=gte.21&active=true&order=email&fields=email,age&limit=10&page=2";

    let first = builder
        .build_select("users", &parse_query(query).unwrap())
        .unwrap();
    let second = builder
        .build_select("users", &parse_query(query).unwrap())
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn count_shares_the_select_predicate() {
    let builder = pipeline();
    let params = parse_query("age=gt.18&order=created_at.desc&limit=2").unwrap();

    let select = builder.build_select("users", &params).unwrap();
    let count = builder.build_count("users", &params).unwrap();

    assert_eq!(count.sql, "SELECT COUNT(*) FROM `users` WHERE `age` > ?");
    assert_eq!(count.params, select.params);
}

#[test]
fn snapshot_survives_reload_mid_request() {
    let cache = Arc::new(SchemaCache::new());
    let mut tables = HashMap::new();
    tables.insert("users".to_string(), users_table());
    cache.replace(tables);

    // A request captures its snapshot at parse time.
    let snapshot = cache.get("users").unwrap();

    // A concurrent reload drops the table.
    cache.replace(HashMap::new());

    // The in-flight request still compiles against its snapshot...
    assert!(snapshot.has_column("email"));
    // ...while new requests observe the new catalog.
    let builder = QueryBuilder::new(Arc::clone(&cache));
    let err = builder
        .build_select("users", &parse_query("").unwrap())
        .unwrap_err();
    assert!(matches!(
        err,
        instantgate_core::GateError::TableNotFound { .. }
    ));
}
