//! Dynamic query pipeline for InstantGate.
//!
//! This crate turns a live MySQL-family catalog into a safely queryable
//! surface: the introspector snapshots table metadata into an immutable
//! schema cache, URL parameters parse into a typed query model, the builder
//! compiles that model into parameterized SQL validated against the cached
//! schema, and the materializer converts result rows into schema-independent
//! JSON objects.
//!
//! # Safety model
//! - Identifiers in emitted SQL come only from the schema cache, never from
//!   request input; every referenced field is validated before SQL exists.
//! - Values are always bound parameters; no user text is interpolated.
//! - Schema snapshots are published atomically, so in-flight requests see
//!   either the prior or the new catalog, never a partial one.

pub mod access;
pub mod adapters;
pub mod error;
pub mod models;
pub mod query;
pub mod rows;
pub mod schema;
pub mod typemap;

// Re-export commonly used types
pub use access::AccessControl;
pub use adapters::{ConnectionOptions, Dialect};
pub use error::{GateError, Result};
pub use models::{AbstractType, ColumnInfo, RelationshipInfo, TableSchema};
pub use query::{
    parse_query, BoundStatement, Filter, FilterOperand, FilterOperator, Pagination, QueryBuilder,
    QueryParams, ScalarValue, SortDirection, Sorting,
};
pub use rows::{RowObject, WriteOutcome};
pub use schema::{Introspector, SchemaCache};
