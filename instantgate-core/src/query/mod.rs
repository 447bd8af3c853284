//! URL parameter parsing and SQL compilation.
//!
//! `filter` turns a raw query string into a typed [`QueryParams`] value;
//! `builder` compiles that value, validated against the schema cache, into a
//! parameterized statement.

pub mod builder;
pub mod filter;

pub use builder::{BoundStatement, QueryBuilder};
pub use filter::{
    parse_query, Filter, FilterOperand, FilterOperator, Pagination, QueryParams, ScalarValue,
    SortDirection, Sorting,
};
