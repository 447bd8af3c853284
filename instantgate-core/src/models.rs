//! Core data models for introspected schema metadata.
//!
//! These types are the immutable products of catalog introspection. A
//! `TableSchema` is built completely before it is published to the schema
//! cache and is never mutated afterwards, so readers may hold references
//! across cache reloads.

use std::collections::HashMap;

use serde::Serialize;

/// Abstract classification of a native column type.
///
/// The query pipeline never interprets native type strings directly; every
/// column is classified once at introspection time and the rest of the
/// system works against this small set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AbstractType {
    Integer,
    Real,
    Text,
    Binary,
    Temporal,
    Boolean,
    Unknown,
}

impl std::fmt::Display for AbstractType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AbstractType::Integer => "integer",
            AbstractType::Real => "real",
            AbstractType::Text => "text",
            AbstractType::Binary => "binary",
            AbstractType::Temporal => "temporal",
            AbstractType::Boolean => "boolean",
            AbstractType::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

/// Column metadata as reported by the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Native type string as reported by the engine, e.g. `varchar(255)`.
    pub native_type: String,
    pub abstract_type: AbstractType,
    pub nullable: bool,
    pub is_primary_key: bool,
    pub is_auto_increment: bool,
    /// Maximum character length for string types, when the catalog reports one.
    pub max_length: Option<i64>,
}

/// Foreign-key relationship, informational only.
#[derive(Debug, Clone, Serialize)]
pub struct RelationshipInfo {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
    pub constraint_name: String,
}

/// Complete introspected description of one table.
#[derive(Debug, Clone, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: HashMap<String, ColumnInfo>,
    /// The single recognized primary-key column. Composite keys are reported
    /// as the first column by ordinal position.
    pub primary_key: Option<String>,
    pub relationships: Vec<RelationshipInfo>,
}

impl TableSchema {
    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.get(name)
    }

    /// Returns true if the table has a column with the given name.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// All column names in sorted order.
    ///
    /// The catalog does not guarantee a stable iteration order for the
    /// column map, so callers that emit SQL or serialize schema
    /// descriptions use this to keep output deterministic.
    pub fn sorted_column_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.columns.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
