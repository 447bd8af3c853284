//! Schema cache and the introspector that fills it.
//!
//! The cache is a process-local snapshot of introspected metadata keyed by
//! table name. Reads take a shared lock and clone out `Arc` handles, so a
//! request keeps working against the snapshot it observed even while a
//! reload publishes a replacement. Writers only ever swap the whole map;
//! partially-built schemas are never visible.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use crate::adapters::Dialect;
use crate::error::Result;
use crate::models::TableSchema;

/// Concurrent snapshot map of table name to schema.
#[derive(Default)]
pub struct SchemaCache {
    tables: RwLock<HashMap<String, Arc<TableSchema>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the schema for a table, if known. O(1).
    pub fn get(&self, table: &str) -> Option<Arc<TableSchema>> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(table)
            .cloned()
    }

    /// All known table names; order unspecified.
    pub fn tables(&self) -> Vec<String> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn table_exists(&self, table: &str) -> bool {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(table)
    }

    pub fn len(&self) -> usize {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Atomically replaces the backing map with a new snapshot.
    pub fn replace(&self, tables: HashMap<String, TableSchema>) {
        let snapshot: HashMap<String, Arc<TableSchema>> = tables
            .into_iter()
            .map(|(name, schema)| (name, Arc::new(schema)))
            .collect();
        *self
            .tables
            .write()
            .unwrap_or_else(PoisonError::into_inner) = snapshot;
    }
}

/// Drives a [`Dialect`] to populate a [`SchemaCache`].
///
/// `load_schema` builds every `TableSchema` completely before committing
/// the whole mapping; any catalog error aborts the load and leaves the
/// previously published snapshot in place.
pub struct Introspector {
    dialect: Arc<dyn Dialect>,
    cache: Arc<SchemaCache>,
}

impl Introspector {
    pub fn new(dialect: Arc<dyn Dialect>) -> Self {
        Self {
            dialect,
            cache: Arc::new(SchemaCache::new()),
        }
    }

    /// Handle to the cache this introspector publishes into.
    pub fn cache(&self) -> Arc<SchemaCache> {
        Arc::clone(&self.cache)
    }

    /// Loads the full catalog and publishes it as a new snapshot.
    pub async fn load_schema(&self) -> Result<()> {
        let started = Instant::now();

        let table_names = self.dialect.list_tables().await?;
        let mut tables = HashMap::with_capacity(table_names.len());

        for name in &table_names {
            let schema = self.load_table_schema(name).await?;
            tables.insert(name.clone(), schema);
        }

        self.cache.replace(tables);

        tracing::info!(
            tables = table_names.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "schema cache loaded"
        );
        Ok(())
    }

    /// Rebuilds and atomically replaces the cache.
    pub async fn reload_schema(&self) -> Result<()> {
        self.load_schema().await
    }

    async fn load_table_schema(&self, table: &str) -> Result<TableSchema> {
        let columns = self.dialect.describe_columns(table).await?;
        let primary_key = self.dialect.primary_key(table).await?;
        let relationships = self.dialect.relationships(table).await?;

        let column_map = columns
            .into_iter()
            .map(|column| (column.name.clone(), column))
            .collect();

        tracing::debug!(table, "table schema collected");

        Ok(TableSchema {
            name: table.to_string(),
            columns: column_map,
            primary_key,
            relationships,
        })
    }
}
