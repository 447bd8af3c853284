//! Database dialect abstraction.
//!
//! A dialect encapsulates everything engine-specific about catalog
//! introspection: enumerating base tables, describing columns, identifying
//! the primary key and listing foreign-key relationships. The query builder
//! and materializer never talk to a dialect directly, so additional engines
//! can be added without touching them.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ColumnInfo, RelationshipInfo};

pub mod mysql;

/// Connection pool and timeout settings shared by dialect implementations.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Maximum open connections in the pool
    pub max_open_conns: u32,
    /// Idle connections kept warm
    pub max_idle_conns: u32,
    /// Maximum lifetime of a pooled connection
    pub conn_max_lifetime: std::time::Duration,
    /// Time allowed to acquire a connection from the pool
    pub connect_timeout: std::time::Duration,
    /// Server-side cap on statement execution time
    pub query_timeout: std::time::Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            max_open_conns: 25,
            max_idle_conns: 5,
            conn_max_lifetime: std::time::Duration::from_secs(300),
            connect_timeout: std::time::Duration::from_secs(10),
            query_timeout: std::time::Duration::from_secs(30),
        }
    }
}

impl ConnectionOptions {
    /// Validates pool settings.
    ///
    /// # Errors
    /// Returns a configuration error for values that would make the pool
    /// unusable or unsafe.
    pub fn validate(&self) -> Result<()> {
        if self.max_open_conns == 0 {
            return Err(crate::error::GateError::configuration(
                "max_open_conns must be greater than 0",
            ));
        }
        if self.max_open_conns > 100 {
            return Err(crate::error::GateError::configuration(
                "max_open_conns should not exceed 100",
            ));
        }
        if self.connect_timeout.is_zero() || self.query_timeout.is_zero() {
            return Err(crate::error::GateError::configuration(
                "timeouts must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Catalog capability set implemented per engine.
///
/// Object-safe so the introspector can hold a `Box<dyn Dialect>` or
/// `Arc<dyn Dialect>`.
#[async_trait]
pub trait Dialect: Send + Sync {
    /// Verifies connectivity with a trivial round trip.
    async fn ping(&self) -> Result<()>;

    /// Enumerates base tables in the configured database.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Describes the columns of one table, in ordinal order.
    async fn describe_columns(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// The single recognized primary-key column, first by ordinal when the
    /// catalog reports a composite key.
    async fn primary_key(&self, table: &str) -> Result<Option<String>>;

    /// Foreign-key relationships originating from the table.
    async fn relationships(&self, table: &str) -> Result<Vec<RelationshipInfo>>;
}
