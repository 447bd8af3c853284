//! Optional Redis response cache for list queries.
//!
//! Keys are `query:{table}:{hash16}` where `hash16` is the first 16 hex
//! characters of a SHA-256 digest over the canonical JSON of the parsed
//! query parameters. Successful writes invalidate the table's key prefix.
//! Cache failures are logged and never fail the request.

use instantgate_core::query::QueryParams;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::config::RedisConfig;

const CONNECT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ResponseCache {
    conn: ConnectionManager,
    ttl_secs: u64,
}

impl ResponseCache {
    /// Connects to Redis, failing fast if the server does not answer within
    /// the probe timeout. Callers downgrade a connect failure to "no cache".
    pub async fn connect(config: &RedisConfig) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(config.url())?;
        let conn = tokio::time::timeout(CONNECT_PROBE_TIMEOUT, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                redis::RedisError::from((
                    redis::ErrorKind::IoError,
                    "timed out connecting to Redis",
                ))
            })??;

        Ok(Self {
            conn,
            ttl_secs: if config.cache_ttl == 0 {
                300
            } else {
                config.cache_ttl
            },
        })
    }

    /// Cache key for a list query over one table.
    pub fn query_key(table: &str, params: &QueryParams) -> String {
        let canonical = serde_json::to_vec(params).unwrap_or_default();
        let digest = Sha256::digest(&canonical);
        let hash16: String = digest
            .iter()
            .take(8)
            .map(|byte| format!("{byte:02x}"))
            .collect();
        format!("query:{table}:{hash16}")
    }

    /// Fetches and decodes a cached value; misses and errors both yield `None`.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.conn.clone();
        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(payload)) => serde_json::from_str(&payload).ok(),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(key, error = %err, "response cache read failed");
                None
            }
        }
    }

    /// Stores a value under the configured TTL.
    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T) {
        let Ok(payload) = serde_json::to_string(value) else {
            return;
        };
        let mut conn = self.conn.clone();
        if let Err(err) = conn.set_ex::<_, _, ()>(key, payload, self.ttl_secs).await {
            tracing::warn!(key, error = %err, "response cache write failed");
        }
    }

    /// Drops every cached query for a table after a successful write.
    pub async fn invalidate_table(&self, table: &str) {
        let pattern = format!("query:{table}:*");
        let mut conn = self.conn.clone();

        let keys: Vec<String> = {
            let mut iter = match conn.scan_match::<_, String>(&pattern).await {
                Ok(iter) => iter,
                Err(err) => {
                    tracing::warn!(table, error = %err, "response cache scan failed");
                    return;
                }
            };
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        if keys.is_empty() {
            return;
        }
        if let Err(err) = conn.del::<_, ()>(keys).await {
            tracing::warn!(table, error = %err, "response cache invalidation failed");
        }
    }
}
