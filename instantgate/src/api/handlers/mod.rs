//! Request handlers.

pub mod health;
pub mod records;
pub mod schema;

use axum::Json;
use serde_json::{json, Value};

/// `GET /` — service banner.
pub async fn service_info() -> Json<Value> {
    Json(json!({
        "name": "InstantGate API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Instant REST API for any relational database",
    }))
}
