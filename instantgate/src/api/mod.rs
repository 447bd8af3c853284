//! HTTP surface: shared state, router and middleware stack.

pub mod error;
pub mod handlers;
pub mod middleware;

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderName;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use instantgate_core::{AccessControl, QueryBuilder, SchemaCache};
use serde_json::json;
use sqlx::MySqlPool;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::security::JwtManager;

const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: MySqlPool,
    pub schema: Arc<SchemaCache>,
    pub builder: Arc<QueryBuilder>,
    pub access: Arc<AccessControl>,
    pub jwt: Arc<JwtManager>,
    pub cache: Option<Arc<ResponseCache>>,
    pub require_auth: bool,
}

impl AppState {
    pub fn new(
        pool: MySqlPool,
        schema: Arc<SchemaCache>,
        config: &Config,
        cache: Option<Arc<ResponseCache>>,
    ) -> Self {
        Self {
            pool,
            builder: Arc::new(QueryBuilder::new(Arc::clone(&schema))),
            schema,
            access: Arc::new(AccessControl::new(
                config.security.enabled,
                &config.security.whitelist,
                &config.security.blacklist,
            )),
            jwt: Arc::new(JwtManager::new(&config.jwt)),
            cache,
            require_auth: config.security.require_auth,
        }
    }
}

/// Builds the full router with its middleware stack.
pub fn router(state: AppState, config: &Config) -> Router {
    let crud = Router::new()
        .route(
            "/{table}",
            get(handlers::records::list).post(handlers::records::create),
        )
        .route(
            "/{table}/{id}",
            get(handlers::records::read)
                .patch(handlers::records::update)
                .delete(handlers::records::remove),
        );

    let api = Router::new()
        .route("/schema", get(handlers::schema::list_tables))
        .route("/schema/{table}", get(handlers::schema::table_schema))
        .nest("/api", crud)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authenticate,
        ));

    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin)
        .expose_headers([
            HeaderName::from_static("x-total-count"),
            HeaderName::from_static("x-limit"),
            HeaderName::from_static("x-offset"),
            X_REQUEST_ID,
        ]);

    Router::new()
        .route("/", get(handlers::service_info))
        .route("/health", get(handlers::health::check))
        .nest("/api", api)
        // Layers run outermost-last: the request id is assigned before
        // anything else sees the request, the panic guard and timeout sit
        // closest to the handlers.
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout,
        )))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
        .with_state(state)
}

/// Converts an escaped panic into the standard 500 envelope; the payload is
/// logged once and never surfaced to the client.
fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> axum::response::Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "unknown panic payload".to_string()
    };
    tracing::error!(panic = %detail, "request handler panicked");

    (
        axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "Internal Server Error",
            "message": "An internal error occurred",
            "code": 500,
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::mysql::MySqlPoolOptions;

    fn test_state() -> AppState {
        let pool = MySqlPoolOptions::new()
            .connect_lazy("mysql://localhost:3306/test")
            .expect("lazy pool");
        AppState::new(
            pool,
            Arc::new(SchemaCache::new()),
            &Config::default(),
            None,
        )
    }

    #[tokio::test]
    async fn test_router_builds() {
        let state = test_state();
        let _router = router(state, &Config::default());
    }

    #[tokio::test]
    async fn test_state_reflects_security_config() {
        let mut config = Config::default();
        config.security.require_auth = true;
        config.security.blacklist = vec!["secrets".to_string()];

        let pool = MySqlPoolOptions::new()
            .connect_lazy("mysql://localhost:3306/test")
            .expect("lazy pool");
        let state = AppState::new(pool, Arc::new(SchemaCache::new()), &config, None);

        assert!(state.require_auth);
        assert!(!state.access.is_table_allowed("secrets"));
        assert!(state.access.is_table_allowed("users"));
    }
}
