// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! API server built on axum.
//!
//! Sets up routes, middleware, and shared state.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use ratelane_config::model::ServerConfig;
use ratelane_core::{Adapter, RatelaneError, RecordStore};
use ratelane_pipeline::{Dispatcher, ResultCache};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

/// State for the unauthenticated health and metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
    /// Adapters whose health is reported by `/health`.
    pub components: Vec<Arc<dyn Adapter>>,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct AppState {
    pub records: Arc<dyn RecordStore>,
    pub dispatcher: Arc<Dispatcher>,
    pub results: ResultCache,
    pub auth: AuthConfig,
    pub health: HealthState,
}

/// Build the full router.
///
/// `/health` and `/metrics` are public; everything else sits behind the
/// bearer-token middleware.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/message/create", post(handlers::create_message))
        .route("/message/read/{message_id}", get(handlers::read_message))
        .route("/batch/{batch_id}", get(handlers::get_batch))
        .route("/batch/{batch_id}/messages", get(handlers::batch_messages))
        .route("/batch/{batch_id}/results", get(handlers::batch_results))
        .route("/queue/create", post(handlers::create_queue))
        .route("/queue/{queue_id}", get(handlers::get_queue))
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind `host:port` and serve until `cancel` fires.
pub async fn start_server(
    config: &ServerConfig,
    state: AppState,
    cancel: CancellationToken,
) -> Result<(), RatelaneError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RatelaneError::Internal(format!("failed to bind API to {addr}: {e}")))?;

    tracing::info!("API server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| RatelaneError::Internal(format!("API server error: {e}")))?;

    tracing::info!("API server stopped");
    Ok(())
}
