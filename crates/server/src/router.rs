//! HTTP router construction.
//!
//! Assembles all Axum routes, middleware, and OpenAPI docs into a single `Router`.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::warn;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::api;
use crate::state::AppState;

fn cors_layer(origin: &str) -> CorsLayer {
    if origin == "*" {
        return CorsLayer::permissive();
    }
    match HeaderValue::from_str(origin) {
        Ok(value) => CorsLayer::permissive().allow_origin(value),
        Err(e) => {
            warn!(origin, error = %e, "invalid CORS origin, allowing any origin");
            CorsLayer::permissive()
        }
    }
}

/// Build the complete application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origin);

    Router::new()
        .route("/health", get(api::health::health))
        .route("/api/attacks", get(api::attacks::list_attacks))
        .route("/api/attacks/recent", get(api::attacks::recent_attacks))
        .route(
            "/api/attacks/visualization-data",
            get(api::attacks::visualization_data),
        )
        .route("/api/attacks/statistics", get(api::attacks::statistics))
        .route(
            "/api/rules",
            get(api::rules::list_rules).post(api::rules::create_rule),
        )
        // /evaluate MUST precede /{id} to avoid "evaluate" being captured
        .route("/api/rules/evaluate", post(api::rules::evaluate_rules))
        .route(
            "/api/rules/{id}",
            get(api::rules::get_rule)
                .put(api::rules::update_rule)
                .delete(api::rules::delete_rule),
        )
        .route("/api/rules/{id}/log", get(api::rules::rule_log))
        .route(
            "/api/notifications",
            get(api::notifications::list_notifications),
        )
        .layer(cors)
        .with_state(state)
        .merge(Scalar::with_url("/docs", api::doc::ApiDoc::openapi()))
}
