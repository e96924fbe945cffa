//! Domain-focused API endpoint modules.
//!
//! Each sub-module owns a single responsibility area.
//! Shared error types and helpers live here in mod.rs.

pub mod attacks;
pub mod doc;
pub mod health;
pub mod notifications;
pub mod rules;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use attackwatch_rules::{EvaluationError, EvaluationSummary, StoreError};

// ── Shared types ─────────────────────────────────────────────────

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    /// Set when an evaluation pass stopped early; work done before the stop is kept.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications_created: Option<usize>,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);
pub(crate) type ApiResult<T> = Result<T, ApiError>;

/// Largest page or limit accepted by listing endpoints.
pub(crate) const MAX_LIMIT: i64 = 1_000;

// ── Helpers ──────────────────────────────────────────────────────

fn error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: msg.into(),
            notifications_created: None,
        }),
    )
}

pub(crate) fn bad_request(msg: impl Into<String>) -> ApiError {
    error(StatusCode::BAD_REQUEST, msg)
}

pub(crate) fn not_found(resource: &str, id: impl std::fmt::Display) -> ApiError {
    error(StatusCode::NOT_FOUND, format!("{} not found: {}", resource, id))
}

pub(crate) fn internal_error(e: impl std::fmt::Display) -> ApiError {
    error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// Store outages map to 503; corrupt data is a server bug.
pub(crate) fn store_error(e: StoreError) -> ApiError {
    match e {
        StoreError::Unavailable(_) | StoreError::Timeout { .. } => {
            error(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
        StoreError::InvalidData(_) => internal_error(e),
    }
}

pub(crate) fn evaluation_error(e: EvaluationError) -> ApiError {
    match e {
        EvaluationError::StoreUnavailable(inner) => store_error(inner),
        EvaluationError::PassInProgress => error(StatusCode::CONFLICT, e.to_string()),
    }
}

/// 503 for a pass cut short by shutdown, carrying what it already created.
pub(crate) fn aborted_pass(summary: &EvaluationSummary) -> ApiError {
    let (status, Json(mut body)) = error(
        StatusCode::SERVICE_UNAVAILABLE,
        "evaluation aborted, server shutting down",
    );
    body.notifications_created = Some(summary.notifications_created);
    (status, Json(body))
}

/// Resolve an optional `limit` parameter against a default and the 1..=1000 range.
pub(crate) fn check_limit(limit: Option<i64>, default: i64) -> ApiResult<usize> {
    let limit = limit.unwrap_or(default);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(bad_request(format!(
            "limit must be between 1 and {}, got {}",
            MAX_LIMIT, limit
        )));
    }
    Ok(limit as usize)
}
