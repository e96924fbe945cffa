//! Notification rule CRUD, audit log and on-demand evaluation endpoints.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use attackwatch_core::{NotificationRule, RuleInput};
use attackwatch_rules::audit_log::{AuditEntry, AuditFilter, LogLevel};
use attackwatch_rules::EvaluationSummary;

use crate::state::AppState;

use super::{
    aborted_pass, bad_request, check_limit, evaluation_error, not_found, store_error, ApiResult,
};

const DEFAULT_LOG_LIMIT: i64 = 100;

fn validated(body: Result<Json<RuleInput>, JsonRejection>) -> ApiResult<RuleInput> {
    let Json(input) = body.map_err(|e| bad_request(e.body_text()))?;
    let input = input.normalized();
    input.validate().map_err(|e| bad_request(e.to_string()))?;
    Ok(input)
}

#[utoipa::path(
    get,
    path = "/api/rules",
    tag = "Rules",
    responses(
        (status = 200, description = "All rules, newest first", body = Vec<Object>)
    )
)]
pub async fn list_rules(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<NotificationRule>>> {
    state
        .stores
        .rules
        .list_all()
        .await
        .map(Json)
        .map_err(store_error)
}

#[utoipa::path(
    post,
    path = "/api/rules",
    tag = "Rules",
    request_body(content = Object, description = "Rule definition"),
    responses(
        (status = 201, description = "Rule created", body = Object),
        (status = 400, description = "Invalid rule", body = super::ErrorResponse)
    )
)]
pub async fn create_rule(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RuleInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<NotificationRule>)> {
    let input = validated(body)?;
    let rule = state
        .stores
        .rules
        .create(NotificationRule::from_input(input, Utc::now()))
        .await
        .map_err(store_error)?;

    info!(rule_id = %rule.id, rule = %rule.name, "rule created");
    Ok((StatusCode::CREATED, Json(rule)))
}

#[utoipa::path(
    get,
    path = "/api/rules/{id}",
    tag = "Rules",
    params(("id" = String, Path, description = "Rule ID")),
    responses(
        (status = 200, description = "Rule", body = Object),
        (status = 404, description = "Rule not found", body = super::ErrorResponse)
    )
)]
pub async fn get_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<NotificationRule>> {
    state
        .stores
        .rules
        .get(id)
        .await
        .map_err(store_error)?
        .map(Json)
        .ok_or_else(|| not_found("Rule", id))
}

/// Replace a rule's configuration. Cooldown state is kept.
#[utoipa::path(
    put,
    path = "/api/rules/{id}",
    tag = "Rules",
    params(("id" = String, Path, description = "Rule ID")),
    request_body(content = Object, description = "Rule definition"),
    responses(
        (status = 200, description = "Rule updated", body = Object),
        (status = 400, description = "Invalid rule", body = super::ErrorResponse),
        (status = 404, description = "Rule not found", body = super::ErrorResponse)
    )
)]
pub async fn update_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    body: Result<Json<RuleInput>, JsonRejection>,
) -> ApiResult<Json<NotificationRule>> {
    let input = validated(body)?;
    let rule = state
        .stores
        .rules
        .update(id, input)
        .await
        .map_err(store_error)?
        .ok_or_else(|| not_found("Rule", id))?;

    info!(rule_id = %rule.id, rule = %rule.name, "rule updated");
    Ok(Json(rule))
}

#[utoipa::path(
    delete,
    path = "/api/rules/{id}",
    tag = "Rules",
    params(("id" = String, Path, description = "Rule ID")),
    responses(
        (status = 204, description = "Rule deleted"),
        (status = 404, description = "Rule not found", body = super::ErrorResponse)
    )
)]
pub async fn delete_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !state.stores.rules.delete(id).await.map_err(store_error)? {
        return Err(not_found("Rule", id));
    }
    state.audit_log.forget(id);
    info!(rule_id = %id, "rule deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RuleLogParams {
    /// Minimum level: debug, info, warning or error.
    #[param(value_type = Option<String>)]
    pub level: Option<LogLevel>,
    /// Event tag, e.g. `notified` or `claim_released`.
    pub event: Option<String>,
    /// Maximum entries (default 100, 1..=1000).
    pub limit: Option<i64>,
    /// RFC 3339 lower bound.
    #[param(value_type = Option<String>)]
    pub since: Option<DateTime<Utc>>,
}

/// Evaluation audit entries for one rule, newest first.
#[utoipa::path(
    get,
    path = "/api/rules/{id}/log",
    tag = "Rules",
    params(("id" = String, Path, description = "Rule ID"), RuleLogParams),
    responses(
        (status = 200, description = "Audit entries", body = Vec<Object>),
        (status = 404, description = "Rule not found", body = super::ErrorResponse)
    )
)]
pub async fn rule_log(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    params: Result<Query<RuleLogParams>, QueryRejection>,
) -> ApiResult<Json<Vec<AuditEntry>>> {
    let Query(params) = params.map_err(|e| bad_request(e.body_text()))?;
    let filter = AuditFilter {
        min_level: params.level.unwrap_or(LogLevel::Debug),
        event: params.event,
        since: params.since,
        limit: check_limit(params.limit, DEFAULT_LOG_LIMIT)?,
    };
    if state.stores.rules.get(id).await.map_err(store_error)?.is_none() {
        return Err(not_found("Rule", id));
    }
    Ok(Json(state.audit_log.entries(id, &filter)))
}

/// Run one evaluation pass now, waiting for any pass already running.
#[utoipa::path(
    post,
    path = "/api/rules/evaluate",
    tag = "Rules",
    responses(
        (status = 200, description = "Pass summary", body = Object),
        (status = 503, description = "Store unavailable or pass aborted", body = super::ErrorResponse)
    )
)]
pub async fn evaluate_rules(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<EvaluationSummary>> {
    let summary = state
        .runner
        .run_evaluation_pass(Utc::now())
        .await
        .map_err(evaluation_error)?;
    if summary.aborted {
        return Err(aborted_pass(&summary));
    }
    Ok(Json(summary))
}
