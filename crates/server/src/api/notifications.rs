//! Notification listing endpoint.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use attackwatch_core::Notification;

use crate::state::AppState;

use super::{bad_request, check_limit, store_error, ApiResult};

const DEFAULT_LIMIT: i64 = 100;

/// Query parameters for GET /api/notifications.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationParams {
    /// Only notifications raised by this rule name.
    pub rule_name: Option<String>,
    /// Maximum entries (default 100, 1..=1000).
    pub limit: Option<i64>,
}

/// Raised notifications, newest first.
#[utoipa::path(
    get,
    path = "/api/notifications",
    tag = "Notifications",
    params(NotificationParams),
    responses(
        (status = 200, description = "Notifications", body = Vec<Object>),
        (status = 400, description = "Limit out of range", body = super::ErrorResponse)
    )
)]
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    params: Result<Query<NotificationParams>, QueryRejection>,
) -> ApiResult<Json<Vec<Notification>>> {
    let Query(params) = params.map_err(|e| bad_request(e.body_text()))?;
    let limit = check_limit(params.limit, DEFAULT_LIMIT)?;
    let rule_name = params
        .rule_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    state
        .stores
        .notifications
        .list(rule_name, limit)
        .await
        .map(Json)
        .map_err(store_error)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use attackwatch_core::{AttackRef, DetailMap, DetailValue, Notification, MATCHED_COUNT_KEY};

    use crate::api::test_support::{request_json, test_app};

    #[tokio::test]
    async fn lists_newest_first_with_filter() {
        let (app, state) = test_app();
        let now = Utc::now();
        let mut details = DetailMap::new();
        details.insert(MATCHED_COUNT_KEY.into(), DetailValue::Integer(12));

        let older = Notification::new("a", AttackRef::Attack(Uuid::new_v4()), now - Duration::minutes(5), DetailMap::new());
        let newer = Notification::new("b", AttackRef::Volume, now, details);
        for n in [&older, &newer] {
            state.stores.notifications.insert(n).await.unwrap();
        }

        let (status, body) = request_json(&app, "GET", "/api/notifications", None).await;
        assert_eq!(status, StatusCode::OK);
        let items = body.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["rule_name"], "b");
        assert_eq!(items[0]["attack_id"], "threshold");
        assert_eq!(items[0]["details"]["matched_count"]["value"], 12);

        let (_, body) = request_json(&app, "GET", "/api/notifications?rule_name=a", None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["attack_id"], older.attack_id.to_string());

        let (status, _) = request_json(&app, "GET", "/api/notifications?limit=0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
