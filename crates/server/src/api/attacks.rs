//! Attack listing, recent feed, map data and statistics endpoints.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use attackwatch_core::{severity_in_range, AttackEvent, GeoLocation};
use attackwatch_rules::{AttackPredicate, AttackStatistics};

use crate::state::AppState;

use super::{bad_request, check_limit, store_error, ApiResult, MAX_LIMIT};

const DEFAULT_PAGE_SIZE: i64 = 20;
const DEFAULT_RECENT_LIMIT: i64 = 10;
const DEFAULT_MAP_LIMIT: i64 = 500;

// ── Listing ──────────────────────────────────────────────────────

/// Query parameters for GET /api/attacks.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttackListParams {
    pub attack_type: Option<String>,
    /// Matches source or destination country.
    pub country: Option<String>,
    pub min_severity: Option<i32>,
    pub max_severity: Option<i32>,
    /// Inclusive lower timestamp bound (RFC 3339).
    #[param(value_type = Option<String>)]
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper timestamp bound (RFC 3339).
    #[param(value_type = Option<String>)]
    pub end: Option<DateTime<Utc>>,
    /// 1-based page number (default 1).
    pub page: Option<i64>,
    /// Results per page (default 20, max 1000).
    pub page_size: Option<i64>,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl AttackListParams {
    fn predicate(&self) -> ApiResult<AttackPredicate> {
        for (field, value) in [
            ("min_severity", self.min_severity),
            ("max_severity", self.max_severity),
        ] {
            if let Some(v) = value {
                if !severity_in_range(v) {
                    return Err(bad_request(format!(
                        "{} must be between 1 and 10, got {}",
                        field, v
                    )));
                }
            }
        }
        if let (Some(min), Some(max)) = (self.min_severity, self.max_severity) {
            if min > max {
                return Err(bad_request("min_severity must not exceed max_severity"));
            }
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(bad_request("start must not be after end"));
            }
        }

        Ok(AttackPredicate {
            attack_type: non_blank(&self.attack_type),
            country: non_blank(&self.country),
            min_severity: self.min_severity,
            max_severity: self.max_severity,
            since: self.start,
            until: self.end,
        })
    }

    /// Validated `(page, page_size, offset)`.
    fn pagination(&self) -> ApiResult<(i64, i64, usize)> {
        let page = self.page.unwrap_or(1);
        if page < 1 {
            return Err(bad_request(format!("page must be at least 1, got {}", page)));
        }
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_LIMIT).contains(&page_size) {
            return Err(bad_request(format!(
                "page_size must be between 1 and {}, got {}",
                MAX_LIMIT, page_size
            )));
        }
        let offset = (page - 1)
            .checked_mul(page_size)
            .and_then(|o| usize::try_from(o).ok())
            .ok_or_else(|| bad_request("page is too large"))?;
        Ok((page, page_size, offset))
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AttackListResponse {
    pub total: usize,
    pub page: i64,
    pub page_size: i64,
    #[schema(value_type = Vec<Object>)]
    pub results: Vec<AttackEvent>,
}

/// Filtered, paginated attacks, newest first.
#[utoipa::path(
    get,
    path = "/api/attacks",
    tag = "Attacks",
    params(AttackListParams),
    responses(
        (status = 200, description = "One page of attacks", body = AttackListResponse),
        (status = 400, description = "Malformed filter or pagination", body = super::ErrorResponse),
        (status = 503, description = "Store unavailable", body = super::ErrorResponse)
    )
)]
pub async fn list_attacks(
    State(state): State<Arc<AppState>>,
    params: Result<Query<AttackListParams>, QueryRejection>,
) -> ApiResult<Json<AttackListResponse>> {
    let Query(params) = params.map_err(|e| bad_request(e.body_text()))?;
    let predicate = params.predicate()?;
    let (page, page_size, offset) = params.pagination()?;

    let result = state
        .stores
        .events
        .page(&predicate, offset, page_size as usize)
        .await
        .map_err(store_error)?;

    Ok(Json(AttackListResponse {
        total: result.total,
        page,
        page_size,
        results: result.items,
    }))
}

// ── Recent ───────────────────────────────────────────────────────

/// Query parameters for GET /api/attacks/recent.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecentParams {
    /// Number of attacks (default 10, 1..=1000).
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RecentAttacksResponse {
    pub count: usize,
    #[schema(value_type = Vec<Object>)]
    pub results: Vec<AttackEvent>,
}

#[utoipa::path(
    get,
    path = "/api/attacks/recent",
    tag = "Attacks",
    params(RecentParams),
    responses(
        (status = 200, description = "Most recent attacks", body = RecentAttacksResponse),
        (status = 400, description = "Limit out of range", body = super::ErrorResponse)
    )
)]
pub async fn recent_attacks(
    State(state): State<Arc<AppState>>,
    params: Result<Query<RecentParams>, QueryRejection>,
) -> ApiResult<Json<RecentAttacksResponse>> {
    let Query(params) = params.map_err(|e| bad_request(e.body_text()))?;
    let limit = check_limit(params.limit, DEFAULT_RECENT_LIMIT)?;

    let page = state
        .stores
        .events
        .page(&AttackPredicate::all(), 0, limit)
        .await
        .map_err(store_error)?;

    Ok(Json(RecentAttacksResponse {
        count: page.items.len(),
        results: page.items,
    }))
}

// ── Visualization ────────────────────────────────────────────────

/// Query parameters for GET /api/attacks/visualization-data.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VisualizationParams {
    /// `map` (default) or `globe`.
    pub view_type: Option<String>,
    /// Number of attacks to plot (default 500, 1..=1000).
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub features: Vec<Feature>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub geometry: PointGeometry,
    pub properties: FeatureProperties,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PointGeometry {
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// `[longitude, latitude]`.
    #[schema(value_type = Vec<f64>)]
    pub coordinates: [f64; 2],
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct FeatureProperties {
    /// `source` or `destination`.
    pub direction: &'static str,
    pub country: String,
    pub attack_type: String,
    pub severity: i32,
    #[schema(value_type = String)]
    pub timestamp: DateTime<Utc>,
    pub view_type: String,
}

fn point(
    attack: &AttackEvent,
    location: &GeoLocation,
    direction: &'static str,
    view_type: &str,
) -> Feature {
    Feature {
        kind: "Feature",
        geometry: PointGeometry {
            kind: "Point",
            coordinates: [location.longitude, location.latitude],
        },
        properties: FeatureProperties {
            direction,
            country: location.country.clone(),
            attack_type: attack.attack_type.clone(),
            severity: attack.severity,
            timestamp: attack.timestamp,
            view_type: view_type.to_string(),
        },
    }
}

/// GeoJSON points for the most recent attacks, two per attack.
#[utoipa::path(
    get,
    path = "/api/attacks/visualization-data",
    tag = "Attacks",
    params(VisualizationParams),
    responses(
        (status = 200, description = "GeoJSON feature collection", body = FeatureCollection),
        (status = 400, description = "Unknown view type or limit out of range", body = super::ErrorResponse)
    )
)]
pub async fn visualization_data(
    State(state): State<Arc<AppState>>,
    params: Result<Query<VisualizationParams>, QueryRejection>,
) -> ApiResult<Json<FeatureCollection>> {
    let Query(params) = params.map_err(|e| bad_request(e.body_text()))?;
    let view_type = params.view_type.as_deref().unwrap_or("map");
    if view_type != "map" && view_type != "globe" {
        return Err(bad_request(format!(
            "view_type must be 'map' or 'globe', got '{}'",
            view_type
        )));
    }
    let limit = check_limit(params.limit, DEFAULT_MAP_LIMIT)?;

    let page = state
        .stores
        .events
        .page(&AttackPredicate::all(), 0, limit)
        .await
        .map_err(store_error)?;

    let features = page
        .items
        .iter()
        .flat_map(|a| {
            [
                point(a, &a.source, "source", view_type),
                point(a, &a.destination, "destination", view_type),
            ]
        })
        .collect();

    Ok(Json(FeatureCollection {
        kind: "FeatureCollection",
        features,
    }))
}

// ── Statistics ───────────────────────────────────────────────────

#[utoipa::path(
    get,
    path = "/api/attacks/statistics",
    tag = "Attacks",
    responses(
        (status = 200, description = "Counts by country, attack type and severity", body = Object),
        (status = 503, description = "Store unavailable", body = super::ErrorResponse)
    )
)]
pub async fn statistics(State(state): State<Arc<AppState>>) -> ApiResult<Json<AttackStatistics>> {
    state
        .stores
        .events
        .statistics()
        .await
        .map(Json)
        .map_err(store_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use chrono::Duration;
    use uuid::Uuid;

    use attackwatch_core::DetailMap;

    use crate::api::test_support::{request_json, test_app};

    fn attack(kind: &str, severity: i32, src: &str, dst: &str, ts: DateTime<Utc>) -> AttackEvent {
        AttackEvent {
            id: Uuid::new_v4(),
            attack_type: kind.into(),
            severity,
            source: GeoLocation {
                latitude: 10.0,
                longitude: 20.0,
                country: src.into(),
            },
            destination: GeoLocation {
                latitude: -30.0,
                longitude: 40.0,
                country: dst.into(),
            },
            timestamp: ts,
            extra: DetailMap::new(),
        }
    }

    async fn app_with_attacks() -> axum::Router {
        let (app, state) = test_app();
        let now = Utc::now();
        let events = vec![
            attack("DDoS", 9, "USA", "France", now - Duration::hours(1)),
            attack("DDoS", 3, "Japan", "USA", now - Duration::hours(2)),
            attack("Malware", 7, "Brazil", "Chile", now - Duration::hours(3)),
        ];
        state.stores.events.insert_many(&events).await.unwrap();
        app
    }

    #[tokio::test]
    async fn list_filters_and_paginates() {
        let app = app_with_attacks().await;

        let (status, body) =
            request_json(&app, "GET", "/api/attacks?country=USA&page_size=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["page"], 1);
        assert_eq!(body["results"].as_array().unwrap().len(), 1);
        assert_eq!(body["results"][0]["severity"], 9);

        let (_, body) = request_json(
            &app,
            "GET",
            "/api/attacks?country=USA&page_size=1&page=2",
            None,
        )
        .await;
        assert_eq!(body["results"][0]["severity"], 3);

        let (_, body) =
            request_json(&app, "GET", "/api/attacks?attack_type=DDoS&min_severity=5", None).await;
        assert_eq!(body["total"], 1);
    }

    #[tokio::test]
    async fn list_rejects_malformed_parameters() {
        let app = app_with_attacks().await;
        for uri in [
            "/api/attacks?page=0",
            "/api/attacks?page_size=1001",
            "/api/attacks?min_severity=11",
            "/api/attacks?min_severity=8&max_severity=2",
            "/api/attacks?min_severity=high",
            "/api/attacks?start=yesterday",
            "/api/attacks?start=2025-02-01T00:00:00Z&end=2025-01-01T00:00:00Z",
        ] {
            let (status, body) = request_json(&app, "GET", uri, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(body["error"].is_string(), "{uri}");
        }
    }

    #[tokio::test]
    async fn list_time_range() {
        let app = app_with_attacks().await;
        let start = (Utc::now() - Duration::minutes(150)).format("%Y-%m-%dT%H:%M:%SZ");
        let uri = format!("/api/attacks?start={}", start);
        let (status, body) = request_json(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
    }

    #[tokio::test]
    async fn recent_respects_limit_bounds() {
        let app = app_with_attacks().await;
        let (status, body) = request_json(&app, "GET", "/api/attacks/recent?limit=2", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);

        let (status, _) = request_json(&app, "GET", "/api/attacks/recent?limit=0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = request_json(&app, "GET", "/api/attacks/recent?limit=1001", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn visualization_emits_two_points_per_attack() {
        let app = app_with_attacks().await;
        let (status, body) = request_json(
            &app,
            "GET",
            "/api/attacks/visualization-data?view_type=globe&limit=1",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "FeatureCollection");

        let features = body["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0]["geometry"]["coordinates"], serde_json::json!([20.0, 10.0]));
        assert_eq!(features[0]["properties"]["direction"], "source");
        assert_eq!(features[1]["properties"]["direction"], "destination");
        assert_eq!(features[1]["properties"]["country"], "France");
        assert_eq!(features[1]["properties"]["view_type"], "globe");

        let (status, _) =
            request_json(&app, "GET", "/api/attacks/visualization-data?view_type=flat", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn statistics_groups_counts() {
        let app = app_with_attacks().await;
        let (status, body) = request_json(&app, "GET", "/api/attacks/statistics", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["by_country"]["USA"], 2);
        assert_eq!(body["by_attack_type"]["DDoS"], 2);
        assert_eq!(body["by_severity"]["7"], 1);
    }
}
