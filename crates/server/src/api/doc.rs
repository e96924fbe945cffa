//! OpenAPI documentation aggregator.
//!
//! Collects all `#[utoipa::path]`-annotated handlers and `ToSchema`-derived
//! types into a single OpenAPI document, served via Scalar UI at `/docs`.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "attackwatch API",
        version = "0.1.0",
        description = "Recorded cyber attacks, notification rules and the notifications they raise.",
    ),
    tags(
        (name = "Health", description = "Server liveness"),
        (name = "Attacks", description = "Attack listing, recent feed, map data and statistics"),
        (name = "Rules", description = "Notification rule CRUD, audit log and on-demand evaluation"),
        (name = "Notifications", description = "Raised notifications"),
    ),
    paths(
        crate::api::health::health,
        crate::api::attacks::list_attacks,
        crate::api::attacks::recent_attacks,
        crate::api::attacks::visualization_data,
        crate::api::attacks::statistics,
        crate::api::rules::list_rules,
        crate::api::rules::create_rule,
        crate::api::rules::get_rule,
        crate::api::rules::update_rule,
        crate::api::rules::delete_rule,
        crate::api::rules::rule_log,
        crate::api::rules::evaluate_rules,
        crate::api::notifications::list_notifications,
    ),
    components(schemas(
        crate::api::ErrorResponse,
        crate::api::health::HealthResponse,
        crate::api::attacks::AttackListResponse,
        crate::api::attacks::RecentAttacksResponse,
        crate::api::attacks::FeatureCollection,
        crate::api::attacks::Feature,
        crate::api::attacks::PointGeometry,
        crate::api::attacks::FeatureProperties,
    ))
)]
pub struct ApiDoc;
