//! Route definitions for the API server
//!
//! - Health, metrics and the OpenAPI document (public)
//! - Department lifecycle and version history under /api/v1
//! - Authorization introspection under /api/v1

use crate::{handlers, middleware, state::AppState};
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

/// OpenAPI documentation configuration
#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRMS Organization API",
        version = "1.0.0",
        description = "Department lifecycle with head role synchronization and role-based access"
    ),
    paths(
        handlers::health_check,
        handlers::prometheus_metrics,
        handlers::create_department,
        handlers::list_departments,
        handlers::get_department,
        handlers::update_department,
        handlers::delete_department,
        handlers::list_versions,
        handlers::revert_department,
        handlers::check_authorization,
        handlers::role_permissions,
    ),
    components(
        schemas(
            crate::HealthResponse,
            crate::models::CreateDepartmentRequest,
            crate::models::UpdateDepartmentRequest,
            crate::models::DepartmentResponse,
            crate::models::VersionResponse,
            crate::models::AuthzCheckRequest,
            crate::models::AuthzCheckResponse,
            crate::models::RuleResponse,
            crate::models::RolePermissionsResponse,
        )
    ),
    tags(
        (name = "health", description = "Health and monitoring endpoints"),
        (name = "departments", description = "Department lifecycle and version history"),
        (name = "authorization", description = "Role and permission introspection"),
    )
)]
pub struct ApiDoc;

/// Build the application router with all routes and middleware
pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route(
            "/departments",
            post(handlers::create_department).get(handlers::list_departments),
        )
        .route(
            "/departments/:id",
            get(handlers::get_department)
                .patch(handlers::update_department)
                .delete(handlers::delete_department),
        )
        .route("/departments/:id/versions", get(handlers::list_versions))
        .route(
            "/departments/:id/versions/:version_id/revert",
            post(handlers::revert_department),
        )
        .route("/authz/check", post(handlers::check_authorization))
        .route("/roles/:role/permissions", get(handlers::role_permissions));

    Router::new()
        // Health and metrics (no caller identity required)
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::prometheus_metrics))
        .route("/api-docs/openapi.json", get(handlers::openapi_json))
        .nest("/api/v1", api_routes)
        .with_state(state)
        // Middleware layers (executed bottom to top)
        .layer(axum_middleware::from_fn(middleware::auth_middleware))
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(middleware::cors_layer())
        .layer(TraceLayer::new_for_http())
}
