use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use hrms_authz::{resources, Action, Role};
use hrms_org::{DepartmentId, OrgError, VersionId};
use std::str::FromStr;
use std::sync::Arc;
use utoipa::OpenApi;

use crate::{
    error::{ApiError, Result},
    extract::{Caller, ValidatedJson},
    models::*,
    routes::ApiDoc,
    state::AppState,
    HealthResponse,
};

type Envelope<T> = Json<ApiResponse<T>>;

/// Parse a path identifier once the caller is authorized
fn parse_id<T: FromStr<Err = OrgError>>(raw: &str) -> Result<T> {
    raw.parse::<T>().map_err(ApiError::from)
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// Prometheus metrics for the engine and the permission cache
#[utoipa::path(
    get,
    path = "/metrics",
    responses(
        (status = 200, description = "Prometheus metrics", body = String)
    ),
    tag = "health"
)]
pub async fn prometheus_metrics(State(state): State<Arc<AppState>>) -> String {
    let mut body = match state.engine.metrics() {
        Some(metrics) => metrics.export_prometheus().await,
        None => String::new(),
    };

    let stats = state.gate.resolver().cache_stats();
    body.push_str(&format!(
        r#"
# HELP hrms_authz_permission_cache_hits_total Effective-permission cache hits
# TYPE hrms_authz_permission_cache_hits_total counter
hrms_authz_permission_cache_hits_total {}

# HELP hrms_authz_permission_cache_misses_total Effective-permission cache misses
# TYPE hrms_authz_permission_cache_misses_total counter
hrms_authz_permission_cache_misses_total {}
"#,
        stats.hits, stats.misses
    ));

    body
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[utoipa::path(
    post,
    path = "/api/v1/departments",
    request_body = CreateDepartmentRequest,
    responses(
        (
            status = 201,
            description = "Department created and head promoted",
            body = DepartmentResponse
        ),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Missing caller identity"),
        (status = 403, description = "Caller may not create departments"),
        (status = 404, description = "Head employee or user not found"),
        (status = 409, description = "Department name already exists"),
        (status = 500, description = "Transaction failed")
    ),
    tag = "departments"
)]
pub async fn create_department(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    body: Result<ValidatedJson<CreateDepartmentRequest>>,
) -> Result<(StatusCode, Envelope<DepartmentResponse>)> {
    state.authorize(&caller, resources::DEPARTMENT, Action::Create)?;
    let ValidatedJson(req) = body?;

    let department = state.engine.create_department(req.into()).await?;

    Ok((
        StatusCode::CREATED,
        Json(
            ApiResponse::ok(DepartmentResponse::from(department))
                .with_message("Department created successfully"),
        ),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/departments",
    responses(
        (status = 200, description = "All departments", body = [DepartmentResponse]),
        (status = 403, description = "Caller may not read departments"),
        (status = 404, description = "No departments exist")
    ),
    tag = "departments"
)]
pub async fn list_departments(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Envelope<Vec<DepartmentResponse>>> {
    state.authorize(&caller, resources::DEPARTMENT, Action::Read)?;

    let departments = state.engine.list_departments().await?;

    Ok(Json(ApiResponse::ok(
        departments.into_iter().map(DepartmentResponse::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/departments/{id}",
    params(
        ("id" = String, Path, description = "Department ID")
    ),
    responses(
        (status = 200, description = "Department details", body = DepartmentResponse),
        (status = 400, description = "Malformed department ID"),
        (status = 404, description = "Department not found")
    ),
    tag = "departments"
)]
pub async fn get_department(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Envelope<DepartmentResponse>> {
    state.authorize(&caller, resources::DEPARTMENT, Action::Read)?;
    let id: DepartmentId = parse_id(&id)?;

    let department = state.engine.get_department(id).await?;

    Ok(Json(ApiResponse::ok(department.into())))
}

#[utoipa::path(
    patch,
    path = "/api/v1/departments/{id}",
    params(
        ("id" = String, Path, description = "Department ID")
    ),
    request_body = UpdateDepartmentRequest,
    responses(
        (status = 200, description = "Department updated", body = DepartmentResponse),
        (status = 400, description = "Invalid or empty update"),
        (status = 403, description = "Caller may not update departments"),
        (status = 404, description = "Department or new head not found"),
        (status = 409, description = "Department name already exists"),
        (status = 500, description = "Transaction failed")
    ),
    tag = "departments"
)]
pub async fn update_department(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
    body: Result<ValidatedJson<UpdateDepartmentRequest>>,
) -> Result<Envelope<DepartmentResponse>> {
    state.authorize(&caller, resources::DEPARTMENT, Action::Update)?;
    let id: DepartmentId = parse_id(&id)?;
    let ValidatedJson(req) = body?;

    let department = state.engine.update_department(id, req.into()).await?;

    Ok(Json(
        ApiResponse::ok(DepartmentResponse::from(department))
            .with_message("Department updated successfully"),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/departments/{id}",
    params(
        ("id" = String, Path, description = "Department ID")
    ),
    responses(
        (
            status = 200,
            description = "Department deleted; the returned record is its last state",
            body = DepartmentResponse
        ),
        (status = 403, description = "Caller may not delete departments"),
        (status = 404, description = "Department not found"),
        (status = 500, description = "Transaction failed")
    ),
    tag = "departments"
)]
pub async fn delete_department(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Envelope<DepartmentResponse>> {
    state.authorize(&caller, resources::DEPARTMENT, Action::Delete)?;
    let id: DepartmentId = parse_id(&id)?;

    let department = state.engine.delete_department(id).await?;

    Ok(Json(
        ApiResponse::ok(DepartmentResponse::from(department))
            .with_message("Department deleted successfully"),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/departments/{id}/versions",
    params(
        ("id" = String, Path, description = "Department ID")
    ),
    responses(
        (status = 200, description = "Snapshots, most recent first", body = [VersionResponse]),
        (status = 404, description = "No version history")
    ),
    tag = "departments"
)]
pub async fn list_versions(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Envelope<Vec<VersionResponse>>> {
    state.authorize(&caller, resources::DEPARTMENT, Action::Read)?;
    let id: DepartmentId = parse_id(&id)?;

    let versions = state.engine.list_versions(id).await?;

    Ok(Json(ApiResponse::ok(
        versions.into_iter().map(VersionResponse::from).collect(),
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/departments/{id}/versions/{version_id}/revert",
    params(
        ("id" = String, Path, description = "Department ID"),
        ("version_id" = String, Path, description = "Snapshot to restore")
    ),
    responses(
        (status = 200, description = "Department reverted", body = DepartmentResponse),
        (status = 403, description = "Caller may not update departments"),
        (status = 404, description = "Department or version not found"),
        (status = 409, description = "Restored name is taken by another department")
    ),
    tag = "departments"
)]
pub async fn revert_department(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path((id, version_id)): Path<(String, String)>,
) -> Result<Envelope<DepartmentResponse>> {
    state.authorize(&caller, resources::DEPARTMENT, Action::Update)?;
    let id: DepartmentId = parse_id(&id)?;
    let version_id: VersionId = parse_id(&version_id)?;

    let department = state.engine.revert_department(id, version_id).await?;

    Ok(Json(
        ApiResponse::ok(DepartmentResponse::from(department))
            .with_message("Department reverted successfully"),
    ))
}

/// Decide a (role, resource, action) triple without performing it
#[utoipa::path(
    post,
    path = "/api/v1/authz/check",
    request_body = AuthzCheckRequest,
    responses(
        (status = 200, description = "Authorization decision", body = AuthzCheckResponse),
        (status = 400, description = "Unknown role or action")
    ),
    tag = "authorization"
)]
pub async fn check_authorization(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    ValidatedJson(req): ValidatedJson<AuthzCheckRequest>,
) -> Result<Envelope<AuthzCheckResponse>> {
    let role: Role = req.role.parse()?;
    let action: Action = req.action.parse()?;

    let decision = state.gate.explain(role, &req.resource, action);

    Ok(Json(ApiResponse::ok(decision.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/roles/{role}/permissions",
    params(
        ("role" = String, Path, description = "Role name")
    ),
    responses(
        (status = 200, description = "Effective permissions", body = RolePermissionsResponse),
        (status = 404, description = "Unknown role")
    ),
    tag = "authorization"
)]
pub async fn role_permissions(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    Path(role): Path<String>,
) -> Result<Envelope<RolePermissionsResponse>> {
    let role: Role = role
        .parse()
        .map_err(|_| ApiError::NotFound(format!("Role not found: {}", role)))?;

    let resolver = state.gate.resolver();
    let permissions = resolver.effective_permissions(role);

    Ok(Json(ApiResponse::ok(RolePermissionsResponse {
        role: role.to_string(),
        inherited_roles: resolver
            .inherited_roles(role)
            .into_iter()
            .filter(|r| *r != role)
            .map(|r| r.to_string())
            .collect(),
        permissions: permissions.iter().map(RuleResponse::from).collect(),
    })))
}
