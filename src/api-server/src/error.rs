use crate::models::ApiResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hrms_authz::AuthzError;
use hrms_org::OrgError;
use tracing::error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            ApiError::Transaction(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(self) -> String {
        match self {
            ApiError::Validation(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::Timeout(msg)
            | ApiError::Transaction(msg)
            | ApiError::Internal(msg) => msg,
        }
    }
}

impl From<OrgError> for ApiError {
    fn from(e: OrgError) -> Self {
        match e {
            OrgError::Validation(msg) => ApiError::Validation(msg),
            e @ OrgError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            OrgError::Conflict(msg) => ApiError::Conflict(msg),
            OrgError::Transaction(msg) => ApiError::Transaction(msg),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(e: AuthzError) -> Self {
        match e {
            AuthzError::UnknownRole(_)
            | AuthzError::UnknownAction(_)
            | AuthzError::InvalidRule(_) => ApiError::Validation(e.to_string()),
            AuthzError::Config(_) | AuthzError::Io(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        }

        let body = Json(ApiResponse::<()>::failure(self.message()));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_org_error_status_mapping() {
        let cases = [
            (OrgError::validation("bad"), StatusCode::BAD_REQUEST),
            (OrgError::not_found("Department", "x"), StatusCode::NOT_FOUND),
            (OrgError::Conflict("dup".into()), StatusCode::CONFLICT),
            (OrgError::Transaction("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (org, status) in cases {
            assert_eq!(ApiError::from(org).status(), status);
        }
    }

    #[test]
    fn test_not_found_keeps_entity_in_message() {
        let err = ApiError::from(OrgError::not_found("Employee", "abc"));
        assert_eq!(err.message(), "Employee not found: abc");
    }

    #[test]
    fn test_unknown_role_is_bad_request() {
        let err = ApiError::from(AuthzError::UnknownRole("janitor".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
