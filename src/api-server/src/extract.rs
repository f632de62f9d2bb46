//! Request extractors
//!
//! `ValidatedJson` turns body rejections and `validator` failures into
//! enveloped 400 responses. `Caller` carries the identity asserted by the
//! upstream authentication layer.

use crate::error::ApiError;
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::{request::Parts, HeaderMap},
    Json,
};
use hrms_authz::Role;
use hrms_org::UserId;
use serde::de::DeserializeOwned;
use validator::Validate;

/// Authenticated user ID header
pub const X_USER_ID: &str = "x-user-id";

/// Authenticated user role header
pub const X_USER_ROLE: &str = "x-user-role";

/// JSON body that passed `validator` checks
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::Validation(rejection.body_text()))?;

        value
            .validate()
            .map_err(|e| ApiError::Validation(e.to_string()))?;

        Ok(Self(value))
    }
}

/// The user on whose behalf a request is made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ApiError::Unauthorized(format!("Missing {} header", name)))
        };

        let user_id = header(X_USER_ID)?
            .parse::<UserId>()
            .map_err(|_| ApiError::Unauthorized("Invalid user identity".to_string()))?;
        let role = header(X_USER_ROLE)?
            .parse::<Role>()
            .map_err(|_| ApiError::Unauthorized("Unknown user role".to_string()))?;

        Ok(Self { user_id, role })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(caller) = parts.extensions.get::<Caller>() {
            return Ok(*caller);
        }
        Caller::from_headers(&parts.headers)
    }
}
