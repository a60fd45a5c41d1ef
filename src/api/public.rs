//! Public API types

use axum::extract::FromRequestParts;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use http::request::Parts;

use crate::ai::chat::AssistantError;
use crate::calendar::CalendarError;

/// Header carrying the id of the authenticated user. It is set by the
/// auth service in front of this API.
pub const OWNER_HEADER: &str = "x-user-id";

// Errors

pub struct ApiError(anyhow::Error);

impl ApiError {
    fn status(&self) -> StatusCode {
        if let Some(err) = self.0.downcast_ref::<CalendarError>() {
            return match err {
                CalendarError::MissingField(_) | CalendarError::Validation { .. } => {
                    StatusCode::BAD_REQUEST
                }
                CalendarError::Unauthorized { .. } | CalendarError::OwnerMismatch { .. } => {
                    StatusCode::FORBIDDEN
                }
                CalendarError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
        }
        match self.0.downcast_ref::<AssistantError>() {
            Some(AssistantError::SessionNotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convert `ApiError` into an Axum compatible response.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self.0);
            (status, format!("Something went wrong: {}", self.0)).into_response()
        } else {
            tracing::warn!("{}", self.0);
            (status, self.0.to_string()).into_response()
        }
    }
}

/// Enables using `?` on functions that return `Result<_,
/// anyhow::Error>` to turn them into `Result<_, ApiError>`
impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

// Extractors

/// The user a request is made on behalf of.
pub struct Owner(pub String);

impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Owner(v.to_string()))
            .ok_or((StatusCode::UNAUTHORIZED, "missing x-user-id header"))
    }
}

// Re-export public types from each route

pub mod calendar {
    pub use crate::api::routes::calendar::public::*;
}

pub mod chat {
    pub use crate::api::routes::chat::public::*;
}
