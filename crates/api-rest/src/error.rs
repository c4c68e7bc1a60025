//! Mapping from core errors to HTTP responses.
//!
//! External-taxonomy variants map to their status codes; everything else is
//! a generic 500 whose detail goes to the operator log only.

use api_shared::ErrorBody;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use mera_core::CoreError;

/// An error ready to leave the process as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// A generic internal error for failures outside the core taxonomy
    /// (e.g. a blocking-task join failure).
    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal server error".into(),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        if e.is_internal() {
            // Full detail stays operator-side.
            tracing::error!("internal failure: {e:?}");
            return Self::internal();
        }

        let status = match e {
            CoreError::InvalidCredentials
            | CoreError::AccountDeactivated
            | CoreError::TokenInvalidOrExpired => StatusCode::UNAUTHORIZED,
            CoreError::InsufficientPermissions => StatusCode::FORBIDDEN,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<mera_types::TextError> for ApiError {
    fn from(e: mera_types::TextError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_taxonomy_maps_to_specific_statuses() {
        let cases = [
            (CoreError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (CoreError::AccountDeactivated, StatusCode::UNAUTHORIZED),
            (CoreError::TokenInvalidOrExpired, StatusCode::UNAUTHORIZED),
            (CoreError::InsufficientPermissions, StatusCode::FORBIDDEN),
            (CoreError::NotFound("record"), StatusCode::NOT_FOUND),
            (CoreError::Conflict("dup".into()), StatusCode::CONFLICT),
            (CoreError::InvalidInput("bad".into()), StatusCode::BAD_REQUEST),
        ];
        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status, expected);
        }
    }

    #[test]
    fn test_internal_errors_do_not_leak_detail() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk exploded at /secret/path");
        let api: ApiError = CoreError::FileWrite(io).into();

        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.message, "Internal server error");
    }
}
