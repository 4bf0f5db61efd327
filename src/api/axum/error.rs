use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::AuthError;
use crate::api::ErrorResponse;

/// converts `AuthError` into appropriate HTTP responses
#[derive(Debug)]
pub struct AppError(pub AuthError);

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        Self(err)
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AuthError::InvalidEmail | AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::UserAlreadyExists => StatusCode::CONFLICT,
            AuthError::SessionUnavailable
            | AuthError::InvalidCredentials
            | AuthError::TokenInvalid
            | AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::RoleLookupFailed(_) | AuthError::Http { .. } | AuthError::Transport(_) => {
                StatusCode::BAD_GATEWAY
            }
            AuthError::ConfigurationError(_)
            | AuthError::PasswordHashError
            | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!(
                target: "roster::api",
                "msg=\"request failed\", status={}, error=\"{}\"",
                status.as_u16(),
                self.0
            );
        }

        (status, Json(ErrorResponse::from(self.0))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError(AuthError::TokenInvalid).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError(AuthError::Forbidden).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError(AuthError::Validation("x".to_owned())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError(AuthError::Internal("x".to_owned())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
