use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AuthError;
use crate::roles::RoleSet;
use crate::store::UserRecord;

// Request DTOs

/// Body of `PATCH /users/{id}/roles`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRolesRequest {
    pub roles: Vec<String>,
}

impl UpdateRolesRequest {
    pub fn new(roles: &RoleSet) -> Self {
        Self {
            roles: roles.names(),
        }
    }
}

// Response DTOs

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserWithRoles {
    pub id: String,
    pub email: String,
    pub roles: RoleSet,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRecord> for UserWithRoles {
    fn from(user: UserRecord) -> Self {
        UserWithRoles {
            id: user.id,
            email: user.email,
            roles: user.roles,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl From<AuthError> for ErrorResponse {
    fn from(err: AuthError) -> Self {
        let code = match &err {
            AuthError::SessionUnavailable => "SESSION_UNAVAILABLE",
            AuthError::RoleLookupFailed(_) => "ROLE_LOOKUP_FAILED",
            AuthError::Forbidden => "FORBIDDEN",
            AuthError::ConfigurationError(_) => "CONFIGURATION_ERROR",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::InvalidEmail => "INVALID_EMAIL",
            AuthError::TokenInvalid => "TOKEN_INVALID",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::UserAlreadyExists => "USER_ALREADY_EXISTS",
            AuthError::NotFound => "NOT_FOUND",
            AuthError::Validation(_) => "VALIDATION_ERROR",
            AuthError::PasswordHashError => "PASSWORD_HASH_ERROR",
            AuthError::Http { .. } => "UPSTREAM_ERROR",
            AuthError::Transport(_) => "TRANSPORT_ERROR",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        };

        ErrorResponse {
            error: err.to_string(),
            code: code.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::Role;

    #[test]
    fn test_error_response_codes() {
        let body = ErrorResponse::from(AuthError::Forbidden);
        assert_eq!(body.code, "FORBIDDEN");
        assert_eq!(body.error, "Access denied");

        let body = ErrorResponse::from(AuthError::Validation("unknown role".to_owned()));
        assert_eq!(body.code, "VALIDATION_ERROR");
    }

    #[test]
    fn test_update_roles_request_wire_shape() {
        let request = UpdateRolesRequest::new(&RoleSet::from([Role::TEACHER, Role::ADMIN]));
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"roles":["admin","teacher"]}"#
        );
    }
}
