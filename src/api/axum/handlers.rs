//! HTTP handlers for the role endpoints.

use axum::Json;
use axum::extract::{Path, State};

use super::error::AppError;
use super::middleware::{AuthenticatedUser, RequireAdmin};
use super::routes::AppState;
use crate::AuthError;
use crate::api::{UpdateRolesRequest, UserWithRoles};
use crate::identity::TokenVerifier;
use crate::lookup::RoleLookupResponse;
use crate::roles::RoleSet;
use crate::store::{RoleRepository, StudentRepository};

/// Roles of the caller.
///
/// GET /auth/user
pub async fn get_auth_user<V, R, S>(user: AuthenticatedUser<V, R, S>) -> Json<RoleLookupResponse>
where
    V: TokenVerifier + Clone + Send + Sync + 'static,
    R: RoleRepository + Clone + Send + Sync + 'static,
    S: StudentRepository + Clone + Send + Sync + 'static,
{
    let user = user.into_inner();
    Json(RoleLookupResponse {
        roles: user.roles.names(),
        id: user.id,
        email: user.email,
    })
}

/// Every user with their roles.
///
/// GET /users
pub async fn list_users<V, R, S>(
    _admin: RequireAdmin<V, R, S>,
    State(state): State<AppState<V, R, S>>,
) -> Result<Json<Vec<UserWithRoles>>, AppError>
where
    V: TokenVerifier + Clone + Send + Sync + 'static,
    R: RoleRepository + Clone + Send + Sync + 'static,
    S: StudentRepository + Clone + Send + Sync + 'static,
{
    let users = state.role_repo.list_users().await?;
    Ok(Json(users.into_iter().map(UserWithRoles::from).collect()))
}

/// Replace a user's role set. Only the well-known roles can be assigned
/// and the set may not be empty.
///
/// PATCH /users/{id}/roles
pub async fn update_user_roles<V, R, S>(
    admin: RequireAdmin<V, R, S>,
    State(state): State<AppState<V, R, S>>,
    Path(user_id): Path<String>,
    Json(body): Json<UpdateRolesRequest>,
) -> Result<Json<UserWithRoles>, AppError>
where
    V: TokenVerifier + Clone + Send + Sync + 'static,
    R: RoleRepository + Clone + Send + Sync + 'static,
    S: StudentRepository + Clone + Send + Sync + 'static,
{
    let roles = RoleSet::parse_strict(&body.roles)?;
    if roles.is_empty() {
        return Err(AuthError::Validation("a user must keep at least one role".to_owned()).into());
    }
    if let Some(unknown) = roles.iter().find(|role| !role.is_well_known()) {
        return Err(AuthError::Validation(format!("unknown role {unknown}")).into());
    }

    let user = state.role_repo.assign_roles(&user_id, &roles).await?;

    log::info!(
        target: "roster::api",
        "msg=\"roles updated\", user_id={}, roles={}, by={}",
        user.id,
        user.roles,
        admin.user().id
    );

    Ok(Json(UserWithRoles::from(user)))
}
