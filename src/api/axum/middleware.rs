use std::marker::PhantomData;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use super::error::AppError;
use super::routes::AppState;
use crate::AuthError;
use crate::identity::TokenVerifier;
use crate::roles::Role;
use crate::secret::BearerToken;
use crate::store::{RoleRepository, StudentRepository, UserRecord};

/// validates bearer token from `Authorization` header and loads the caller's
/// role record, creating it with the default role on first sight
#[derive(Debug, Clone)]
pub struct AuthenticatedUser<V, R, S> {
    user: UserRecord,
    _marker: PhantomData<(V, R, S)>,
}

impl<V, R, S> AuthenticatedUser<V, R, S> {
    pub fn into_inner(self) -> UserRecord {
        self.user
    }

    pub fn user(&self) -> &UserRecord {
        &self.user
    }
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Option<BearerToken> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()
        .and_then(BearerToken::from_header_value)
}

impl<V, R, S> FromRequestParts<AppState<V, R, S>> for AuthenticatedUser<V, R, S>
where
    V: TokenVerifier + Clone + Send + Sync + 'static,
    R: RoleRepository + Clone + Send + Sync + 'static,
    S: StudentRepository + Clone + Send + Sync + 'static,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<V, R, S>,
    ) -> Result<Self, Self::Rejection> {
        let token =
            extract_bearer_token(&parts.headers).ok_or(AppError(AuthError::TokenInvalid))?;

        let identity = state.verifier.verify(&token).await.map_err(AppError)?;
        let user = state
            .role_repo
            .ensure_user(&identity)
            .await
            .map_err(AppError)?;

        Ok(AuthenticatedUser {
            user,
            _marker: PhantomData,
        })
    }
}

/// [`AuthenticatedUser`] holding the `admin` role; anyone else gets 403
#[derive(Debug, Clone)]
pub struct RequireAdmin<V, R, S>(pub AuthenticatedUser<V, R, S>);

impl<V, R, S> RequireAdmin<V, R, S> {
    pub fn user(&self) -> &UserRecord {
        self.0.user()
    }
}

impl<V, R, S> FromRequestParts<AppState<V, R, S>> for RequireAdmin<V, R, S>
where
    V: TokenVerifier + Clone + Send + Sync + 'static,
    R: RoleRepository + Clone + Send + Sync + 'static,
    S: StudentRepository + Clone + Send + Sync + 'static,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<V, R, S>,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;

        if !user.user().roles.contains(&Role::ADMIN) {
            log::info!(
                target: "roster::api",
                "msg=\"admin route denied\", user_id={}, path={}",
                user.user().id,
                parts.uri.path()
            );
            return Err(AppError(AuthError::Forbidden));
        }

        Ok(RequireAdmin(user))
    }
}
