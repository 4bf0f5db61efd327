use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};

use super::{handlers, students};
use crate::identity::TokenVerifier;
use crate::roles::RolePolicy;
use crate::store::{RoleRepository, StudentRepository};

#[derive(Clone)]
pub struct AppState<V, R, S> {
    pub verifier: V,
    pub role_repo: R,
    pub student_repo: S,
    pub policy: Arc<RolePolicy>,
}

impl<V, R, S> AppState<V, R, S> {
    /// State checked against [`RolePolicy::dashboard`].
    pub fn new(verifier: V, role_repo: R, student_repo: S) -> Self {
        Self {
            verifier,
            role_repo,
            student_repo,
            policy: Arc::new(RolePolicy::dashboard()),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RolePolicy) -> Self {
        self.policy = Arc::new(policy);
        self
    }
}

/// `GET /auth/user` plus the admin routes
pub fn role_routes<V, R, S>() -> Router<AppState<V, R, S>>
where
    V: TokenVerifier + Clone + Send + Sync + 'static,
    R: RoleRepository + Clone + Send + Sync + 'static,
    S: StudentRepository + Clone + Send + Sync + 'static,
{
    Router::new()
        .merge(auth_user_routes())
        .merge(admin_routes())
}

/// role lookup for any authenticated caller
pub fn auth_user_routes<V, R, S>() -> Router<AppState<V, R, S>>
where
    V: TokenVerifier + Clone + Send + Sync + 'static,
    R: RoleRepository + Clone + Send + Sync + 'static,
    S: StudentRepository + Clone + Send + Sync + 'static,
{
    Router::new().route("/auth/user", get(handlers::get_auth_user::<V, R, S>))
}

/// user listing and role assignment, `admin` only
pub fn admin_routes<V, R, S>() -> Router<AppState<V, R, S>>
where
    V: TokenVerifier + Clone + Send + Sync + 'static,
    R: RoleRepository + Clone + Send + Sync + 'static,
    S: StudentRepository + Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/users", get(handlers::list_users::<V, R, S>))
        .route(
            "/users/{id}/roles",
            patch(handlers::update_user_roles::<V, R, S>),
        )
}

/// student records and GPA history
///
/// | route | who |
/// |-------|-----|
/// | `GET /students` | staff, optionally `?email=` |
/// | `POST /students` | roles granted student create |
/// | `GET`, `PATCH /students/{id}` | staff, or the student owning the row (contact fields only) |
/// | `DELETE /students/{id}` | roles granted student delete |
/// | `POST /students/upload` | roles granted student upload |
/// | `GET /gpa_history/{id}` | staff, or the student owning the row |
pub fn student_routes<V, R, S>() -> Router<AppState<V, R, S>>
where
    V: TokenVerifier + Clone + Send + Sync + 'static,
    R: RoleRepository + Clone + Send + Sync + 'static,
    S: StudentRepository + Clone + Send + Sync + 'static,
{
    Router::new()
        .route(
            "/students",
            get(students::list_students::<V, R, S>).post(students::create_student::<V, R, S>),
        )
        .route(
            "/students/upload",
            post(students::upload_students::<V, R, S>),
        )
        .route(
            "/students/{id}",
            get(students::get_student::<V, R, S>)
                .patch(students::update_student::<V, R, S>)
                .delete(students::delete_student::<V, R, S>),
        )
        .route(
            "/gpa_history/{id}",
            get(students::gpa_history::<V, R, S>),
        )
}

/// every route this module serves
pub fn api_routes<V, R, S>() -> Router<AppState<V, R, S>>
where
    V: TokenVerifier + Clone + Send + Sync + 'static,
    R: RoleRepository + Clone + Send + Sync + 'static,
    S: StudentRepository + Clone + Send + Sync + 'static,
{
    Router::new()
        .merge(role_routes())
        .merge(student_routes())
}
