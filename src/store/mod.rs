//! Server-side role and student storage.
//!
//! [`RoleRepository`] maps identity ids to role sets. Every stored identity
//! holds at least one role: [`RoleRepository::ensure_user`] inserts new
//! identities with [`Role::DEFAULT`](crate::Role::DEFAULT) and assignments
//! never empty a set.
//!
//! [`StudentRepository`] holds the student rows and their GPA history.
//! It makes no access decisions; the routes in [`api`](crate::api) do.
//!
//! Enable the `mocks` feature for [`MockRoleRepository`] and
//! [`MockStudentRepository`].

#[cfg(any(test, feature = "mocks"))]
mod role_mock;
#[cfg(any(test, feature = "mocks"))]
mod student_mock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AuthError;
use crate::api::{GpaEntry, NewStudent, Student, StudentUpdate};
use crate::identity::Identity;
use crate::roles::RoleSet;

#[cfg(any(test, feature = "mocks"))]
pub use role_mock::MockRoleRepository;
#[cfg(any(test, feature = "mocks"))]
pub use student_mock::MockStudentRepository;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub roles: RoleSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait RoleRepository {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, AuthError>;

    /// Returns the stored record for `identity`, inserting it with the
    /// default role on first sight.
    async fn ensure_user(&self, identity: &Identity) -> Result<UserRecord, AuthError>;

    /// Replaces the role set of `user_id`.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown users, `Validation` for an empty role set.
    async fn assign_roles(&self, user_id: &str, roles: &RoleSet)
    -> Result<UserRecord, AuthError>;

    async fn list_users(&self) -> Result<Vec<UserRecord>, AuthError>;
}

#[async_trait]
pub trait StudentRepository {
    /// Every student, or only those whose email matches `email`
    /// case-insensitively.
    async fn list_students(&self, email: Option<&str>) -> Result<Vec<Student>, AuthError>;

    async fn find_student(&self, student_id: &str) -> Result<Option<Student>, AuthError>;

    /// # Errors
    ///
    /// `Validation` when the id is already taken.
    async fn create_student(&self, student: NewStudent) -> Result<Student, AuthError>;

    /// # Errors
    ///
    /// `NotFound` for unknown ids.
    async fn update_student(
        &self,
        student_id: &str,
        update: &StudentUpdate,
    ) -> Result<Student, AuthError>;

    /// # Errors
    ///
    /// `NotFound` for unknown ids.
    async fn delete_student(&self, student_id: &str) -> Result<(), AuthError>;

    /// GPA entries of `student_id`, oldest first.
    async fn gpa_history(&self, student_id: &str) -> Result<Vec<GpaEntry>, AuthError>;
}
