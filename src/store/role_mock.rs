#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use super::{RoleRepository, UserRecord};
use crate::AuthError;
use crate::identity::Identity;
use crate::roles::{Role, RoleSet};

#[derive(Clone, Default)]
pub struct MockRoleRepository {
    pub users: Arc<Mutex<Vec<UserRecord>>>,
}

impl MockRoleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a user with `roles`.
    pub fn with_user(self, identity: &Identity, roles: RoleSet) -> Self {
        let now = Utc::now();
        self.users.lock().unwrap().push(UserRecord {
            id: identity.id.clone(),
            email: identity.email.clone(),
            roles,
            created_at: now,
            updated_at: now,
        });
        self
    }
}

#[async_trait]
impl RoleRepository for MockRoleRepository {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, AuthError> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn ensure_user(&self, identity: &Identity) -> Result<UserRecord, AuthError> {
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.iter().find(|u| u.id == identity.id) {
            return Ok(user.clone());
        }

        let now = Utc::now();
        let user = UserRecord {
            id: identity.id.clone(),
            email: identity.email.clone(),
            roles: RoleSet::from([Role::DEFAULT]),
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn assign_roles(
        &self,
        user_id: &str,
        roles: &RoleSet,
    ) -> Result<UserRecord, AuthError> {
        if roles.is_empty() {
            return Err(AuthError::Validation(
                "a user must keep at least one role".to_owned(),
            ));
        }

        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.iter_mut().find(|u| u.id == user_id) {
            user.roles = roles.clone();
            user.updated_at = Utc::now();
            Ok(user.clone())
        } else {
            Err(AuthError::NotFound)
        }
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, AuthError> {
        let users = self.users.lock().unwrap();
        Ok(users.clone())
    }
}
