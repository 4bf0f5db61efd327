//! Role lookup against the backend.
//!
//! Roles always come from the authoritative `GET /auth/user` endpoint keyed
//! by the bearer token, never from claims carried by the client.

mod http;
#[cfg(any(test, feature = "mocks"))]
mod lookup_mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::AuthError;
use crate::roles::RoleSet;
use crate::secret::BearerToken;

pub use http::HttpRoleLookup;
#[cfg(any(test, feature = "mocks"))]
pub use lookup_mock::MockRoleLookup;

/// Body of a successful `GET /auth/user`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleLookupResponse {
    pub id: String,
    #[serde(default)]
    pub email: String,
    pub roles: Vec<String>,
}

impl RoleLookupResponse {
    pub fn new<I, S>(id: impl Into<String>, email: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            email: email.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses the role names, logging and skipping malformed ones.
    pub fn role_set(&self) -> RoleSet {
        let (roles, rejected) = RoleSet::parse_lossy(&self.roles);

        for name in rejected {
            log::warn!(
                target: "roster::resolver",
                "msg=\"skipping malformed role\", user_id={}, role={name:?}",
                self.id
            );
        }

        roles
    }
}

/// Fetches the role set of the identity a bearer token belongs to.
#[async_trait]
pub trait RoleLookup: Send + Sync + 'static {
    /// # Errors
    ///
    /// `AuthError::RoleLookupFailed` on transport failure, any non-200
    /// status, or an unparseable body.
    async fn lookup(&self, token: &BearerToken) -> Result<RoleLookupResponse, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::Role;

    #[test]
    fn test_response_email_is_optional() {
        let response: RoleLookupResponse =
            serde_json::from_str(r#"{"id": "u1", "roles": ["admin"]}"#).unwrap();
        assert_eq!(response.email, "");
        assert_eq!(response.roles, vec!["admin".to_owned()]);
    }

    #[test]
    fn test_role_set_skips_malformed() {
        let response = RoleLookupResponse::new("u1", "a@b.co", ["student", "", "Not A Role"]);
        assert_eq!(response.role_set(), RoleSet::from([Role::STUDENT]));
    }
}
