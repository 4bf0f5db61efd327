use crate::AuthError;
use crate::identity::Identity;
use crate::roles::{DashboardAction, DashboardResource, Role, RolePolicy, RoleSet};

/// The authorization state of the current session.
///
/// Produced only by the [`AuthorizationResolver`](super::AuthorizationResolver)
/// and replaced wholesale on every resolution. `version` is the ticket of the
/// resolution that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationContext {
    pub identity: Option<Identity>,
    pub roles: RoleSet,
    pub is_loading: bool,
    pub version: u64,
}

impl Default for AuthorizationContext {
    fn default() -> Self {
        Self::loading(0)
    }
}

impl AuthorizationContext {
    pub fn loading(version: u64) -> Self {
        Self {
            identity: None,
            roles: RoleSet::new(),
            is_loading: true,
            version,
        }
    }

    pub fn signed_out(version: u64) -> Self {
        Self {
            identity: None,
            roles: RoleSet::new(),
            is_loading: false,
            version,
        }
    }

    pub fn authenticated(identity: Identity, roles: RoleSet, version: u64) -> Self {
        Self {
            identity: Some(identity),
            roles,
            is_loading: false,
            version,
        }
    }

    /// Loaded and signed in.
    pub fn is_authenticated(&self) -> bool {
        !self.is_loading && self.identity.is_some()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.id.as_str())
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }

    /// Policy decision for this context. Always false while loading or
    /// signed out.
    pub fn can(
        &self,
        policy: &RolePolicy,
        resource: &DashboardResource,
        action: &DashboardAction,
    ) -> bool {
        self.is_authenticated() && policy.allows(&self.roles, resource, action)
    }

    /// Like [`can`](Self::can), with the reason for a refusal.
    ///
    /// # Errors
    ///
    /// `SessionUnavailable` while loading or signed out, `Forbidden` when no
    /// role grants the action.
    pub fn authorize(
        &self,
        policy: &RolePolicy,
        resource: &DashboardResource,
        action: &DashboardAction,
    ) -> Result<(), AuthError> {
        if !self.is_authenticated() {
            return Err(AuthError::SessionUnavailable);
        }
        if !policy.allows(&self.roles, resource, action) {
            return Err(AuthError::Forbidden);
        }
        Ok(())
    }
}
