//! Per-role permission storage.

use std::collections::HashMap;

use super::traits::{Action, Resource};

/// Resources mapped to the actions allowed on them.
///
/// An action for which [`Action::is_all`] is true grants every action on
/// its resource.
#[derive(Debug, Clone)]
pub struct PermissionSet<R, A>
where
    R: Resource,
    A: Action,
{
    permissions: HashMap<R, Vec<A>>,
}

impl<R, A> Default for PermissionSet<R, A>
where
    R: Resource,
    A: Action,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R, A> PermissionSet<R, A>
where
    R: Resource,
    A: Action,
{
    pub fn new() -> Self {
        Self {
            permissions: HashMap::new(),
        }
    }

    /// Grants `action` on `resource`. Granting twice is a no-op.
    pub fn grant(&mut self, resource: R, action: A) {
        let actions = self.permissions.entry(resource).or_default();
        if !actions.contains(&action) {
            actions.push(action);
        }
    }

    /// Builder-style [`grant`](Self::grant).
    #[must_use]
    pub fn with(mut self, resource: R, action: A) -> Self {
        self.grant(resource, action);
        self
    }

    pub fn can(&self, resource: &R, action: &A) -> bool {
        self.permissions
            .get(resource)
            .is_some_and(|actions| actions.iter().any(|a| a.is_all() || a == action))
    }

    pub fn revoke(&mut self, resource: &R, action: &A) {
        if let Some(actions) = self.permissions.get_mut(resource) {
            actions.retain(|a| a != action);
            if actions.is_empty() {
                self.permissions.remove(resource);
            }
        }
    }

    /// Adds every grant of `other` to this set.
    pub fn merge(&mut self, other: &Self) {
        for (resource, actions) in &other.permissions {
            for action in actions {
                self.grant(resource.clone(), action.clone());
            }
        }
    }

    pub fn actions_for(&self, resource: &R) -> Option<&[A]> {
        self.permissions.get(resource).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// Format: `{"student": ["read", "update"], "user": ["all"]}`
    pub fn to_json(&self) -> String {
        let map: HashMap<&str, Vec<&str>> = self
            .permissions
            .iter()
            .map(|(r, actions)| (r.as_str(), actions.iter().map(Action::as_str).collect()))
            .collect();

        serde_json::to_string(&map).unwrap_or_else(|_| "{}".to_owned())
    }

    /// Returns `None` if parsing fails or any name is unrecognized.
    pub fn from_json(json: &str) -> Option<Self> {
        let map: HashMap<String, Vec<String>> = serde_json::from_str(json).ok()?;
        Self::from_names(&map)
    }

    pub(crate) fn from_names(map: &HashMap<String, Vec<String>>) -> Option<Self> {
        let mut set = Self::new();
        for (resource, actions) in map {
            let resource = R::from_str(resource)?;
            for action in actions {
                set.grant(resource.clone(), A::from_str(action)?);
            }
        }
        Some(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::{DashboardAction as Act, DashboardResource as Res};

    #[test]
    fn test_grant_and_check() {
        let perms = PermissionSet::new()
            .with(Res::Student, Act::Read)
            .with(Res::Student, Act::Update);

        assert!(perms.can(&Res::Student, &Act::Read));
        assert!(perms.can(&Res::Student, &Act::Update));
        assert!(!perms.can(&Res::Student, &Act::Delete));
        assert!(!perms.can(&Res::GpaHistory, &Act::Read));
    }

    #[test]
    fn test_all_action_is_scoped_to_resource() {
        let perms = PermissionSet::new().with(Res::User, Act::All);

        assert!(perms.can(&Res::User, &Act::Delete));
        assert!(!perms.can(&Res::Student, &Act::Read));
    }

    #[test]
    fn test_grant_is_idempotent_and_revoke_cleans_up() {
        let mut perms = PermissionSet::new();
        perms.grant(Res::Student, Act::Read);
        perms.grant(Res::Student, Act::Read);
        assert_eq!(perms.actions_for(&Res::Student).unwrap().len(), 1);

        perms.revoke(&Res::Student, &Act::Read);
        assert!(perms.is_empty());
    }

    #[test]
    fn test_merge() {
        let mut a = PermissionSet::new().with(Res::Student, Act::Read);
        let b = PermissionSet::new()
            .with(Res::Student, Act::Update)
            .with(Res::GpaHistory, Act::Read);

        a.merge(&b);

        assert!(a.can(&Res::Student, &Act::Read));
        assert!(a.can(&Res::Student, &Act::Update));
        assert!(a.can(&Res::GpaHistory, &Act::Read));
    }

    #[test]
    fn test_json() {
        let perms = PermissionSet::new()
            .with(Res::Student, Act::Read)
            .with(Res::RoleAssignment, Act::All);

        let parsed: PermissionSet<Res, Act> = PermissionSet::from_json(&perms.to_json()).unwrap();
        assert!(parsed.can(&Res::Student, &Act::Read));
        assert!(parsed.can(&Res::RoleAssignment, &Act::Update));

        assert!(PermissionSet::<Res, Act>::from_json(r#"{"transcript": ["read"]}"#).is_none());
        assert!(PermissionSet::<Res, Act>::from_json(r#"{"student": ["archive"]}"#).is_none());
    }
}
