//! The dashboard's role to permission mapping.
//!
//! The backend enforces the same table through its row-level policies. The
//! client copy only decides what to offer in the UI.

use std::collections::HashMap;

use super::permission_set::PermissionSet;
use super::role::{Role, RoleSet};
use super::traits::{Action, Resource};
use crate::AuthError;

/// Fields a student may change on their own profile.
pub const STUDENT_EDITABLE_FIELDS: &[&str] = &["phone_number", "address", "email"];

/// Roles that work with every student row, not just their own.
pub const STAFF_ROLES: [Role; 3] = [Role::ADMIN, Role::TEACHER, Role::COUNSELOR];

pub fn is_staff(roles: &RoleSet) -> bool {
    STAFF_ROLES.iter().any(|role| roles.contains(role))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DashboardResource {
    Student,
    GpaHistory,
    User,
    RoleAssignment,
    StudentUpload,
}

impl DashboardResource {
    pub const ALL: [DashboardResource; 5] = [
        Self::Student,
        Self::GpaHistory,
        Self::User,
        Self::RoleAssignment,
        Self::StudentUpload,
    ];
}

impl Resource for DashboardResource {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::GpaHistory => "gpa_history",
            Self::User => "user",
            Self::RoleAssignment => "role_assignment",
            Self::StudentUpload => "student_upload",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "student" => Some(Self::Student),
            "gpa_history" => Some(Self::GpaHistory),
            "user" => Some(Self::User),
            "role_assignment" => Some(Self::RoleAssignment),
            "student_upload" => Some(Self::StudentUpload),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DashboardAction {
    Create,
    Read,
    Update,
    Delete,
    All,
}

impl Action for DashboardAction {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::All => "all",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "create" => Some(Self::Create),
            "read" => Some(Self::Read),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

pub type DashboardPermissions = PermissionSet<DashboardResource, DashboardAction>;

/// Permissions granted to each role.
///
/// A caller holding several roles gets the union of their grants. Roles
/// without an entry grant nothing.
#[derive(Debug, Clone, Default)]
pub struct RolePolicy {
    grants: HashMap<Role, DashboardPermissions>,
}

impl RolePolicy {
    /// An empty policy that denies everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// The policy the student records dashboard ships with.
    ///
    /// | role | grants |
    /// |------|--------|
    /// | admin | everything |
    /// | teacher, counselor | create/read/update students, read GPA history |
    /// | student | read/update students (own row only, server-side), read GPA history |
    pub fn dashboard() -> Self {
        use DashboardAction::{All, Create, Read, Update};
        use DashboardResource::{GpaHistory, Student};

        let admin = DashboardResource::ALL
            .into_iter()
            .fold(DashboardPermissions::new(), |set, resource| set.with(resource, All));

        let staff = DashboardPermissions::new()
            .with(Student, Create)
            .with(Student, Read)
            .with(Student, Update)
            .with(GpaHistory, Read);

        let student = DashboardPermissions::new()
            .with(Student, Read)
            .with(Student, Update)
            .with(GpaHistory, Read);

        Self::new()
            .with_role(Role::ADMIN, admin)
            .with_role(Role::TEACHER, staff.clone())
            .with_role(Role::COUNSELOR, staff)
            .with_role(Role::STUDENT, student)
    }

    /// Parses `{"role": {"resource": ["action", ...]}}`.
    ///
    /// # Errors
    ///
    /// `AuthError::ConfigurationError` on malformed JSON, role names,
    /// resources or actions.
    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        let raw: HashMap<String, HashMap<String, Vec<String>>> = serde_json::from_str(json)
            .map_err(|e| AuthError::ConfigurationError(format!("invalid role policy: {e}")))?;

        let mut policy = Self::new();
        for (role, grants) in raw {
            let role = Role::parse(&role)
                .map_err(|e| AuthError::ConfigurationError(format!("invalid role policy: {e}")))?;
            let permissions = DashboardPermissions::from_names(&grants).ok_or_else(|| {
                AuthError::ConfigurationError(format!(
                    "invalid role policy: unknown resource or action for role {role}"
                ))
            })?;
            policy.grants.insert(role, permissions);
        }

        Ok(policy)
    }

    #[must_use]
    pub fn with_role(mut self, role: Role, permissions: DashboardPermissions) -> Self {
        self.grants.insert(role, permissions);
        self
    }

    pub fn grant(&mut self, role: Role, resource: DashboardResource, action: DashboardAction) {
        self.grants.entry(role).or_default().grant(resource, action);
    }

    pub fn permissions_for(&self, role: &Role) -> Option<&DashboardPermissions> {
        self.grants.get(role)
    }

    /// True if any role in `roles` grants `action` on `resource`.
    pub fn allows(
        &self,
        roles: &RoleSet,
        resource: &DashboardResource,
        action: &DashboardAction,
    ) -> bool {
        roles
            .iter()
            .filter_map(|role| self.grants.get(role))
            .any(|perms| perms.can(resource, action))
    }

    /// Union of the grants of every role in `roles`.
    pub fn effective(&self, roles: &RoleSet) -> DashboardPermissions {
        let mut merged = DashboardPermissions::new();
        for perms in roles.iter().filter_map(|role| self.grants.get(role)) {
            merged.merge(perms);
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DashboardAction as Act;
    use DashboardResource as Res;

    #[test]
    fn test_admin_can_do_everything() {
        let policy = RolePolicy::dashboard();
        let admin = RoleSet::from([Role::ADMIN]);

        for resource in DashboardResource::ALL {
            for action in [Act::Create, Act::Read, Act::Update, Act::Delete] {
                assert!(policy.allows(&admin, &resource, &action), "{resource:?} {action:?}");
            }
        }
    }

    #[test]
    fn test_staff_cannot_delete_or_manage_roles() {
        let policy = RolePolicy::dashboard();

        for role in [Role::TEACHER, Role::COUNSELOR] {
            let roles = RoleSet::from([role]);
            assert!(policy.allows(&roles, &Res::Student, &Act::Create));
            assert!(policy.allows(&roles, &Res::GpaHistory, &Act::Read));
            assert!(!policy.allows(&roles, &Res::Student, &Act::Delete));
            assert!(!policy.allows(&roles, &Res::RoleAssignment, &Act::Update));
            assert!(!policy.allows(&roles, &Res::StudentUpload, &Act::Create));
        }
    }

    #[test]
    fn test_student_permissions() {
        let policy = RolePolicy::dashboard();
        let student = RoleSet::from([Role::STUDENT]);

        assert!(policy.allows(&student, &Res::Student, &Act::Read));
        assert!(policy.allows(&student, &Res::GpaHistory, &Act::Read));
        assert!(!policy.allows(&student, &Res::Student, &Act::Create));
        assert!(!policy.allows(&student, &Res::User, &Act::Read));
    }

    #[test]
    fn test_staff_roles() {
        assert!(is_staff(&RoleSet::from([Role::STUDENT, Role::COUNSELOR])));
        assert!(is_staff(&RoleSet::from([Role::ADMIN])));
        assert!(!is_staff(&RoleSet::from([Role::STUDENT])));
        assert!(!is_staff(&RoleSet::new()));
    }

    #[test]
    fn test_empty_and_unknown_roles_grant_nothing() {
        let policy = RolePolicy::dashboard();
        let unknown = RoleSet::from([Role::parse("registrar").unwrap()]);

        assert!(!policy.allows(&RoleSet::new(), &Res::Student, &Act::Read));
        assert!(!policy.allows(&unknown, &Res::Student, &Act::Read));
        assert!(policy.effective(&unknown).is_empty());
    }

    #[test]
    fn test_effective_is_union() {
        let policy = RolePolicy::dashboard();
        let roles = RoleSet::from([Role::STUDENT, Role::TEACHER]);
        let perms = policy.effective(&roles);

        assert!(perms.can(&Res::Student, &Act::Create));
        assert!(perms.can(&Res::Student, &Act::Update));
        assert!(!perms.can(&Res::Student, &Act::Delete));
    }

    #[test]
    fn test_from_json() {
        let policy = RolePolicy::from_json(
            r#"{"registrar": {"student": ["read", "update"], "student_upload": ["all"]}}"#,
        )
        .unwrap();
        let registrar = RoleSet::from([Role::parse("registrar").unwrap()]);

        assert!(policy.allows(&registrar, &Res::StudentUpload, &Act::Create));
        assert!(!policy.allows(&registrar, &Res::Student, &Act::Delete));

        assert!(matches!(
            RolePolicy::from_json(r#"{"registrar": {"transcript": ["read"]}}"#),
            Err(AuthError::ConfigurationError(_))
        ));
        assert!(matches!(
            RolePolicy::from_json(r#"{"Registrar": {}}"#),
            Err(AuthError::ConfigurationError(_))
        ));
    }
}
