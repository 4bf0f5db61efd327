use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::AuthError;

const MAX_ROLE_NAME_LENGTH: usize = 64;

/// A named permission group.
///
/// The set of roles is open: besides the well-known constants, any
/// lowercase identifier the backend returns is a valid role. Unknown
/// roles carry no permissions in [`RolePolicy`](super::RolePolicy).
///
/// ```rust
/// use roster::Role;
///
/// let role = Role::parse(" teacher ").unwrap();
/// assert_eq!(role, Role::TEACHER);
/// assert!(Role::parse("Teacher").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));
    pub const STUDENT: Role = Role(Cow::Borrowed("student"));
    pub const TEACHER: Role = Role(Cow::Borrowed("teacher"));
    pub const COUNSELOR: Role = Role(Cow::Borrowed("counselor"));

    /// Role assigned to every identity on first insert.
    pub const DEFAULT: Role = Self::STUDENT;

    /// Parses a role name.
    ///
    /// Surrounding whitespace is trimmed. The name must be 1-64 characters
    /// of `a-z`, `0-9`, `_` or `-`.
    ///
    /// # Errors
    ///
    /// `AuthError::Validation` for empty or malformed names.
    pub fn parse(name: &str) -> Result<Self, AuthError> {
        let name = name.trim();

        if name.is_empty() {
            return Err(AuthError::Validation("role name cannot be empty".to_owned()));
        }

        if name.len() > MAX_ROLE_NAME_LENGTH {
            return Err(AuthError::Validation(format!(
                "role name is too long (max {MAX_ROLE_NAME_LENGTH} characters)"
            )));
        }

        let well_formed = name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
        if !well_formed {
            return Err(AuthError::Validation(format!("invalid role name {name:?}")));
        }

        Ok(Self::well_known(name).unwrap_or_else(|| Role(Cow::Owned(name.to_owned()))))
    }

    fn well_known(name: &str) -> Option<Self> {
        [Self::ADMIN, Self::STUDENT, Self::TEACHER, Self::COUNSELOR]
            .into_iter()
            .find(|role| role.as_str() == name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the four roles the dashboard ships with.
    pub fn is_well_known(&self) -> bool {
        Self::well_known(self.as_str()).is_some()
    }
}

impl fmt::Debug for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Role({})", self.0)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Role {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Role::parse(&name).map_err(serde::de::Error::custom)
    }
}

/// An ordered set of roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Parses role names, skipping malformed ones.
    ///
    /// Returns the parsed set and the names that were rejected.
    pub fn parse_lossy<I, S>(names: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        let mut rejected = Vec::new();

        for name in names {
            match Role::parse(name.as_ref()) {
                Ok(role) => {
                    set.insert(role);
                }
                Err(_) => rejected.push(name.as_ref().to_owned()),
            }
        }

        (set, rejected)
    }

    /// Parses role names, failing on the first malformed one.
    ///
    /// # Errors
    ///
    /// `AuthError::Validation` naming the offending role.
    pub fn parse_strict<I, S>(names: I) -> Result<Self, AuthError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| Role::parse(name.as_ref()))
            .collect()
    }

    pub fn insert(&mut self, role: Role) -> bool {
        self.0.insert(role)
    }

    pub fn remove(&mut self, role: &Role) -> bool {
        self.0.remove(role)
    }

    pub fn contains(&self, role: &Role) -> bool {
        self.0.contains(role)
    }

    /// True if at least one role is in both sets.
    pub fn intersects(&self, other: &RoleSet) -> bool {
        !self.0.is_disjoint(&other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.0.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|r| r.as_str().to_owned()).collect()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Role; N]> for RoleSet {
    fn from(roles: [Role; N]) -> Self {
        roles.into_iter().collect()
    }
}

impl<'a> IntoIterator for &'a RoleSet {
    type Item = &'a Role;
    type IntoIter = std::collections::btree_set::Iter<'a, Role>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, role) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(role.as_str())?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_well_known() {
        assert_eq!(Role::parse("admin").unwrap(), Role::ADMIN);
        assert_eq!(Role::parse("  counselor\n").unwrap(), Role::COUNSELOR);
        assert!(Role::ADMIN.is_well_known());
    }

    #[test]
    fn test_parse_open_set() {
        let role = Role::parse("registrar").unwrap();
        assert_eq!(role.as_str(), "registrar");
        assert!(!role.is_well_known());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Role::parse("").is_err());
        assert!(Role::parse("   ").is_err());
        assert!(Role::parse("Admin").is_err());
        assert!(Role::parse("super admin").is_err());
        assert!(Role::parse(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_intersects() {
        let user = RoleSet::from([Role::ADMIN, Role::STUDENT]);
        let required = RoleSet::from([Role::ADMIN]);
        let staff = RoleSet::from([Role::TEACHER, Role::COUNSELOR]);

        assert!(user.intersects(&required));
        assert!(!user.intersects(&staff));
        assert!(!RoleSet::new().intersects(&required));
        assert!(!required.intersects(&RoleSet::new()));
    }

    #[test]
    fn test_parse_lossy_keeps_unknown_drops_malformed() {
        let (set, rejected) = RoleSet::parse_lossy(["student", "registrar", "Bad Role", ""]);

        assert_eq!(set.len(), 2);
        assert!(set.contains(&Role::STUDENT));
        assert!(set.contains(&Role::parse("registrar").unwrap()));
        assert_eq!(rejected, vec!["Bad Role".to_owned(), String::new()]);
    }

    #[test]
    fn test_parse_strict() {
        assert!(RoleSet::parse_strict(["admin", "teacher"]).is_ok());
        assert!(RoleSet::parse_strict(["admin", "ADMIN"]).is_err());
    }

    #[test]
    fn test_serde_as_string_list() {
        let set = RoleSet::from([Role::STUDENT, Role::ADMIN]);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["admin","student"]"#);

        let back: RoleSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_display() {
        let set = RoleSet::from([Role::STUDENT, Role::ADMIN]);
        assert_eq!(set.to_string(), "{admin, student}");
        assert_eq!(RoleSet::new().to_string(), "{}");
    }
}
