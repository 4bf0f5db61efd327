//! Role-gated navigation menu.
//!
//! [`NavigationTable::visible_entries`] takes the context itself, never a
//! cached role list, so the menu can't outlive a refresh with stale roles.

use serde::Serialize;

use crate::resolver::AuthorizationContext;
use crate::roles::{Role, RoleSet};

/// One menu entry. An empty `required_roles` shows the entry to everyone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavEntry {
    pub label: String,
    pub route: String,
    pub required_roles: RoleSet,
}

impl NavEntry {
    pub fn new(label: impl Into<String>, route: impl Into<String>, required_roles: RoleSet) -> Self {
        Self {
            label: label.into(),
            route: route.into(),
            required_roles,
        }
    }

    pub fn is_visible_to(&self, roles: &RoleSet) -> bool {
        self.required_roles.is_empty() || self.required_roles.intersects(roles)
    }
}

/// Ordered menu declaration.
#[derive(Debug, Clone, Default)]
pub struct NavigationTable {
    entries: Vec<NavEntry>,
}

impl NavigationTable {
    pub fn new(entries: Vec<NavEntry>) -> Self {
        Self { entries }
    }

    /// The dashboard sidebar.
    pub fn dashboard() -> Self {
        let staff = RoleSet::from([Role::ADMIN, Role::TEACHER, Role::COUNSELOR]);
        let admin = RoleSet::from([Role::ADMIN]);

        Self::new(vec![
            NavEntry::new("Dashboard", "/dashboard", RoleSet::new()),
            NavEntry::new("My Profile", "/profile", RoleSet::from([Role::STUDENT])),
            NavEntry::new("Students", "/students", staff.clone()),
            NavEntry::new("Add Student", "/students/new", staff),
            NavEntry::new("Upload Students", "/students/upload", admin.clone()),
            NavEntry::new("User Management", "/admin/users", admin),
        ])
    }

    #[must_use]
    pub fn with(mut self, entry: NavEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn entries(&self) -> &[NavEntry] {
        &self.entries
    }

    /// Entries visible to `context`, in declared order.
    ///
    /// A loading or signed-out context carries no roles and sees only
    /// entries without requirements.
    pub fn visible_entries(&self, context: &AuthorizationContext) -> Vec<&NavEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.is_visible_to(&context.roles))
            .collect()
    }
}
