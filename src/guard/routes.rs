use super::{Navigator, ProtectedView, RouteGuard};
use crate::roles::{Role, RoleSet};

/// The routing table's protected view declarations.
///
/// Routes missing from the table are denied to everyone.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    views: Vec<ProtectedView>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Protected routes of the student records dashboard.
    pub fn dashboard() -> Self {
        let staff = RoleSet::from([Role::ADMIN, Role::TEACHER, Role::COUNSELOR]);
        let admin = RoleSet::from([Role::ADMIN]);

        Self::new()
            .with(ProtectedView::authenticated("/dashboard"))
            .with(ProtectedView::new("/profile", RoleSet::from([Role::STUDENT])))
            .with(ProtectedView::new("/students", staff.clone()))
            .with(ProtectedView::new("/students/new", staff))
            .with(ProtectedView::new("/students/upload", admin.clone()))
            .with(ProtectedView::new("/admin/users", admin))
    }

    /// Adds or replaces the declaration for `view.route`.
    #[must_use]
    pub fn with(mut self, view: ProtectedView) -> Self {
        self.declare(view);
        self
    }

    pub fn declare(&mut self, view: ProtectedView) {
        match self.views.iter_mut().find(|v| v.route == view.route) {
            Some(existing) => *existing = view,
            None => self.views.push(view),
        }
    }

    pub fn get(&self, route: &str) -> Option<&ProtectedView> {
        self.views.iter().find(|v| v.route == route)
    }

    pub fn views(&self) -> &[ProtectedView] {
        &self.views
    }

    /// Builds a guard for `route`. Undeclared routes get a guard that
    /// denies every context.
    pub fn guard<N: Navigator>(&self, route: &str, navigator: N) -> RouteGuard<N> {
        match self.get(route) {
            Some(view) => RouteGuard::new(view.clone(), navigator),
            None => {
                log::warn!(
                    target: "roster::guard",
                    "msg=\"undeclared route, denying\", route={route}"
                );
                RouteGuard::undeclared(route, navigator)
            }
        }
    }
}
