//! Route guards.
//!
//! A guard decides, per protected route, whether to show a placeholder,
//! render the route's content or send the user to the sign-in view. It is a
//! UX measure only: the backend re-checks every request.
//!
//! | Context | [`GuardState`] |
//! |---------|----------------|
//! | `is_loading` | `Loading` |
//! | signed out | `Denied` |
//! | roles disjoint from a non-empty `allowed_roles` | `Denied` |
//! | otherwise | `Allowed` |

#[cfg(any(test, feature = "mocks"))]
mod navigator_mock;
mod routes;

use std::sync::Arc;

use tokio::sync::watch;

use crate::resolver::AuthorizationContext;
use crate::roles::RoleSet;

#[cfg(any(test, feature = "mocks"))]
pub use navigator_mock::RecordingNavigator;
pub use routes::RouteTable;

/// Public entry point denied users are sent to.
pub const SIGN_IN_ROUTE: &str = "/login";

/// A route and the roles allowed to see it. An empty role set admits any
/// signed-in identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedView {
    pub route: String,
    pub allowed_roles: RoleSet,
}

impl ProtectedView {
    pub fn new(route: impl Into<String>, allowed_roles: RoleSet) -> Self {
        Self {
            route: route.into(),
            allowed_roles,
        }
    }

    /// Any signed-in identity may see `route`.
    pub fn authenticated(route: impl Into<String>) -> Self {
        Self::new(route, RoleSet::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Loading,
    Denied,
    Allowed,
}

impl GuardState {
    pub fn is_settled(self) -> bool {
        !matches!(self, GuardState::Loading)
    }
}

/// Evaluates `view` against `context`.
pub fn evaluate(view: &ProtectedView, context: &AuthorizationContext) -> GuardState {
    if context.is_loading {
        return GuardState::Loading;
    }
    if context.identity.is_none() {
        return GuardState::Denied;
    }
    if view.allowed_roles.is_empty() || view.allowed_roles.intersects(&context.roles) {
        GuardState::Allowed
    } else {
        GuardState::Denied
    }
}

/// Performs client-side navigation.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &str);
}

impl<N: Navigator + ?Sized> Navigator for Arc<N> {
    fn navigate(&self, route: &str) {
        (**self).navigate(route);
    }
}

/// Result of [`RouteGuard::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered<T> {
    /// Show a neutral placeholder.
    Loading,
    /// Nothing rendered; the guard has sent the user to the sign-in view.
    Redirected,
    Content(T),
}

/// Stateful guard for one mounted protected route.
///
/// Remembers the last settled state so that a denial navigates to the
/// sign-in route once, not on every re-render. A new context version
/// restarts evaluation; the loading state in between does not count as
/// leaving `Denied`.
pub struct RouteGuard<N> {
    view: ProtectedView,
    navigator: N,
    sign_in_route: String,
    declared: bool,
    state: GuardState,
    settled: Option<GuardState>,
    version: Option<u64>,
}

impl<N: Navigator> RouteGuard<N> {
    pub fn new(view: ProtectedView, navigator: N) -> Self {
        Self {
            view,
            navigator,
            sign_in_route: SIGN_IN_ROUTE.to_owned(),
            declared: true,
            state: GuardState::Loading,
            settled: None,
            version: None,
        }
    }

    /// Guard for a route missing from the routing table. Denies every
    /// loaded context.
    pub fn undeclared(route: impl Into<String>, navigator: N) -> Self {
        Self {
            declared: false,
            ..Self::new(ProtectedView::authenticated(route), navigator)
        }
    }

    #[must_use]
    pub fn with_sign_in_route(mut self, route: impl Into<String>) -> Self {
        self.sign_in_route = route.into();
        self
    }

    pub fn view(&self) -> &ProtectedView {
        &self.view
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    /// Updates the guard from `context` and returns the new state.
    ///
    /// Entering `Denied` navigates to the sign-in route exactly once.
    pub fn observe(&mut self, context: &AuthorizationContext) -> GuardState {
        if self.version == Some(context.version) && self.state.is_settled() {
            return self.state;
        }

        let next = match evaluate(&self.view, context) {
            GuardState::Allowed if !self.declared => GuardState::Denied,
            state => state,
        };
        self.version = Some(context.version);
        self.state = next;

        if next.is_settled() {
            let previous = self.settled.replace(next);
            if next == GuardState::Denied && previous != Some(GuardState::Denied) {
                log::info!(
                    target: "roster::guard",
                    "msg=\"access denied, redirecting\", route={}, user_id={}",
                    self.view.route,
                    context.user_id().unwrap_or("-")
                );
                self.navigator.navigate(&self.sign_in_route);
            }
        }

        next
    }

    /// Renders the route for `context`. `children` runs only when the
    /// guard is `Allowed`.
    pub fn render<T, F>(&mut self, context: &AuthorizationContext, children: F) -> Rendered<T>
    where
        F: FnOnce() -> T,
    {
        match self.observe(context) {
            GuardState::Loading => Rendered::Loading,
            GuardState::Denied => Rendered::Redirected,
            GuardState::Allowed => Rendered::Content(children()),
        }
    }

    /// Follows `rx` until the guard settles and returns the settled state.
    ///
    /// If the resolver goes away while loading, the last state is returned.
    pub async fn follow(&mut self, rx: &mut watch::Receiver<AuthorizationContext>) -> GuardState {
        loop {
            let context = rx.borrow_and_update().clone();
            let state = self.observe(&context);
            if state.is_settled() || rx.changed().await.is_err() {
                return state;
            }
        }
    }
}

/// Waits until the published context has finished loading.
///
/// Returns the last published value if the resolver is dropped first.
pub async fn settled(rx: &mut watch::Receiver<AuthorizationContext>) -> AuthorizationContext {
    if let Ok(context) = rx.wait_for(|c| !c.is_loading).await {
        return context.clone();
    }
    rx.borrow().clone()
}
