//! Role-based access control and session authorization for the student
//! records dashboard.
//!
//! The crate is split along the path a request takes:
//!
//! | Module | Role |
//! |--------|------|
//! | [`identity`] | identity provider boundary (sign-in, sessions, change events) |
//! | [`lookup`] | role lookup against the backend `GET /auth/user` endpoint |
//! | [`resolver`] | produces and distributes the [`AuthorizationContext`] |
//! | [`guard`] | decides render / placeholder / redirect per protected route |
//! | [`navigation`] | filters the navigation menu by the current roles |
//! | [`client`] | bearer-authenticated resource API client |
//! | [`roles`] | role names, role sets and the permission policy |
//! | [`store`] | server-side role and student storage |
//! | [`api`] | server-side role lookup, role administration and student routes |
//!
//! The client-side guard only avoids flashing content a user cannot use.
//! The backend re-checks every request and stays the enforcement boundary.

pub mod api;
pub mod client;
pub mod config;
pub mod crypto;
pub mod guard;
pub mod identity;
pub mod lookup;
pub mod navigation;
pub mod resolver;
pub mod roles;
pub mod secret;
pub mod store;
pub mod validators;

use std::fmt;

pub use client::ResourceClient;
pub use config::{BackendConfig, IdentityProviderConfig, RosterConfig, SessionConfig};
pub use guard::{GuardState, Navigator, ProtectedView, Rendered, RouteGuard, RouteTable};
pub use identity::{
    Identity, IdentityProvider, InMemoryIdentityProvider, Session, SessionEvent, TokenVerifier,
};
pub use lookup::{HttpRoleLookup, RoleLookup, RoleLookupResponse};
pub use navigation::{NavEntry, NavigationTable};
pub use resolver::{AuthorizationContext, AuthorizationResolver, ContextListener, Subscription};
pub use roles::{DashboardAction, DashboardResource, Role, RolePolicy, RoleSet};
pub use secret::{BearerToken, SecretString};
pub use store::{RoleRepository, StudentRepository, UserRecord};

#[cfg(any(test, feature = "mocks"))]
pub use guard::RecordingNavigator;
#[cfg(any(test, feature = "mocks"))]
pub use lookup::MockRoleLookup;
#[cfg(any(test, feature = "mocks"))]
pub use store::{MockRoleRepository, MockStudentRepository};

#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    /// No active session exists for the caller.
    SessionUnavailable,
    /// Fetching roles failed; the resolver turns this into an empty role set.
    RoleLookupFailed(String),
    /// The resolved roles do not include any role the action requires.
    Forbidden,
    /// Required endpoint configuration is missing or malformed.
    ConfigurationError(String),
    InvalidCredentials,
    InvalidEmail,
    TokenInvalid,
    TokenExpired,
    UserAlreadyExists,
    NotFound,
    Validation(String),
    PasswordHashError,
    /// The backend answered with a status the client has no mapping for.
    Http {
        status: u16,
        message: String,
    },
    Transport(String),
    Internal(String),
}

impl std::error::Error for AuthError {}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::SessionUnavailable => write!(f, "No active session"),
            AuthError::RoleLookupFailed(msg) => write!(f, "Role lookup failed: {msg}"),
            AuthError::Forbidden => write!(f, "Access denied"),
            AuthError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
            AuthError::InvalidCredentials => write!(f, "Invalid email or password"),
            AuthError::InvalidEmail => write!(f, "Invalid email format"),
            AuthError::TokenInvalid => write!(f, "Invalid token"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::UserAlreadyExists => write!(f, "User already exists"),
            AuthError::NotFound => write!(f, "Resource not found"),
            AuthError::Validation(msg) => write!(f, "Validation error: {msg}"),
            AuthError::PasswordHashError => write!(f, "Failed to hash password"),
            AuthError::Http { status, message } => {
                write!(f, "Request failed with status {status}: {message}")
            }
            AuthError::Transport(msg) => write!(f, "Transport error: {msg}"),
            AuthError::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(AuthError::SessionUnavailable.to_string(), "No active session");
        assert_eq!(
            AuthError::RoleLookupFailed("status 500".to_owned()).to_string(),
            "Role lookup failed: status 500"
        );
        assert_eq!(
            AuthError::ConfigurationError("backend url is not set".to_owned()).to_string(),
            "Configuration error: backend url is not set"
        );
        assert_eq!(
            AuthError::Http {
                status: 502,
                message: "bad gateway".to_owned()
            }
            .to_string(),
            "Request failed with status 502: bad gateway"
        );
    }
}
