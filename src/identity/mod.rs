//! Identity provider boundary.
//!
//! The provider verifies credentials, issues bearer tokens and announces
//! sign-in / sign-out transitions. The authorization core only reads
//! sessions; it never creates or alters them.

#[cfg(feature = "gotrue")]
mod gotrue;
mod memory;
mod provider;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::secret::BearerToken;

#[cfg(feature = "gotrue")]
pub use gotrue::GoTrueIdentityProvider;
pub use memory::InMemoryIdentityProvider;
pub use provider::{IdentityProvider, TokenVerifier};

/// A user account as the identity provider knows it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque subject id.
    pub id: String,
    pub email: String,
}

impl Identity {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }
}

/// Proof of an authenticated identity, valid until `expires_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub identity: Identity,
    pub token: BearerToken,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Session change announced by an identity provider.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SignedIn(Session),
    SignedOut,
    /// Same identity, new token. Not a sign-in/sign-out transition.
    TokenRefreshed(Session),
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SignedIn(_) => "session.signed_in",
            Self::SignedOut => "session.signed_out",
            Self::TokenRefreshed(_) => "session.token_refreshed",
        }
    }

    /// Subject id of the session the event leaves in place.
    pub fn subject(&self) -> Option<&str> {
        match self {
            Self::SignedIn(session) | Self::TokenRefreshed(session) => {
                Some(session.identity.id.as_str())
            }
            Self::SignedOut => None,
        }
    }
}
