use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{Identity, Session, SessionEvent};
use crate::AuthError;
use crate::secret::{BearerToken, SecretString};

/// Client-side view of an identity provider.
///
/// Implementations hold at most one active session, the way a browser
/// holds one signed-in user.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Verifies credentials and makes the resulting session current.
    ///
    /// Emits [`SessionEvent::SignedIn`] on success.
    async fn sign_in(&self, email: &str, password: &SecretString) -> Result<Session, AuthError>;

    /// Ends the current session. Does nothing when signed out.
    ///
    /// Emits [`SessionEvent::SignedOut`] if a session was active.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Returns the current unexpired session, if any.
    async fn get_session(&self) -> Result<Option<Session>, AuthError>;

    /// Stream of session changes from now on.
    fn session_events(&self) -> broadcast::Receiver<SessionEvent>;
}

/// Server-side bearer token check.
#[async_trait]
pub trait TokenVerifier: Send + Sync + 'static {
    /// Resolves a bearer token to the identity it was issued for.
    ///
    /// # Errors
    ///
    /// `TokenInvalid` for unknown tokens, `TokenExpired` for expired ones.
    async fn verify(&self, token: &BearerToken) -> Result<Identity, AuthError>;
}

#[async_trait]
impl<T: TokenVerifier + ?Sized> TokenVerifier for Arc<T> {
    async fn verify(&self, token: &BearerToken) -> Result<Identity, AuthError> {
        (**self).verify(token).await
    }
}
