//! In-memory identity provider.
//!
//! Suitable for development, tests and single-process demos. Accounts and
//! issued tokens are lost when the process exits.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;

use super::provider::{IdentityProvider, TokenVerifier};
use super::{Identity, Session, SessionEvent};
use crate::AuthError;
use crate::config::SessionConfig;
use crate::crypto::{Argon2Hasher, generate_token, hash_token};
use crate::secret::{BearerToken, SecretString};
use crate::validators::{validate_email, validate_new_password, validate_password};

const EVENT_CAPACITY: usize = 16;

struct Account {
    identity: Identity,
    hashed_password: String,
}

struct IssuedToken {
    identity: Identity,
    expires_at: chrono::DateTime<Utc>,
}

struct Inner {
    accounts: RwLock<HashMap<String, Account>>,
    // keyed by sha-256 of the token
    tokens: RwLock<HashMap<String, IssuedToken>>,
    current: RwLock<Option<Session>>,
    events: broadcast::Sender<SessionEvent>,
    hasher: Argon2Hasher,
    config: SessionConfig,
}

/// Identity provider backed by in-process maps.
///
/// Cloning is cheap; clones share state. Implements both
/// [`IdentityProvider`] (one current session, like a browser) and
/// [`TokenVerifier`] (every issued, unexpired token verifies).
#[derive(Clone)]
pub struct InMemoryIdentityProvider {
    inner: Arc<Inner>,
}

fn poisoned<T>(_: T) -> AuthError {
    AuthError::Internal("Lock poisoned".to_owned())
}

fn prune(tokens: &mut HashMap<String, IssuedToken>, now: chrono::DateTime<Utc>) -> usize {
    let before = tokens.len();
    tokens.retain(|_, issued| issued.expires_at > now);
    before - tokens.len()
}

impl InMemoryIdentityProvider {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_hasher(config, Argon2Hasher::default())
    }

    pub fn with_hasher(config: SessionConfig, hasher: Argon2Hasher) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                accounts: RwLock::new(HashMap::new()),
                tokens: RwLock::new(HashMap::new()),
                current: RwLock::new(None),
                events,
                hasher,
                config,
            }),
        }
    }

    /// Registers an account and returns its identity.
    ///
    /// # Errors
    ///
    /// `InvalidEmail`, `Validation` for weak passwords, `UserAlreadyExists`.
    pub fn create_account(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Identity, AuthError> {
        validate_email(email)?;
        validate_new_password(password.expose_secret())?;

        let key = email.to_lowercase();
        let hashed_password = self.inner.hasher.hash(password.expose_secret())?;

        let mut accounts = self.inner.accounts.write().map_err(poisoned)?;
        if accounts.contains_key(&key) {
            return Err(AuthError::UserAlreadyExists);
        }

        let identity = Identity::new(format!("usr_{}", generate_token(20)), email);
        accounts.insert(
            key,
            Account {
                identity: identity.clone(),
                hashed_password,
            },
        );
        drop(accounts);

        log::info!(
            target: "roster_auth",
            "msg=\"account created\", user_id={}",
            identity.id
        );

        Ok(identity)
    }

    /// Replaces the current session's token without changing identity.
    ///
    /// # Errors
    ///
    /// `SessionUnavailable` when signed out.
    pub fn refresh_session(&self) -> Result<Session, AuthError> {
        let current = self
            .inner
            .current
            .read()
            .map_err(poisoned)?
            .clone()
            .ok_or(AuthError::SessionUnavailable)?;

        let session = self.issue(current.identity)?;
        self.revoke(&current.token)?;
        *self.inner.current.write().map_err(poisoned)? = Some(session.clone());

        let _ = self
            .inner
            .events
            .send(SessionEvent::TokenRefreshed(session.clone()));

        Ok(session)
    }

    /// Number of tokens that would still verify.
    pub fn active_tokens(&self) -> usize {
        let now = Utc::now();
        self.inner
            .tokens
            .read()
            .map(|tokens| tokens.values().filter(|t| t.expires_at > now).count())
            .unwrap_or(0)
    }

    /// Forgets every token past its expiry and returns how many went.
    ///
    /// [`sign_in`](IdentityProvider::sign_in) and
    /// [`refresh_session`](Self::refresh_session) prune as they issue, so
    /// this is only needed to reclaim memory between sign-ins.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip(self), name = "prune_expired")
    )]
    pub fn prune_expired(&self) -> usize {
        match self.inner.tokens.write() {
            Ok(mut tokens) => prune(&mut tokens, Utc::now()),
            Err(_) => 0,
        }
    }

    fn issue(&self, identity: Identity) -> Result<Session, AuthError> {
        let token = generate_token(self.inner.config.token_length);
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.inner.config.token_expiry)
            .ok_or_else(|| AuthError::ConfigurationError("token_expiry out of range".to_owned()))?;

        let mut tokens = self.inner.tokens.write().map_err(poisoned)?;
        let pruned = prune(&mut tokens, now);
        if pruned > 0 {
            log::debug!(
                target: "roster_auth",
                "msg=\"expired tokens pruned\", count={pruned}"
            );
        }

        tokens.insert(
            hash_token(&token),
            IssuedToken {
                identity: identity.clone(),
                expires_at,
            },
        );

        Ok(Session {
            identity,
            token: BearerToken::new(token),
            expires_at,
        })
    }

    fn revoke(&self, token: &BearerToken) -> Result<(), AuthError> {
        self.inner
            .tokens
            .write()
            .map_err(poisoned)?
            .remove(&hash_token(token.expose_secret()));
        Ok(())
    }
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "sign_in", skip_all, err)
    )]
    async fn sign_in(&self, email: &str, password: &SecretString) -> Result<Session, AuthError> {
        if validate_email(email).is_err() || validate_password(password.expose_secret()).is_err()
        {
            return Err(AuthError::InvalidCredentials);
        }

        let (identity, hashed_password) = {
            let accounts = self.inner.accounts.read().map_err(poisoned)?;
            let account = accounts
                .get(&email.to_lowercase())
                .ok_or(AuthError::InvalidCredentials)?;
            (account.identity.clone(), account.hashed_password.clone())
        };

        if !self
            .inner
            .hasher
            .verify(password.expose_secret(), &hashed_password)?
        {
            log::info!(
                target: "roster_auth",
                "msg=\"sign in failed\", reason=\"invalid password\""
            );
            return Err(AuthError::InvalidCredentials);
        }

        // a replaced session's token stays valid until expiry
        let session = self.issue(identity)?;
        *self.inner.current.write().map_err(poisoned)? = Some(session.clone());

        let _ = self.inner.events.send(SessionEvent::SignedIn(session.clone()));

        log::info!(
            target: "roster_auth",
            "msg=\"sign in success\", user_id={}",
            session.identity.id
        );

        Ok(session)
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "sign_out", skip_all, err)
    )]
    async fn sign_out(&self) -> Result<(), AuthError> {
        let previous = self.inner.current.write().map_err(poisoned)?.take();

        if let Some(previous) = previous {
            self.revoke(&previous.token)?;
            let _ = self.inner.events.send(SessionEvent::SignedOut);

            log::info!(
                target: "roster_auth",
                "msg=\"sign out success\", user_id={}",
                previous.identity.id
            );
        }

        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let current = self.inner.current.read().map_err(poisoned)?.clone();

        match current {
            Some(session) if session.is_expired() => {
                self.inner.current.write().map_err(poisoned)?.take();
                self.revoke(&session.token)?;
                let _ = self.inner.events.send(SessionEvent::SignedOut);
                Ok(None)
            }
            other => Ok(other),
        }
    }

    fn session_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }
}

#[async_trait]
impl TokenVerifier for InMemoryIdentityProvider {
    async fn verify(&self, token: &BearerToken) -> Result<Identity, AuthError> {
        let tokens = self.inner.tokens.read().map_err(poisoned)?;
        let issued = tokens
            .get(&hash_token(token.expose_secret()))
            .ok_or(AuthError::TokenInvalid)?;

        if issued.expires_at <= Utc::now() {
            return Err(AuthError::TokenExpired);
        }

        Ok(issued.identity.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn provider() -> InMemoryIdentityProvider {
        InMemoryIdentityProvider::with_hasher(SessionConfig::default(), Argon2Hasher::fast())
    }

    fn password() -> SecretString {
        SecretString::new("password123")
    }

    #[tokio::test]
    async fn test_sign_in_success() {
        let idp = provider();
        let identity = idp.create_account("student@school.edu", &password()).unwrap();

        let session = idp.sign_in("student@school.edu", &password()).await.unwrap();

        assert_eq!(session.identity, identity);
        assert_eq!(idp.get_session().await.unwrap(), Some(session.clone()));
        assert_eq!(idp.verify(&session.token).await.unwrap(), identity);
    }

    #[tokio::test]
    async fn test_sign_in_is_case_insensitive_on_email() {
        let idp = provider();
        idp.create_account("Student@School.edu", &password()).unwrap();

        assert!(idp.sign_in("student@school.edu", &password()).await.is_ok());
    }

    #[tokio::test]
    async fn test_sign_in_wrong_password() {
        let idp = provider();
        idp.create_account("student@school.edu", &password()).unwrap();

        let result = idp
            .sign_in("student@school.edu", &SecretString::new("wrongpassword"))
            .await;

        assert_eq!(result.unwrap_err(), AuthError::InvalidCredentials);
        assert!(idp.get_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_unknown_or_malformed_email() {
        let idp = provider();

        assert_eq!(
            idp.sign_in("nobody@school.edu", &password()).await.unwrap_err(),
            AuthError::InvalidCredentials
        );
        assert_eq!(
            idp.sign_in("not-an-email", &password()).await.unwrap_err(),
            AuthError::InvalidCredentials
        );
    }

    #[test]
    fn test_create_account_validation() {
        let idp = provider();

        assert_eq!(
            idp.create_account("bad", &password()).unwrap_err(),
            AuthError::InvalidEmail
        );
        assert!(matches!(
            idp.create_account("a@school.edu", &SecretString::new("short")),
            Err(AuthError::Validation(_))
        ));

        idp.create_account("a@school.edu", &password()).unwrap();
        assert_eq!(
            idp.create_account("A@school.edu", &password()).unwrap_err(),
            AuthError::UserAlreadyExists
        );
    }

    #[tokio::test]
    async fn test_sign_out_revokes_token_and_emits_event() {
        let idp = provider();
        idp.create_account("student@school.edu", &password()).unwrap();
        let mut events = idp.session_events();

        let session = idp.sign_in("student@school.edu", &password()).await.unwrap();
        idp.sign_out().await.unwrap();

        assert!(matches!(events.recv().await.unwrap(), SessionEvent::SignedIn(_)));
        assert_eq!(events.recv().await.unwrap(), SessionEvent::SignedOut);
        assert!(idp.get_session().await.unwrap().is_none());
        assert_eq!(
            idp.verify(&session.token).await.unwrap_err(),
            AuthError::TokenInvalid
        );
    }

    #[tokio::test]
    async fn test_sign_out_when_signed_out_is_silent() {
        let idp = provider();
        let mut events = idp.session_events();

        idp.sign_out().await.unwrap();

        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_refresh_keeps_identity_and_rotates_token() {
        let idp = provider();
        idp.create_account("student@school.edu", &password()).unwrap();
        let first = idp.sign_in("student@school.edu", &password()).await.unwrap();
        let mut events = idp.session_events();

        let second = idp.refresh_session().unwrap();

        assert_eq!(first.identity, second.identity);
        assert_ne!(first.token, second.token);
        assert!(idp.verify(&first.token).await.is_err());
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::TokenRefreshed(_)
        ));
        assert_eq!(idp.active_tokens(), 1);
    }

    #[tokio::test]
    async fn test_expired_session_reads_as_signed_out() {
        let config = SessionConfig {
            token_expiry: Duration::seconds(-1),
            ..SessionConfig::default()
        };
        let idp = InMemoryIdentityProvider::with_hasher(config, Argon2Hasher::fast());
        idp.create_account("student@school.edu", &password()).unwrap();

        let session = idp.sign_in("student@school.edu", &password()).await.unwrap();

        assert_eq!(
            idp.verify(&session.token).await.unwrap_err(),
            AuthError::TokenExpired
        );
        assert!(idp.get_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_tokens_do_not_accumulate() {
        let config = SessionConfig {
            token_expiry: Duration::seconds(-1),
            ..SessionConfig::default()
        };
        let idp = InMemoryIdentityProvider::with_hasher(config, Argon2Hasher::fast());
        idp.create_account("student@school.edu", &password()).unwrap();

        for _ in 0..5 {
            idp.sign_in("student@school.edu", &password()).await.unwrap();
            idp.refresh_session().unwrap();
        }

        // only the token issued last is left
        assert_eq!(idp.inner.tokens.read().unwrap().len(), 1);
        assert_eq!(idp.active_tokens(), 0);

        assert_eq!(idp.prune_expired(), 1);
        assert!(idp.inner.tokens.read().unwrap().is_empty());
        assert_eq!(idp.prune_expired(), 0);
    }

    #[tokio::test]
    async fn test_pruning_keeps_live_tokens() {
        let idp = provider();
        idp.create_account("student@school.edu", &password()).unwrap();
        let first = idp.sign_in("student@school.edu", &password()).await.unwrap();
        let second = idp.sign_in("student@school.edu", &password()).await.unwrap();

        assert_eq!(idp.prune_expired(), 0);
        assert!(idp.verify(&first.token).await.is_ok());
        assert!(idp.verify(&second.token).await.is_ok());
        assert_eq!(idp.active_tokens(), 2);
    }

    #[tokio::test]
    async fn test_unknown_token_is_invalid() {
        let idp = provider();
        assert_eq!(
            idp.verify(&BearerToken::new("nope")).await.unwrap_err(),
            AuthError::TokenInvalid
        );
    }
}
