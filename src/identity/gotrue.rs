//! Supabase GoTrue identity provider.
//!
//! Password grant and logout go to the provider's REST API; the session is
//! held in memory for the lifetime of the value, the way a browser client
//! keeps it in local storage.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tokio::sync::broadcast;

use super::provider::{IdentityProvider, TokenVerifier};
use super::{Identity, Session, SessionEvent};
use crate::AuthError;
use crate::config::IdentityProviderConfig;
use crate::secret::{BearerToken, SecretString};

const APIKEY_HEADER: &str = "apikey";
const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
    user: UserResponse,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl UserResponse {
    fn into_identity(self) -> Identity {
        Identity::new(self.id, self.email.unwrap_or_default())
    }
}

struct Current {
    session: Session,
    refresh_token: Option<SecretString>,
}

/// GoTrue (Supabase Auth) client.
pub struct GoTrueIdentityProvider {
    http: reqwest::Client,
    base: Url,
    anon_key: Option<SecretString>,
    current: RwLock<Option<Current>>,
    events: broadcast::Sender<SessionEvent>,
}

fn poisoned<T>(_: T) -> AuthError {
    AuthError::Internal("Lock poisoned".to_owned())
}

fn expiry(expires_in: i64) -> Result<DateTime<Utc>, AuthError> {
    Duration::try_seconds(expires_in)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .ok_or_else(|| AuthError::Transport(format!("expires_in out of range: {expires_in}")))
}

impl GoTrueIdentityProvider {
    /// # Errors
    ///
    /// `AuthError::ConfigurationError` when the provider URL is unset.
    pub fn new(config: &IdentityProviderConfig) -> Result<Self, AuthError> {
        Self::with_client(config, reqwest::Client::new())
    }

    /// # Errors
    ///
    /// `AuthError::ConfigurationError` when the provider URL is unset.
    pub fn with_client(
        config: &IdentityProviderConfig,
        http: reqwest::Client,
    ) -> Result<Self, AuthError> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            http,
            base: config.url()?,
            anon_key: config.anon_key.clone(),
            current: RwLock::new(None),
            events,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        self.base
            .join(path)
            .map_err(|e| AuthError::ConfigurationError(format!("invalid provider url: {e}")))
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.anon_key {
            Some(key) => builder.header(APIKEY_HEADER, key.expose_secret()),
            None => builder,
        }
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<TokenResponse, AuthError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        let response = self
            .request(reqwest::Method::POST, url)
            .json(&body)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.json().await?),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                Err(AuthError::InvalidCredentials)
            }
            status => Err(AuthError::Http {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    fn store(&self, token: TokenResponse) -> Result<Session, AuthError> {
        let session = Session {
            expires_at: expiry(token.expires_in)?,
            identity: token.user.into_identity(),
            token: BearerToken::new(token.access_token),
        };

        *self.current.write().map_err(poisoned)? = Some(Current {
            session: session.clone(),
            refresh_token: token.refresh_token.map(SecretString::new),
        });

        Ok(session)
    }

    /// Exchanges the stored refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// `SessionUnavailable` without a refresh token, `InvalidCredentials`
    /// when the provider rejects it.
    pub async fn refresh_session(&self) -> Result<Session, AuthError> {
        let refresh_token = self
            .current
            .read()
            .map_err(poisoned)?
            .as_ref()
            .and_then(|c| c.refresh_token.clone())
            .ok_or(AuthError::SessionUnavailable)?;

        let token = self
            .token_grant(
                "refresh_token",
                serde_json::json!({ "refresh_token": refresh_token.expose_secret() }),
            )
            .await?;
        let session = self.store(token)?;

        let _ = self
            .events
            .send(SessionEvent::TokenRefreshed(session.clone()));

        Ok(session)
    }
}

#[async_trait]
impl IdentityProvider for GoTrueIdentityProvider {
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "gotrue.sign_in", skip_all, err)
    )]
    async fn sign_in(&self, email: &str, password: &SecretString) -> Result<Session, AuthError> {
        let token = self
            .token_grant(
                "password",
                serde_json::json!({ "email": email, "password": password.expose_secret() }),
            )
            .await?;
        let session = self.store(token)?;

        let _ = self.events.send(SessionEvent::SignedIn(session.clone()));

        log::info!(
            target: "roster_auth",
            "msg=\"sign in success\", provider=\"gotrue\", user_id={}",
            session.identity.id
        );

        Ok(session)
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "gotrue.sign_out", skip_all, err)
    )]
    async fn sign_out(&self) -> Result<(), AuthError> {
        let previous = self.current.write().map_err(poisoned)?.take();
        let Some(previous) = previous else {
            return Ok(());
        };

        let url = self.endpoint("auth/v1/logout")?;
        let result = self
            .request(reqwest::Method::POST, url)
            .header(
                reqwest::header::AUTHORIZATION,
                previous.session.token.header_value(),
            )
            .send()
            .await;

        // the local session is gone either way
        if let Err(err) = result {
            log::warn!(
                target: "roster_auth",
                "msg=\"remote sign out failed\", error=\"{err}\""
            );
        }

        let _ = self.events.send(SessionEvent::SignedOut);
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let session = self
            .current
            .read()
            .map_err(poisoned)?
            .as_ref()
            .map(|c| c.session.clone());

        match session {
            Some(session) if session.is_expired() => {
                self.current.write().map_err(poisoned)?.take();
                let _ = self.events.send(SessionEvent::SignedOut);
                Ok(None)
            }
            other => Ok(other),
        }
    }

    fn session_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl TokenVerifier for GoTrueIdentityProvider {
    async fn verify(&self, token: &BearerToken) -> Result<Identity, AuthError> {
        let url = self.endpoint("auth/v1/user")?;
        let response = self
            .request(reqwest::Method::GET, url)
            .header(reqwest::header::AUTHORIZATION, token.header_value())
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json::<UserResponse>().await?.into_identity()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AuthError::TokenInvalid),
            status => Err(AuthError::Http {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_url() {
        let result = GoTrueIdentityProvider::new(&IdentityProviderConfig::default());
        assert!(matches!(result, Err(AuthError::ConfigurationError(_))));
    }

    #[test]
    fn test_token_response_parses_gotrue_shape() {
        let body = r#"{
            "access_token": "jwt",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "r1",
            "user": {"id": "9f1c", "email": "student@school.edu", "aud": "authenticated"}
        }"#;

        let token: TokenResponse = serde_json::from_str(body).unwrap();
        assert_eq!(token.expires_in, 3600);
        assert_eq!(
            token.user.into_identity(),
            Identity::new("9f1c", "student@school.edu")
        );
    }

    #[test]
    fn test_out_of_range_expiry_is_rejected() {
        let config = IdentityProviderConfig {
            url: Some("http://localhost:54321".to_owned()),
            anon_key: None,
        };
        let idp = GoTrueIdentityProvider::new(&config).unwrap();

        for expires_in in [i64::MAX, i64::MIN, 10_000_000_000_000] {
            let token = TokenResponse {
                access_token: "jwt".to_owned(),
                refresh_token: None,
                expires_in,
                user: UserResponse {
                    id: "9f1c".to_owned(),
                    email: None,
                },
            };
            assert!(
                matches!(idp.store(token), Err(AuthError::Transport(_))),
                "expires_in {expires_in}"
            );
        }
        assert!(idp.current.read().unwrap().is_none());

        let at = expiry(3600).unwrap();
        assert!(at > Utc::now());
    }

    #[tokio::test]
    async fn test_signed_out_by_default() {
        let config = IdentityProviderConfig {
            url: Some("http://localhost:54321".to_owned()),
            anon_key: None,
        };
        let idp = GoTrueIdentityProvider::new(&config).unwrap();

        assert!(idp.get_session().await.unwrap().is_none());
        assert!(idp.sign_out().await.is_ok());
        assert_eq!(
            idp.refresh_session().await.unwrap_err(),
            AuthError::SessionUnavailable
        );
    }
}
