use async_trait::async_trait;
use reqwest::{StatusCode, Url};

use super::{RoleLookup, RoleLookupResponse};
use crate::AuthError;
use crate::config::BackendConfig;
use crate::secret::BearerToken;

const AUTH_USER_PATH: &str = "auth/user";

/// [`RoleLookup`] over HTTP.
///
/// ```rust
/// use roster::config::BackendConfig;
/// use roster::{AuthError, HttpRoleLookup};
///
/// let missing = HttpRoleLookup::new(&BackendConfig::default());
/// assert!(matches!(missing, Err(AuthError::ConfigurationError(_))));
///
/// let config = BackendConfig { base_url: Some("http://localhost:5000/api".into()) };
/// let lookup = HttpRoleLookup::new(&config).unwrap();
/// assert_eq!(lookup.endpoint().as_str(), "http://localhost:5000/api/auth/user");
/// ```
#[derive(Debug, Clone)]
pub struct HttpRoleLookup {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpRoleLookup {
    /// # Errors
    ///
    /// `AuthError::ConfigurationError` when the backend URL is unset.
    pub fn new(config: &BackendConfig) -> Result<Self, AuthError> {
        Self::with_client(config, reqwest::Client::new())
    }

    /// # Errors
    ///
    /// `AuthError::ConfigurationError` when the backend URL is unset.
    pub fn with_client(config: &BackendConfig, http: reqwest::Client) -> Result<Self, AuthError> {
        let endpoint = config
            .base_url()?
            .join(AUTH_USER_PATH)
            .map_err(|e| AuthError::ConfigurationError(format!("invalid backend url: {e}")))?;

        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl RoleLookup for HttpRoleLookup {
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "role_lookup", skip_all, err)
    )]
    async fn lookup(&self, token: &BearerToken) -> Result<RoleLookupResponse, AuthError> {
        let response = self
            .http
            .get(self.endpoint.clone())
            .header(reqwest::header::AUTHORIZATION, token.header_value())
            .send()
            .await
            .map_err(|e| AuthError::RoleLookupFailed(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(AuthError::RoleLookupFailed(format!("status {}", status.as_u16())));
        }

        response
            .json::<RoleLookupResponse>()
            .await
            .map_err(|e| AuthError::RoleLookupFailed(format!("invalid body: {e}")))
    }
}
