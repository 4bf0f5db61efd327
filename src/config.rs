//! Configuration types for the roster authorization layer.
//!
//! The backend base URL and the identity provider credentials come from the
//! environment. A missing backend URL is not a startup failure: it is kept as
//! `None` and reported as [`AuthError::ConfigurationError`] by whichever call
//! needs it.
//!
//! # Example
//!
//! ```rust
//! use roster::config::{RosterConfig, SessionConfig};
//! use chrono::Duration;
//!
//! // Use defaults
//! let config = RosterConfig::default();
//! assert!(config.backend.base_url().is_err());
//!
//! // Or customize
//! let config = RosterConfig {
//!     session: SessionConfig {
//!         token_expiry: Duration::minutes(30),
//!         ..Default::default()
//!     },
//!     ..RosterConfig::development()
//! };
//! assert!(config.backend.base_url().is_ok());
//! ```

use chrono::Duration;
use reqwest::Url;

use crate::AuthError;
use crate::secret::SecretString;

pub const BACKEND_URL_VAR: &str = "ROSTER_BACKEND_URL";
pub const IDP_URL_VAR: &str = "ROSTER_IDP_URL";
pub const IDP_ANON_KEY_VAR: &str = "ROSTER_IDP_ANON_KEY";

/// Top-level configuration.
#[derive(Debug, Clone, Default)]
pub struct RosterConfig {
    /// Where the REST API (role lookup and resource endpoints) lives.
    pub backend: BackendConfig,

    /// Identity provider endpoint and credentials.
    pub identity: IdentityProviderConfig,

    /// Session lifetime settings for providers that issue their own tokens.
    pub session: SessionConfig,
}

impl RosterConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Local development settings: backend and identity provider on localhost.
    pub fn development() -> Self {
        Self {
            backend: BackendConfig {
                base_url: Some("http://localhost:5000/api".to_owned()),
            },
            identity: IdentityProviderConfig {
                url: Some("http://localhost:54321".to_owned()),
                anon_key: None,
            },
            session: SessionConfig {
                token_expiry: Duration::hours(24),
                ..SessionConfig::default()
            },
        }
    }

    /// Reads configuration from the process environment.
    ///
    /// Unset or blank variables are left as `None`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        Self {
            backend: BackendConfig {
                base_url: read(BACKEND_URL_VAR),
            },
            identity: IdentityProviderConfig {
                url: read(IDP_URL_VAR),
                anon_key: read(IDP_ANON_KEY_VAR).map(SecretString::new),
            },
            session: SessionConfig::default(),
        }
    }
}

/// Backend REST API location.
#[derive(Debug, Clone, Default)]
pub struct BackendConfig {
    /// Base URL, e.g. `https://dashboard.example.com/api`.
    pub base_url: Option<String>,
}

impl BackendConfig {
    /// Returns the parsed base URL.
    ///
    /// # Errors
    ///
    /// `AuthError::ConfigurationError` when the URL is unset or unparseable.
    pub fn base_url(&self) -> Result<Url, AuthError> {
        let raw = self.base_url.as_deref().ok_or_else(|| {
            AuthError::ConfigurationError(format!("{BACKEND_URL_VAR} is not set"))
        })?;
        parse_base_url(raw)
    }
}

/// Identity provider location and public key.
#[derive(Debug, Clone, Default)]
pub struct IdentityProviderConfig {
    pub url: Option<String>,

    /// Public (anon) key sent as the `apikey` header.
    pub anon_key: Option<SecretString>,
}

impl IdentityProviderConfig {
    /// Returns the parsed provider URL.
    ///
    /// # Errors
    ///
    /// `AuthError::ConfigurationError` when the URL is unset or unparseable.
    pub fn url(&self) -> Result<Url, AuthError> {
        let raw = self
            .url
            .as_deref()
            .ok_or_else(|| AuthError::ConfigurationError(format!("{IDP_URL_VAR} is not set")))?;
        parse_base_url(raw)
    }
}

/// Session lifetime settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long issued bearer tokens remain valid.
    ///
    /// Default: 1 hour
    pub token_expiry: Duration,

    /// Length of generated tokens (in characters).
    ///
    /// Default: 32
    pub token_length: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_expiry: Duration::hours(1),
            token_length: 32,
        }
    }
}

/// Parses a base URL and guarantees a trailing slash so that `Url::join`
/// appends paths instead of replacing the last segment.
fn parse_base_url(raw: &str) -> Result<Url, AuthError> {
    let normalized = if raw.ends_with('/') {
        raw.to_owned()
    } else {
        format!("{raw}/")
    };

    let url = Url::parse(&normalized)
        .map_err(|e| AuthError::ConfigurationError(format!("invalid url {raw:?}: {e}")))?;

    if url.cannot_be_a_base() {
        return Err(AuthError::ConfigurationError(format!(
            "url {raw:?} cannot be used as a base"
        )));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = RosterConfig::default();

        assert!(config.backend.base_url.is_none());
        assert!(config.identity.url.is_none());
        assert_eq!(config.session.token_expiry, Duration::hours(1));
        assert_eq!(config.session.token_length, 32);
    }

    #[test]
    fn test_missing_backend_url_is_configuration_error() {
        let config = RosterConfig::default();

        match config.backend.base_url() {
            Err(AuthError::ConfigurationError(msg)) => assert!(msg.contains(BACKEND_URL_VAR)),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (BACKEND_URL_VAR, "https://dashboard.example.com/api"),
            (IDP_URL_VAR, "https://idp.example.com"),
            (IDP_ANON_KEY_VAR, "anon-key"),
        ]);

        let config = RosterConfig::from_lookup(|key| vars.get(key).map(|v| (*v).to_owned()));

        let url = config.backend.base_url().unwrap();
        assert_eq!(url.as_str(), "https://dashboard.example.com/api/");
        assert_eq!(
            url.join("auth/user").unwrap().as_str(),
            "https://dashboard.example.com/api/auth/user"
        );
        assert_eq!(
            config.identity.anon_key.as_ref().unwrap().expose_secret(),
            "anon-key"
        );
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = RosterConfig::from_lookup(|key| {
            (key == BACKEND_URL_VAR).then(|| "   ".to_owned())
        });

        assert!(config.backend.base_url.is_none());
    }

    #[test]
    fn test_invalid_url_is_configuration_error() {
        let backend = BackendConfig {
            base_url: Some("not a url".to_owned()),
        };

        assert!(matches!(
            backend.base_url(),
            Err(AuthError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_development_config() {
        let config = RosterConfig::development();

        assert!(config.backend.base_url().is_ok());
        assert!(config.identity.url().is_ok());
        assert_eq!(config.session.token_expiry, Duration::hours(24));
    }
}
