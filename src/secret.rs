//! Redacting wrappers for credentials.
//!
//! [`SecretString`] carries passwords and API keys, [`BearerToken`] carries
//! session tokens. Both print `[REDACTED]` from `Debug` and `Display` so they
//! can sit inside logged structs.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const BEARER_PREFIX: &str = "Bearer ";

/// A password or key that must not show up in logs.
///
/// ```rust
/// use roster::SecretString;
///
/// let password = SecretString::new("hunter22");
/// assert_eq!(format!("{password:?}"), "SecretString([REDACTED])");
/// assert_eq!(password.expose_secret(), "hunter22");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// An opaque session bearer token.
///
/// The value is only reachable through [`BearerToken::expose_secret`] or
/// [`BearerToken::header_value`], the latter producing the
/// `Authorization` header value.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BearerToken(String);

impl BearerToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// `Bearer <token>`, ready for an `Authorization` header.
    #[must_use]
    pub fn header_value(&self) -> String {
        format!("{BEARER_PREFIX}{}", self.0)
    }

    /// Parses an `Authorization` header value.
    ///
    /// Returns `None` unless the value uses the `Bearer` scheme with a
    /// non-empty token.
    pub fn from_header_value(value: &str) -> Option<Self> {
        let token = value.strip_prefix(BEARER_PREFIX)?.trim();
        if token.is_empty() {
            return None;
        }
        Some(Self(token.to_owned()))
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}

impl fmt::Display for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Serialize for BearerToken {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // tokens are returned to their owner in sign-in responses
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for BearerToken {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(BearerToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_string_redacted() {
        let secret = SecretString::new("my_password");
        assert_eq!(format!("{secret:?}"), "SecretString([REDACTED])");
        assert_eq!(format!("{secret}"), "[REDACTED]");
        assert_eq!(secret.expose_secret(), "my_password");
    }

    #[test]
    fn test_bearer_token_redacted() {
        let token = BearerToken::new("abc123");
        assert_eq!(format!("{token:?}"), "BearerToken([REDACTED])");
        assert_eq!(format!("{token}"), "[REDACTED]");
    }

    #[test]
    fn test_bearer_header_roundtrip() {
        let token = BearerToken::new("abc123");
        assert_eq!(token.header_value(), "Bearer abc123");

        let parsed = BearerToken::from_header_value(&token.header_value()).unwrap();
        assert_eq!(parsed, token);
    }

    #[test]
    fn test_bearer_header_rejects_other_schemes() {
        assert!(BearerToken::from_header_value("Basic dXNlcjpwYXNz").is_none());
        assert!(BearerToken::from_header_value("Bearer ").is_none());
        assert!(BearerToken::from_header_value("Bearer    ").is_none());
        assert!(BearerToken::from_header_value("bearer abc").is_none());
        assert!(BearerToken::from_header_value("").is_none());
    }

    #[test]
    fn test_bearer_token_json() {
        let token = BearerToken::new("abc123");
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, "\"abc123\"");

        let back: BearerToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
    }
}
