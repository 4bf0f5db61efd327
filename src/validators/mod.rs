//! Input validation for credentials and role names.

mod email;
mod password;

pub use email::validate_email;
pub use password::{MAX_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH, validate_new_password, validate_password};

use crate::AuthError;

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmailEmpty,
    EmailTooLong,
    EmailInvalidFormat,
    PasswordEmpty,
    PasswordTooShort,
    PasswordTooLong,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmailEmpty => write!(f, "Email cannot be empty"),
            Self::EmailTooLong => write!(f, "Email is too long (max 254 characters)"),
            Self::EmailInvalidFormat => write!(f, "Invalid email format"),
            Self::PasswordEmpty => write!(f, "Password cannot be empty"),
            Self::PasswordTooShort => {
                write!(f, "Password must be at least {MIN_PASSWORD_LENGTH} characters")
            }
            Self::PasswordTooLong => {
                write!(f, "Password is too long (max {MAX_PASSWORD_LENGTH} characters)")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for AuthError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::EmailEmpty
            | ValidationError::EmailTooLong
            | ValidationError::EmailInvalidFormat => AuthError::InvalidEmail,
            other => AuthError::Validation(other.to_string()),
        }
    }
}
