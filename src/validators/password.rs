use super::ValidationError;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Checks a password submitted at sign-in.
///
/// Only shape is checked here; strength rules apply to new passwords.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::PasswordEmpty);
    }

    if password.chars().count() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooLong);
    }

    Ok(())
}

/// Checks a password chosen at account creation.
pub fn validate_new_password(password: &str) -> Result<(), ValidationError> {
    validate_password(password)?;

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_in_password() {
        assert!(validate_password("x").is_ok());
        assert_eq!(validate_password(""), Err(ValidationError::PasswordEmpty));
        assert_eq!(
            validate_password(&"a".repeat(129)),
            Err(ValidationError::PasswordTooLong)
        );
    }

    #[test]
    fn test_new_password() {
        assert!(validate_new_password("password123").is_ok());
        assert_eq!(
            validate_new_password("short"),
            Err(ValidationError::PasswordTooShort)
        );
    }
}
