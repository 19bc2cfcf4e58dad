use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Sign-in form.
#[derive(Serialize, Deserialize, Validate)]
pub struct SignInRequest {
    #[garde(email)]
    pub email: String,
    #[garde(length(min = 1, max = 128))]
    pub password: String,
}

/// Sign-up form.
#[derive(Serialize, Deserialize, Validate)]
pub struct SignUpRequest {
    #[garde(email)]
    pub email: String,
    #[garde(length(min = 8, max = 128), custom(password_policy))]
    pub password: String,
    #[garde(length(min = 1, max = 100))]
    pub first_name: String,
    #[garde(length(min = 1, max = 100))]
    pub last_name: String,
}

/// Password change form. Both fields stay out of `Debug` output.
#[derive(Serialize, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[garde(length(min = 1, max = 128))]
    pub current_password: String,
    #[garde(length(min = 8, max = 128), custom(password_policy))]
    pub new_password: String,
}

impl std::fmt::Debug for ChangePasswordRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangePasswordRequest").finish_non_exhaustive()
    }
}

impl std::fmt::Debug for SignInRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignInRequest").field("email", &self.email).finish_non_exhaustive()
    }
}

impl std::fmt::Debug for SignUpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignUpRequest")
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish_non_exhaustive()
    }
}

fn password_policy(value: &str, _ctx: &()) -> garde::Result {
    validate_password(value).map_err(|e| garde::Error::new(e.to_string()))
}

/// Validates a new password: upper case, lower case and a digit.
///
/// # Arguments
///
/// * `password` - The password to validate.
///
/// # Returns
///
/// A `Result<()>` indicating whether the password is valid.
pub fn validate_password(password: &str) -> Result<()> {
    if password.len() < 8 {
        return Err(AppError::Validation(
            "Password must be at least 8 characters long".to_string(),
        ));
    }

    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(AppError::Validation(
            "Password must contain at least one uppercase letter".to_string(),
        ));
    }

    if !password.chars().any(|c| c.is_lowercase()) {
        return Err(AppError::Validation(
            "Password must contain at least one lowercase letter".to_string(),
        ));
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation(
            "Password must contain at least one digit".to_string(),
        ));
    }

    Ok(())
}
