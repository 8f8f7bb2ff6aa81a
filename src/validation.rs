use crate::error::{AppError, AppResult};

// =============================================================================
// Field Limits
// =============================================================================

/// Maximum length for usernames.
pub const MAX_USERNAME_LENGTH: usize = 32;

/// Minimum length for usernames.
pub const MIN_USERNAME_LENGTH: usize = 3;

/// Maximum length for passwords.
///
/// Bounded to keep Argon2 hashing time predictable on oversized input.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Minimum length for passwords.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum length for display names.
pub const MAX_FULL_NAME_LENGTH: usize = 128;

/// Maximum length for email addresses, per RFC 5321 path limits.
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Validate a login name.
///
/// Accepted names are 3 to 32 characters, start and end alphanumeric, and
/// otherwise mix ASCII alphanumerics with dots, underscores, or hyphens;
/// two separators in a row are rejected.
pub fn validate_username(username: &str) -> AppResult<()> {
    if username.len() < MIN_USERNAME_LENGTH {
        return Err(AppError::Validation(format!(
            "Username must be at least {MIN_USERNAME_LENGTH} characters"
        )));
    }

    if username.len() > MAX_USERNAME_LENGTH {
        return Err(AppError::Validation(format!(
            "Username cannot exceed {MAX_USERNAME_LENGTH} characters"
        )));
    }

    let chars: Vec<char> = username.chars().collect();

    if !chars.first().is_some_and(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::Validation(
            "Username must start with an alphanumeric character".to_string(),
        ));
    }

    if !chars.last().is_some_and(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::Validation(
            "Username must end with an alphanumeric character".to_string(),
        ));
    }

    let mut prev_special = false;
    for (i, &c) in chars.iter().enumerate() {
        let is_special = c == '.' || c == '_' || c == '-';

        if !c.is_ascii_alphanumeric() && !is_special {
            return Err(AppError::Validation(format!(
                "Username contains invalid character '{c}' at position {i}. \
                 Only alphanumeric characters, dots, underscores, and hyphens are allowed"
            )));
        }

        // Separators must not repeat
        if is_special && prev_special {
            return Err(AppError::Validation(format!(
                "Username cannot contain consecutive special characters at position {i}"
            )));
        }

        prev_special = is_special;
    }

    Ok(())
}

/// Validate a password.
///
/// Accepted passwords are 8 to 128 characters with no control characters.
/// Length is measured in characters, not bytes, so non-ASCII passwords are
/// not penalized.
pub fn validate_password(password: &str) -> AppResult<()> {
    let length = password.chars().count();

    if length < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    if length > MAX_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "Password cannot exceed {MAX_PASSWORD_LENGTH} characters"
        )));
    }

    if let Some(pos) = password.chars().position(char::is_control) {
        return Err(AppError::Validation(format!(
            "Password contains invalid control character at position {pos}"
        )));
    }

    Ok(())
}

/// Validate a display name.
///
/// Anything printable up to 128 characters is fine, as long as it is not
/// empty or all whitespace. Control characters are rejected.
pub fn validate_full_name(full_name: &str) -> AppResult<()> {
    if full_name.trim().is_empty() {
        return Err(AppError::Validation(
            "Display name cannot be empty".to_string(),
        ));
    }

    if full_name.chars().count() > MAX_FULL_NAME_LENGTH {
        return Err(AppError::Validation(format!(
            "Display name cannot exceed {MAX_FULL_NAME_LENGTH} characters"
        )));
    }

    if full_name.chars().any(char::is_control) {
        return Err(AppError::Validation(
            "Display name cannot contain control characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate an email address.
///
/// A shape check, not RFC 5322 parsing: exactly one `@` with a non-empty
/// local part and a domain containing at least one dot. Deliverability is
/// the mail system's problem.
pub fn validate_email(email: &str) -> AppResult<()> {
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(AppError::Validation(format!(
            "Email cannot exceed {MAX_EMAIL_LENGTH} characters"
        )));
    }

    let mut parts = email.split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => (local, domain),
        _ => {
            return Err(AppError::Validation(
                "Email must contain exactly one '@'".to_string(),
            ));
        }
    };

    if local.is_empty() || domain.is_empty() {
        return Err(AppError::Validation(
            "Email local part and domain cannot be empty".to_string(),
        ));
    }

    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(AppError::Validation(
            "Email domain is not valid".to_string(),
        ));
    }

    if email.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(AppError::Validation(
            "Email cannot contain whitespace or control characters".to_string(),
        ));
    }

    Ok(())
}
