//! Validation helpers for DTOs.

use validator::ValidationError;

const MAX_USER_ID_LEN: usize = 64;
const MAX_USERNAME_LEN: usize = 24;
const MAX_CHAT_LEN: usize = 500;
const MAX_ADVERSARIES: i64 = 8;

/// Validates a client-provided stable identifier.
///
/// Identifiers are 1 to 64 ASCII alphanumeric characters, dashes or underscores.
///
/// # Examples
///
/// ```ignore
/// validate_user_id("3f2a-91c0")  // Ok
/// validate_user_id("")           // Err - empty
/// validate_user_id("a b")        // Err - space
/// ```
pub fn validate_user_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_USER_ID_LEN {
        let mut err = ValidationError::new("user_id_length");
        err.message = Some(
            format!(
                "User ID must be between 1 and {MAX_USER_ID_LEN} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        let mut err = ValidationError::new("user_id_format");
        err.message =
            Some("User ID must contain only ASCII letters, digits, '-' or '_'".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a display name: non-blank, at most 24 characters, no control characters.
pub fn validate_username(name: &str) -> Result<(), ValidationError> {
    let count = name.chars().count();
    if name.trim().is_empty() || count > MAX_USERNAME_LEN {
        let mut err = ValidationError::new("username_length");
        err.message = Some(
            format!("Username must be between 1 and {MAX_USERNAME_LEN} characters (got {count})")
                .into(),
        );
        return Err(err);
    }

    if name.chars().any(char::is_control) {
        let mut err = ValidationError::new("username_format");
        err.message = Some("Username must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a chat line: non-blank and at most 500 characters.
pub fn validate_chat_message(message: &str) -> Result<(), ValidationError> {
    let count = message.chars().count();
    if message.trim().is_empty() || count > MAX_CHAT_LEN {
        let mut err = ValidationError::new("chat_length");
        err.message = Some(
            format!("Chat messages must be between 1 and {MAX_CHAT_LEN} characters (got {count})")
                .into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Validates the configured adversary count: `-1` for automatic, otherwise 1 to 8.
pub fn validate_adversary_count(count: i64) -> Result<(), ValidationError> {
    if count == -1 || (1..=MAX_ADVERSARIES).contains(&count) {
        return Ok(());
    }

    let mut err = ValidationError::new("num_mafia_range");
    err.message = Some(
        format!(
            "Mafia count must be -1 (automatic) or between 1 and {MAX_ADVERSARIES} (got {count})"
        )
        .into(),
    );
    Err(err)
}
