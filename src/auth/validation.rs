//! Form validation for the sign-in screens
//!
//! Each validator returns the first problem found as a [`FieldError`]
//! whose message is shown inline; nothing here touches storage.

use crate::error::FieldError;
use regex::Regex;
use std::sync::OnceLock;

/// Minimum password length accepted at sign-up
pub const MIN_PASSWORD_LEN: usize = 6;

/// Message shown when a required field is blank
pub const MSG_FILL_ALL: &str = "Please fill in all fields.";
/// Message shown for a malformed email
pub const MSG_INVALID_EMAIL: &str = "Please enter a valid email address.";
/// Message shown for a short password
pub const MSG_SHORT_PASSWORD: &str = "Password must be at least 6 characters.";
/// Message shown when the confirmation differs
pub const MSG_PASSWORD_MISMATCH: &str = "Passwords do not match.";
/// Message shown when a social sign-in has no name
pub const MSG_NAME_REQUIRED: &str = "Please enter your name.";

/// Shown after a reset request whether or not the account exists
pub const RESET_LINK_NOTICE: &str = "If an account with that email exists, we've sent a password reset link to it. Please check your inbox.";

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
    })
}

/// True if `email` looks like an address
///
/// # Examples
///
/// ```
/// use westline::auth::validation::is_valid_email;
///
/// assert!(is_valid_email("ada@example.com"));
/// assert!(!is_valid_email("ada@example"));
/// ```
pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// Validate the login form
pub fn validate_login(email: &str, password: &str) -> Result<(), FieldError> {
    if email.trim().is_empty() {
        return Err(FieldError::new("email", MSG_FILL_ALL));
    }
    if password.is_empty() {
        return Err(FieldError::new("password", MSG_FILL_ALL));
    }
    Ok(())
}

/// Validate the sign-up form
pub fn validate_sign_up(
    name: &str,
    email: &str,
    password: &str,
    confirm_password: &str,
) -> Result<(), FieldError> {
    for (field, value) in [
        ("name", name.trim()),
        ("email", email.trim()),
        ("password", password),
        ("confirmPassword", confirm_password),
    ] {
        if value.is_empty() {
            return Err(FieldError::new(field, MSG_FILL_ALL));
        }
    }
    if !is_valid_email(email.trim()) {
        return Err(FieldError::new("email", MSG_INVALID_EMAIL));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(FieldError::new("password", MSG_SHORT_PASSWORD));
    }
    if password != confirm_password {
        return Err(FieldError::new("confirmPassword", MSG_PASSWORD_MISMATCH));
    }
    Ok(())
}

/// Validate the details a social provider hands back
pub fn validate_social(name: &str, email: &str) -> Result<(), FieldError> {
    if name.trim().is_empty() {
        return Err(FieldError::new("name", MSG_NAME_REQUIRED));
    }
    if !is_valid_email(email.trim()) {
        return Err(FieldError::new("email", MSG_INVALID_EMAIL));
    }
    Ok(())
}

/// Validate the forgot-password form
pub fn validate_forgot_password(email: &str) -> Result<(), FieldError> {
    if email.trim().is_empty() {
        return Err(FieldError::new("email", MSG_FILL_ALL));
    }
    Ok(())
}
