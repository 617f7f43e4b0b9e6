//! Local checks that run before any provider is contacted.

use std::sync::OnceLock;

use regex::Regex;

use super::error::AuthError;
use crate::models::SignUpRequest;

pub const MIN_PASSWORD_LENGTH: usize = 8;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?)+$")
            .expect("email pattern is valid")
    })
}

pub fn validate_email(email: &str) -> Result<(), AuthError> {
    if email.trim().is_empty() {
        return Err(AuthError::Validation("Email is required".to_string()));
    }
    if !email_regex().is_match(email.trim()) {
        return Err(AuthError::Validation("Invalid email address".to_string()));
    }
    Ok(())
}

/// Password policy: minimum length, lower and upper case, a digit and a
/// special character. Every violated rule is reported.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let mut problems = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        problems.push(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        ));
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        problems.push("Password must contain a lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        problems.push("Password must contain an uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        problems.push("Password must contain a digit".to_string());
    }
    if !password.chars().any(|c| !c.is_alphanumeric()) {
        problems.push("Password must contain a special character".to_string());
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(AuthError::Validation(problems.join(", ")))
    }
}

pub fn validate_sign_in(email: &str, password: &str) -> Result<(), AuthError> {
    validate_email(email)?;
    if password.is_empty() {
        return Err(AuthError::Validation("Password is required".to_string()));
    }
    Ok(())
}

pub fn validate_sign_up(request: &SignUpRequest) -> Result<(), AuthError> {
    if request.name.trim().is_empty() {
        return Err(AuthError::Validation("Name is required".to_string()));
    }
    validate_email(&request.email)?;
    validate_password(&request.password)?;
    if request.confirm_password != request.password {
        return Err(AuthError::Validation("Passwords do not match".to_string()));
    }
    Ok(())
}
