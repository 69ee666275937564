//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

use crate::models::{CreatePlaceRequest, SignupRequest, UpdatePlaceRequest};

const MIN_DESCRIPTION_LENGTH: usize = 5;
const MIN_PASSWORD_LENGTH: usize = 5;

fn require_non_empty(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", field));
    }
    Ok(())
}

/// Validate place title
pub fn validate_title(title: &str) -> Result<(), String> {
    require_non_empty("Title", title)
}

/// Validate place description
pub fn validate_description(description: &str) -> Result<(), String> {
    if description.trim().chars().count() < MIN_DESCRIPTION_LENGTH {
        return Err(format!(
            "Description must be at least {} characters long",
            MIN_DESCRIPTION_LENGTH
        ));
    }
    Ok(())
}

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Lowercase and trim an email, so `Test@test.com` and `test@test.com` are
/// the same account
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        ));
    }
    Ok(())
}

pub fn validate_create_place(request: &CreatePlaceRequest) -> Result<(), String> {
    validate_title(&request.title)?;
    validate_description(&request.description)?;
    require_non_empty("Address", &request.address)
}

pub fn validate_update_place(request: &UpdatePlaceRequest) -> Result<(), String> {
    validate_title(&request.title)?;
    validate_description(&request.description)
}

pub fn validate_signup(request: &SignupRequest) -> Result<(), String> {
    require_non_empty("Name", &request.name)?;
    validate_email(&normalize_email(&request.email))?;
    validate_password(&request.password)
}
