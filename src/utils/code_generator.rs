//! Short code generation and validation utilities.
//!
//! Generated codes come from a content+time salted SHA-256 digest. They are not
//! checked for uniqueness here: the unique constraint on `short_code` in the
//! durable store is the only authority.

use crate::error::AppError;
use chrono::Utc;
use regex::Regex;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

/// Length of generated short codes.
pub const GENERATED_CODE_LENGTH: usize = 5;

pub const MIN_CUSTOM_CODE_LENGTH: usize = 5;
pub const MAX_CUSTOM_CODE_LENGTH: usize = 64;

/// Codes that would shadow top-level routes.
const RESERVED_CODES: &[&str] = &["api", "health", "metrics", "origin"];

static CUSTOM_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static regex is valid"));

/// Generates a short code for `original_url`, salted with the current
/// nanosecond timestamp.
///
/// # Examples
///
/// ```ignore
/// let code = generate_code("https://example.com");
/// assert_eq!(code.len(), 5);
/// assert!(code.chars().all(|c| c.is_ascii_hexdigit()));
/// ```
pub fn generate_code(original_url: &str) -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    generate_code_with_salt(original_url, nanos)
}

fn generate_code_with_salt(original_url: &str, salt: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(original_url.as_bytes());
    hasher.update(salt.to_string().as_bytes());

    let mut code = hex::encode(hasher.finalize());
    code.truncate(GENERATED_CODE_LENGTH);
    code
}

/// Validates a user-provided custom short code.
///
/// # Rules
///
/// - Length: 5-64 characters
/// - Allowed characters: ASCII letters, digits, `-` and `_`
/// - Cannot be a reserved route name
///
/// # Errors
///
/// Returns [`AppError::InvalidCustomCode`] if any rule is violated.
pub fn validate_custom_code(code: &str) -> Result<(), AppError> {
    if code.len() < MIN_CUSTOM_CODE_LENGTH {
        return Err(AppError::invalid_custom_code(
            "Invalid length of the custom short code",
            json!({ "provided_length": code.len(), "min_length": MIN_CUSTOM_CODE_LENGTH }),
        ));
    }

    if code.len() > MAX_CUSTOM_CODE_LENGTH {
        return Err(AppError::invalid_custom_code(
            "Custom short code is too long",
            json!({ "provided_length": code.len(), "max_length": MAX_CUSTOM_CODE_LENGTH }),
        ));
    }

    if !CUSTOM_CODE_REGEX.is_match(code) {
        return Err(AppError::invalid_custom_code(
            "Custom short code can only contain letters, digits, hyphens and underscores",
            json!({ "code": code }),
        ));
    }

    if RESERVED_CODES.contains(&code) {
        return Err(AppError::invalid_custom_code(
            "This code is reserved",
            json!({ "code": code }),
        ));
    }

    Ok(())
}
