//! Form input checks shared by the workflows.

use std::sync::LazyLock;

use regex::Regex;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("email pattern is valid")
});

/// Basic shape check, not deliverability.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// True if every value is non-empty after trimming.
pub fn all_present(values: &[&str]) -> bool {
    values.iter().all(|v| !v.trim().is_empty())
}

/// Trim and lowercase, for identities compared case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// `Some(trimmed)` unless blank.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
