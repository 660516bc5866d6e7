use std::sync::LazyLock;

use email_address::EmailAddress;
use regex::Regex;
use url::Url;

use crate::errors::ValidationIssue;

static USERNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._]{3,30}$").expect("username pattern compiles"));

/// Longest caption accepted on a post, in characters.
pub const MAX_CAPTION_CHARS: usize = 2200;
/// Longest comment body accepted, in characters.
pub const MAX_COMMENT_CHARS: usize = 1000;
/// Longest full name accepted, in characters.
pub const MAX_FULLNAME_CHARS: usize = 80;

/// Returns `true` if the provided string is a syntactically valid email address.
pub fn is_valid_email(value: &str) -> bool {
    EmailAddress::is_valid(value)
}

/// Returns `true` if the provided string parses as a URL with a scheme.
pub fn is_valid_url(value: &str) -> bool {
    Url::parse(value).is_ok()
}

/// Usernames are 3-30 characters of letters, digits, `.` and `_`.
pub fn is_valid_username(value: &str) -> bool {
    USERNAME_PATTERN.is_match(value)
}

/// Checks a free-text field against a character bound, pushing issues into `issues`.
pub fn check_text(field: &str, value: &str, max_chars: usize, required: bool, issues: &mut Vec<ValidationIssue>) {
    if required && value.trim().is_empty() {
        issues.push(ValidationIssue::new(field, "validation.required", "value must not be blank"));
    }
    if value.chars().count() > max_chars {
        issues.push(ValidationIssue::new(
            field,
            "validation.length",
            format!("length must be at most {max_chars}"),
        ));
    }
}
