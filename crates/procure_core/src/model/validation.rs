//! Field validation shared by directory and PO records.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex")
});

/// Validation failure for user-supplied record fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required text field is blank after trim.
    BlankField(&'static str),
    /// E-mail address does not look like `local@domain.tld`.
    InvalidEmail(String),
    /// Quantity must be at least one.
    NonPositiveQuantity { line_no: u32 },
    /// A purchase order needs at least one line.
    EmptyLines,
    /// Money field must not be negative.
    NegativeAmount(&'static str),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "`{field}` must not be blank"),
            Self::InvalidEmail(value) => write!(f, "invalid e-mail address `{value}`"),
            Self::NonPositiveQuantity { line_no } => {
                write!(f, "line {line_no}: quantity must be at least 1")
            }
            Self::EmptyLines => write!(f, "purchase order must have at least one line"),
            Self::NegativeAmount(field) => write!(f, "`{field}` must not be negative"),
        }
    }
}

impl Error for ValidationError {}

/// Trims `value` and rejects blank input.
pub fn require_text(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::BlankField(field));
    }
    Ok(trimmed.to_string())
}

/// Trims optional text, mapping blank input to `None`.
pub fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Normalizes an e-mail address to lowercase and checks its shape.
pub fn normalize_email(value: &str) -> Result<String, ValidationError> {
    let trimmed = require_text("email", value)?;
    if !EMAIL_RE.is_match(&trimmed) {
        return Err(ValidationError::InvalidEmail(trimmed));
    }
    Ok(trimmed.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::{normalize_email, optional_text, require_text, ValidationError};

    #[test]
    fn email_is_lowercased_and_checked() {
        assert_eq!(
            normalize_email("  Ana.Cruz@Example.COM ").unwrap(),
            "ana.cruz@example.com"
        );
        assert!(matches!(
            normalize_email("no-at-sign.example.com"),
            Err(ValidationError::InvalidEmail(_))
        ));
        assert!(matches!(
            normalize_email("two words@example.com"),
            Err(ValidationError::InvalidEmail(_))
        ));
    }

    #[test]
    fn blank_text_is_rejected_and_optional_blank_is_none() {
        assert_eq!(
            require_text("name", "   "),
            Err(ValidationError::BlankField("name"))
        );
        assert_eq!(optional_text(Some("  ")), None);
        assert_eq!(optional_text(Some(" x ")).as_deref(), Some("x"));
    }
}
