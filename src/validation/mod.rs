use serde::Serialize;
use std::fmt;
use url::Url;

pub const CUSTOMER_ID_MAX_LEN: usize = 64;
pub const PRODUCT_CODE_MAX_LEN: usize = 64;
pub const STATUS_MAX_LEN: usize = 32;
pub const REDIRECT_URL_MAX_LEN: usize = 2048;
pub const ALLOWED_URL_SCHEMES: &[&str] = &["http", "https"];
pub const NAME_MIN_LEN: usize = 3;
pub const NAME_MAX_LEN: usize = 50;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 64;
pub const PASSWORD_SPECIALS: &str = "!@#$%^&*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

/// Collects every failing check instead of stopping at the first.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, result: ValidationResult) -> &mut Self {
        if let Err(err) = result {
            self.errors.push(err);
        }
        self
    }

    pub fn finish(self) -> Result<(), Vec<ValidationError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_enum(field: &'static str, value: &str, allowed: &[&str]) -> ValidationResult {
    if allowed.iter().all(|candidate| value != *candidate) {
        return Err(ValidationError::new(
            field,
            format!("must be one of: {}", allowed.join(", ")),
        ));
    }

    Ok(())
}

pub fn validate_redirect_url(field: &'static str, value: &str) -> ValidationResult {
    validate_required(field, value)?;
    validate_max_len(field, value, REDIRECT_URL_MAX_LEN)?;

    let parsed =
        Url::parse(value).map_err(|_| ValidationError::new(field, "must be a valid URL"))?;
    validate_enum(field, parsed.scheme(), ALLOWED_URL_SCHEMES)?;

    if parsed.host_str().is_none() {
        return Err(ValidationError::new(field, "must include a host"));
    }

    Ok(())
}

pub fn validate_positive(field: &'static str, value: i64) -> ValidationResult {
    if value <= 0 {
        return Err(ValidationError::new(field, "must be greater than zero"));
    }

    Ok(())
}

pub fn validate_email(field: &'static str, value: &str) -> ValidationResult {
    validate_required(field, value)?;
    let mut parts = value.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();
    if local.is_empty() || !domain.contains('.') || domain.starts_with('.') {
        return Err(ValidationError::new(field, "must be a valid email address"));
    }

    Ok(())
}

pub fn validate_len_between(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> ValidationResult {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ValidationError::new(
            field,
            format!("must be between {} and {} characters", min, max),
        ));
    }

    Ok(())
}

/// Length bounds plus at least one upper-case letter, lower-case letter,
/// digit and one of `PASSWORD_SPECIALS`.
pub fn validate_password(field: &'static str, value: &str) -> ValidationResult {
    validate_len_between(field, value, PASSWORD_MIN_LEN, PASSWORD_MAX_LEN)?;

    let complete = value.chars().any(|c| c.is_ascii_uppercase())
        && value.chars().any(|c| c.is_ascii_lowercase())
        && value.chars().any(|c| c.is_ascii_digit())
        && value.chars().any(|c| PASSWORD_SPECIALS.contains(c));
    if !complete {
        return Err(ValidationError::new(
            field,
            format!(
                "must mix upper and lower case letters, digits and one of {}",
                PASSWORD_SPECIALS
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn validates_max_len() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
    }

    #[test]
    fn validates_enum_values() {
        assert!(validate_enum("scope", "verify-email", &["verify-email"]).is_ok());
        assert!(validate_enum("scope", "login", &["verify-email"]).is_err());
    }

    #[test]
    fn sanitizes_string() {
        assert_eq!(sanitize_string("  PLN\t20K  "), "PLN 20K");
        assert_eq!(sanitize_string(" \n "), "");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
    }

    #[test]
    fn validates_redirect_url() {
        assert!(validate_redirect_url("success_redirect_url", "https://shop.test/ok").is_ok());
        assert!(validate_redirect_url("success_redirect_url", "ftp://shop.test/ok").is_err());
        assert!(validate_redirect_url("success_redirect_url", "not a url").is_err());
        assert!(validate_redirect_url("success_redirect_url", "").is_err());
    }

    #[test]
    fn validates_email() {
        assert!(validate_email("email", "buyer@payoll.test").is_ok());
        assert!(validate_email("email", "buyer@localhost").is_err());
        assert!(validate_email("email", "@payoll.test").is_err());
    }

    #[test]
    fn validates_password_strength() {
        assert!(validate_password("password", "Secr3t!pass").is_ok());
        assert!(validate_password("password", "S3t!a").is_err());
        assert!(validate_password("password", "secr3t!pass").is_err());
        assert!(validate_password("password", "Secret!pass").is_err());
        assert!(validate_password("password", "Secr3tpass").is_err());
    }

    #[test]
    fn validates_len_between() {
        assert!(validate_len_between("name", "Ann", 3, 50).is_ok());
        assert!(validate_len_between("name", "An", 3, 50).is_err());
    }

    #[test]
    fn validator_collects_all_failures() {
        let mut v = Validator::new();
        v.check(validate_required("customer_id", ""))
            .check(validate_required("product_code", ""))
            .check(validate_positive("price", 10));
        let errors = v.finish().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "customer_id");
        assert_eq!(errors[1].field, "product_code");
    }
}
