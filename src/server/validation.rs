use std::sync::LazyLock;

use regex::Regex;

use crate::server::response::{ApiError, FieldErrors};

pub const MAX_TEXT_LEN: usize = 150;
pub const MIN_YEAR: i64 = 1850;
pub const MAX_YEAR: i64 = 2050;
const ADS_PREFIX: &str = "https://ui.adsabs.harvard.edu/";

static DOI_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".*(10[.][\d.]*[/].*)$").expect("valid DOI pattern"));

/// Collects per-field messages for one request.
#[derive(Debug, Default)]
pub struct Validator {
    fields: FieldErrors,
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Records the error of `result` under `field`, passing the value through.
    pub fn check<T>(&mut self, field: &str, result: Result<T, String>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(message) => {
                self.error(field, message);
                None
            }
        }
    }

    pub fn length(&mut self, field: &str, value: &str, min: usize, max: usize) {
        let len = value.chars().count();
        if len < min || len > max {
            self.error(
                field,
                format!("Field must be between {min} and {max} characters long."),
            );
        }
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.fields.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation(self.fields))
        }
    }
}

/// Extracts the bare DOI from a submitted value, e.g. a doi.org URL.
/// With `nodoi` the value is kept as a URL instead.
pub fn normalize_doi(raw: &str, nodoi: bool) -> Result<String, String> {
    let value = raw.trim();
    if nodoi {
        return if value.starts_with("https://") {
            Ok(value.to_string())
        } else {
            Err("Invalid URL".to_string())
        };
    }

    DOI_PATTERN
        .captures(value)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| "Invalid DOI".to_string())
}

pub fn validate_ads(ads: &str) -> Result<(), String> {
    if ads.is_empty() || ads.starts_with(ADS_PREFIX) {
        Ok(())
    } else {
        Err("Invalid ADS".to_string())
    }
}

pub fn validate_year(year: i64) -> Result<i64, String> {
    if (MIN_YEAR..=MAX_YEAR).contains(&year) {
        Ok(year)
    } else {
        Err(format!("Number must be between {MIN_YEAR} and {MAX_YEAR}."))
    }
}

/// Capitalises an element symbol: `"pd"` becomes `"Pd"`.
pub fn normalize_element(raw: &str) -> Result<String, String> {
    let value = raw.trim();
    let mut chars = value.chars();
    let element: String = match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    };

    let len = element.chars().count();
    if (1..=2).contains(&len) {
        Ok(element)
    } else {
        Err(format!("Invalid element symbol (\"{element}\")"))
    }
}

/// Parses a comma separated list of element symbols.
pub fn parse_elements(raw: &str) -> Result<Vec<String>, String> {
    raw.split(',').map(normalize_element).collect()
}

/// Canonical stored form of an email address. Accounts are matched on it.
#[must_use]
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> Result<(), String> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err("Invalid email address.".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doi_is_extracted() {
        assert_eq!(
            normalize_doi("something/10.1234/test", false).unwrap(),
            "10.1234/test"
        );
        assert_eq!(
            normalize_doi(" https://doi.org/10.1093/mnras/stab123 ", false).unwrap(),
            "10.1093/mnras/stab123"
        );
        assert_eq!(normalize_doi("10.1/x", false).unwrap(), "10.1/x");
    }

    #[test]
    fn test_doi_without_pattern_is_rejected() {
        assert_eq!(
            normalize_doi("https://www.citation.com/page", false).unwrap_err(),
            "Invalid DOI"
        );
        assert!(normalize_doi("", false).is_err());
    }

    #[test]
    fn test_nodoi_keeps_url() {
        assert_eq!(
            normalize_doi("https://www.citation.com/page ", true).unwrap(),
            "https://www.citation.com/page"
        );
        assert!(normalize_doi("www.citation.com/page", true).is_err());
    }

    #[test]
    fn test_ads() {
        assert!(validate_ads("").is_ok());
        assert!(validate_ads("https://ui.adsabs.harvard.edu/abs/2020ApJ").is_ok());
        assert!(validate_ads("https://example.com").is_err());
    }

    #[test]
    fn test_year_range() {
        assert!(validate_year(1850).is_ok());
        assert!(validate_year(2050).is_ok());
        assert!(validate_year(1849).is_err());
        assert!(validate_year(2051).is_err());
    }

    #[test]
    fn test_elements() {
        assert_eq!(normalize_element("pd").unwrap(), "Pd");
        assert_eq!(normalize_element(" RU ").unwrap(), "Ru");
        assert_eq!(normalize_element("c").unwrap(), "C");
        assert!(normalize_element("").is_err());
        assert_eq!(
            normalize_element("abc").unwrap_err(),
            "Invalid element symbol (\"Abc\")"
        );
        assert_eq!(parse_elements("cd, ru,Mo").unwrap(), vec!["Cd", "Ru", "Mo"]);
        assert!(parse_elements("cd,,ru").is_err());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Admin@Lab.org "), "admin@lab.org");
        assert_eq!(normalize_email("a@test.com"), "a@test.com");
    }

    #[test]
    fn test_email() {
        assert!(validate_email("a@test.com").is_ok());
        assert!(validate_email("a@test").is_err());
        assert!(validate_email("@test.com").is_err());
        assert!(validate_email("a b@test.com").is_err());
    }

    #[test]
    fn test_validator_collects_fields() {
        let mut v = Validator::new();
        v.length("authors", "", 1, MAX_TEXT_LEN);
        let year = v.check("year", validate_year(1700));
        assert!(year.is_none());

        let err = v.finish().unwrap_err();
        assert_eq!(err.fields.len(), 2);
        assert!(err.fields.contains_key("authors"));
    }
}
