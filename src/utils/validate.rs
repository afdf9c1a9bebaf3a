// src/utils/validate.rs
//
// Field rules shared by the request DTOs.

use std::{borrow::Cow, sync::LazyLock};

use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;
use validator::{ValidateEmail, ValidationError};

pub const REQUIRED: &str = "This field is required.";

/// Earliest founding year accepted for a studio.
pub const MIN_FOUNDING_YEAR: i32 = 1950;

/// Letters, digits and `@ . + - _`.
pub static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").expect("username pattern compiles"));

fn error(code: &'static str, message: impl Into<Cow<'static, str>>) -> ValidationError {
    ValidationError::new(code).with_message(message.into())
}

pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(error("blank", "This field may not be blank."));
    }
    Ok(())
}

/// Email fields may be left blank; anything else must look like an address.
pub fn blank_or_email(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || value.validate_email() {
        return Ok(());
    }
    Err(error("email", "Enter a valid email address."))
}

pub fn founding_year_in_range(date: &NaiveDate) -> Result<(), ValidationError> {
    let current_year = Utc::now().year();
    if (MIN_FOUNDING_YEAR..=current_year).contains(&date.year()) {
        return Ok(());
    }
    Err(error(
        "founding_year",
        format!(
            "Founding year must be between {} and {}.",
            MIN_FOUNDING_YEAR, current_year
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_pattern() {
        assert!(USERNAME_RE.is_match("alice"));
        assert!(USERNAME_RE.is_match("a.l+i-c_e@x"));
        assert!(!USERNAME_RE.is_match("al ice"));
        assert!(!USERNAME_RE.is_match("alice!"));
    }

    #[test]
    fn blank_strings_rejected() {
        assert!(not_blank("x").is_ok());
        assert!(not_blank("   ").is_err());
    }

    #[test]
    fn email_may_be_blank() {
        assert!(blank_or_email("").is_ok());
        assert!(blank_or_email("alice@example.com").is_ok());
        assert!(blank_or_email("not-an-email").is_err());
    }

    #[test]
    fn founding_year_bounds() {
        let this_year = Utc::now().year();
        let date = |year| NaiveDate::from_ymd_opt(year, 1, 1).unwrap();

        assert!(founding_year_in_range(&date(1950)).is_ok());
        assert!(founding_year_in_range(&date(1991)).is_ok());
        assert!(founding_year_in_range(&date(this_year)).is_ok());
        assert!(founding_year_in_range(&date(1949)).is_err());
        assert!(founding_year_in_range(&date(this_year + 1)).is_err());
    }
}
