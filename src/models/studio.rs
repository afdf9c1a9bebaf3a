// src/models/studio.rs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::utils::validate::{founding_year_in_range, not_blank};

/// Represents the 'studios' table in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Studio {
    pub id: i64,
    pub name: String,
    pub founded_date: NaiveDate,
    pub description: String,
    pub country: String,
}

/// DTO for creating or fully replacing a studio.
#[derive(Debug, Deserialize, Validate)]
pub struct StudioRequest {
    #[validate(
        required(message = "This field is required."),
        length(max = 100, message = "Ensure this field has no more than 100 characters."),
        custom(function = not_blank)
    )]
    pub name: Option<String>,

    /// Only the year is constrained: 1950 up to the current year.
    #[validate(
        required(message = "This field is required."),
        custom(function = founding_year_in_range)
    )]
    pub founded_date: Option<NaiveDate>,

    #[validate(
        required(message = "This field is required."),
        custom(function = not_blank)
    )]
    pub description: Option<String>,

    #[validate(
        required(message = "This field is required."),
        length(max = 100, message = "Ensure this field has no more than 100 characters."),
        custom(function = not_blank)
    )]
    pub country: Option<String>,
}

/// DTO for a partial update.
#[derive(Debug, Deserialize)]
pub struct StudioPatch {
    pub name: Option<String>,
    pub founded_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub country: Option<String>,
}

impl StudioRequest {
    pub fn patched(current: &Studio, patch: StudioPatch) -> Self {
        Self {
            name: Some(patch.name.unwrap_or_else(|| current.name.clone())),
            founded_date: Some(patch.founded_date.unwrap_or(current.founded_date)),
            description: Some(
                patch
                    .description
                    .unwrap_or_else(|| current.description.clone()),
            ),
            country: Some(patch.country.unwrap_or_else(|| current.country.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(year: i32) -> StudioRequest {
        StudioRequest {
            name: Some("Epic Games".to_string()),
            founded_date: NaiveDate::from_ymd_opt(year, 1, 1),
            description: Some("Game studio".to_string()),
            country: Some("USA".to_string()),
        }
    }

    #[test]
    fn accepts_studio_founded_in_1991() {
        assert!(request(1991).validate().is_ok());
    }

    #[test]
    fn rejects_founding_year_before_1950() {
        let errors = request(1949).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("founded_date"));
    }

    #[test]
    fn missing_country_is_required() {
        let mut req = request(1991);
        req.country = None;
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("country"));
    }
}
