// src/models/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::utils::validate::{USERNAME_RE, blank_or_email, not_blank};

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,

    /// Unique username.
    pub username: String,

    /// Argon2 password hash. Never serialized.
    pub password: String,

    pub email: String,
    pub first_name: String,
    pub last_name: String,

    /// Grants write access to the catalog and to other accounts.
    pub is_staff: bool,

    pub date_joined: DateTime<Utc>,
}

/// DTO for self-service registration.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        required(message = "This field is required."),
        length(max = 150, message = "Ensure this field has no more than 150 characters."),
        custom(function = not_blank),
        regex(
            path = *USERNAME_RE,
            message = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
        )
    )]
    pub username: Option<String>,

    #[validate(
        required(message = "This field is required."),
        length(min = 8, message = "Ensure this field has at least 8 characters.")
    )]
    pub password: Option<String>,

    #[serde(default)]
    #[validate(custom(function = blank_or_email))]
    pub email: String,

    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub first_name: String,

    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub last_name: String,
}

/// What registration echoes back: everything but the password.
#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl From<User> for RegisteredUser {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
        }
    }
}

/// DTO for obtaining a token pair.
#[derive(Debug, Deserialize, Validate)]
pub struct TokenRequest {
    #[validate(required(message = "This field is required."))]
    pub username: Option<String>,
    #[validate(required(message = "This field is required."))]
    pub password: Option<String>,
}

/// DTO for exchanging a refresh token for a new access token.
#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(required(message = "This field is required."))]
    pub refresh: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub refresh: String,
    pub access: String,
}

/// Which user representation a reader gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewShape {
    Extended,
    Short,
}

/// Staff see every field, everyone else the short form.
pub fn view_shape(is_staff: bool) -> ViewShape {
    if is_staff {
        ViewShape::Extended
    } else {
        ViewShape::Short
    }
}

#[derive(Debug, Serialize)]
pub struct UserExtended {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_staff: bool,
    pub favorite_games: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct UserShort {
    pub username: String,
    pub favorite_games: Vec<i64>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum UserView {
    Extended(UserExtended),
    Short(UserShort),
}

impl UserView {
    pub fn render(shape: ViewShape, user: User, favorite_games: Vec<i64>) -> Self {
        match shape {
            ViewShape::Extended => UserView::Extended(UserExtended {
                id: user.id,
                username: user.username,
                first_name: user.first_name,
                last_name: user.last_name,
                email: user.email,
                is_staff: user.is_staff,
                favorite_games,
            }),
            ViewShape::Short => UserView::Short(UserShort {
                username: user.username,
                favorite_games,
            }),
        }
    }
}

/// Response body of the toggle-favorite action.
#[derive(Debug, Serialize)]
pub struct ToggleFavoriteResponse {
    pub is_favorite: bool,
    pub user: UserShort,
}

/// DTO for staff creating or fully replacing an account.
#[derive(Debug, Deserialize, Validate)]
pub struct UserRequest {
    #[validate(
        required(message = "This field is required."),
        length(max = 150, message = "Ensure this field has no more than 150 characters."),
        custom(function = not_blank),
        regex(
            path = *USERNAME_RE,
            message = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
        )
    )]
    pub username: Option<String>,

    /// Required on create; on update, absent means unchanged.
    #[validate(length(min = 8, message = "Ensure this field has at least 8 characters."))]
    pub password: Option<String>,

    #[serde(default)]
    #[validate(custom(function = blank_or_email))]
    pub email: String,

    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub first_name: String,

    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub last_name: String,

    #[serde(default)]
    pub is_staff: bool,

    /// Replaces the whole favorites set when present.
    pub favorite_games: Option<Vec<i64>>,
}

/// DTO for a partial account update.
#[derive(Debug, Deserialize)]
pub struct UserPatch {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_staff: Option<bool>,
    pub favorite_games: Option<Vec<i64>>,
}

impl UserRequest {
    pub fn patched(current: &User, patch: UserPatch) -> Self {
        Self {
            username: Some(patch.username.unwrap_or_else(|| current.username.clone())),
            password: patch.password,
            email: patch.email.unwrap_or_else(|| current.email.clone()),
            first_name: patch.first_name.unwrap_or_else(|| current.first_name.clone()),
            last_name: patch.last_name.unwrap_or_else(|| current.last_name.clone()),
            is_staff: patch.is_staff.unwrap_or(current.is_staff),
            favorite_games: patch.favorite_games,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(username: Option<&str>, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.map(String::from),
            password: Some(password.to_string()),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
        }
    }

    #[test]
    fn password_of_eight_characters_is_accepted() {
        assert!(register(Some("testuser123"), "12345678").validate().is_ok());
    }

    #[test]
    fn password_of_seven_characters_is_rejected() {
        let errors = register(Some("testuser123"), "1234567").validate().unwrap_err();
        let field_errors = errors.field_errors();
        let messages: Vec<_> = field_errors["password"]
            .iter()
            .filter_map(|e| e.message.as_deref())
            .collect();
        assert_eq!(messages, vec!["Ensure this field has at least 8 characters."]);
    }

    #[test]
    fn missing_username_is_named() {
        let errors = register(None, "password123").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("username"));
    }

    #[test]
    fn username_with_spaces_is_rejected() {
        let errors = register(Some("bad name"), "password123").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("username"));
    }

    #[test]
    fn invalid_email_is_rejected_blank_is_not() {
        let mut req = register(Some("alice"), "password123");
        req.email = "nope".to_string();
        assert!(req.validate().unwrap_err().field_errors().contains_key("email"));
        req.email = String::new();
        assert!(req.validate().is_ok());
    }

    fn sample_user(is_staff: bool) -> User {
        User {
            id: 3,
            username: "alice".to_string(),
            password: "$argon2id$hash".to_string(),
            email: "alice@example.com".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Liddell".to_string(),
            is_staff,
            date_joined: Utc::now(),
        }
    }

    #[test]
    fn view_shape_follows_staff_flag() {
        assert_eq!(view_shape(true), ViewShape::Extended);
        assert_eq!(view_shape(false), ViewShape::Short);
    }

    #[test]
    fn short_view_hides_personal_fields() {
        let view = UserView::render(ViewShape::Short, sample_user(false), vec![1, 2]);
        let json = serde_json::to_value(view).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "username": "alice", "favorite_games": [1, 2] })
        );
    }

    #[test]
    fn extended_view_never_contains_password() {
        let view = UserView::render(ViewShape::Extended, sample_user(true), vec![]);
        let json = serde_json::to_value(view).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["is_staff"], true);
        assert_eq!(json["email"], "alice@example.com");
        assert!(json.get("password").is_none());
    }

    #[test]
    fn patch_keeps_unspecified_fields() {
        let current = sample_user(false);
        let patch = UserPatch {
            username: None,
            password: None,
            email: Some("new@example.com".to_string()),
            first_name: None,
            last_name: None,
            is_staff: Some(true),
            favorite_games: None,
        };
        let merged = UserRequest::patched(&current, patch);
        assert_eq!(merged.username.as_deref(), Some("alice"));
        assert_eq!(merged.email, "new@example.com");
        assert_eq!(merged.first_name, "Alice");
        assert!(merged.is_staff);
        assert!(merged.password.is_none());
    }
}
