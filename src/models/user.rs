//! User and role models
//!
//! Accounts carry one of three roles (`admin`, `editor`, `user`) stored by
//! name in the `roles` table, plus an `active`/`banned` status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::InvalidValue;

/// User entity representing a registered account.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address (unique)
    pub email: String,
    /// bcrypt hash, never serialized
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub full_name: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    /// User role
    #[sqlx(try_from = "String")]
    pub role: UserRole,
    /// User status (active/banned)
    #[sqlx(try_from = "String")]
    pub status: UserStatus,
    pub last_login_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Check if the user is an administrator
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Editors and admins manage the catalog
    pub fn is_editor(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::Editor)
    }

    /// Check if the user is banned
    pub fn is_banned(&self) -> bool {
        self.status == UserStatus::Banned
    }
}

/// User role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Users, analytics and everything editors can do
    Admin,
    /// Books, tutorials, categories and courses
    Editor,
    /// Regular reader
    #[default]
    User,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Editor => "editor",
            UserRole::User => "user",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "editor" => Ok(UserRole::Editor),
            "user" => Ok(UserRole::User),
            _ => Err(InvalidValue::new("user role", s)),
        }
    }
}

impl TryFrom<String> for UserRole {
    type Error = InvalidValue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    /// Cannot sign in; existing tokens stop working
    Banned,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Banned => "banned",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(UserStatus::Active),
            "banned" => Ok(UserStatus::Banned),
            _ => Err(InvalidValue::new("user status", s)),
        }
    }
}

impl TryFrom<String> for UserStatus {
    type Error = InvalidValue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Row of the `roles` table with the number of accounts holding it
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub user_count: i64,
}

/// Admin view of a user with engagement counters
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserProfile {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub user: User,
    pub bookmark_count: i64,
    pub rating_count: i64,
    pub comment_count: i64,
    pub download_count: i64,
}

/// Registration payload
#[derive(Debug, Clone, Deserialize)]
pub struct SignupInput {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Sign-in payload; `login` accepts a username or an email address
#[derive(Debug, Clone, Deserialize)]
pub struct SigninInput {
    #[serde(alias = "username", alias = "email")]
    pub login: String,
    pub password: String,
}

/// Fields a user may change on their own profile
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileInput {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
}

/// Internal insert record, password already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub role: UserRole,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> User {
        let now = Utc::now();
        User {
            id: 1,
            username: "reader".to_string(),
            email: "reader@example.com".to_string(),
            password_hash: "hash".to_string(),
            full_name: None,
            avatar: None,
            bio: None,
            role,
            status: UserStatus::Active,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_role_checks() {
        assert!(user(UserRole::Admin).is_admin());
        assert!(user(UserRole::Admin).is_editor());
        assert!(user(UserRole::Editor).is_editor());
        assert!(!user(UserRole::Editor).is_admin());
        assert!(!user(UserRole::User).is_editor());
    }

    #[test]
    fn test_user_role_from_str() {
        assert_eq!(UserRole::from_str("ADMIN").unwrap(), UserRole::Admin);
        assert_eq!(UserRole::from_str("editor").unwrap(), UserRole::Editor);
        assert_eq!(UserRole::from_str("user").unwrap(), UserRole::User);
        assert!(UserRole::from_str("author").is_err());
        assert_eq!(UserRole::default(), UserRole::User);
    }

    #[test]
    fn test_user_status_roundtrip() {
        for status in [UserStatus::Active, UserStatus::Banned] {
            assert_eq!(UserStatus::try_from(status.to_string()).unwrap(), status);
        }
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let json = serde_json::to_value(user(UserRole::User)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "user");
        assert_eq!(json["status"], "active");
    }

    #[test]
    fn test_signin_accepts_username_or_email_field() {
        let by_name: SigninInput =
            serde_json::from_str(r#"{"username":"reader","password":"x"}"#).unwrap();
        let by_mail: SigninInput =
            serde_json::from_str(r#"{"email":"r@example.com","password":"x"}"#).unwrap();
        assert_eq!(by_name.login, "reader");
        assert_eq!(by_mail.login, "r@example.com");
    }
}
