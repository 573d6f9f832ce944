//! User entity and repository trait.
//!
//! Maps to the `users` table. Accounts are created through registration and
//! read to resolve usernames, confirm identities and check passwords.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::UserId;
use crate::shared::error::AppError;

/// Gender stored as a SMALLINT code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    NonBinary,
}

impl Gender {
    /// Parse the human form accepted by registration forms.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "male" => Some(Self::Male),
            "female" => Some(Self::Female),
            "non binary" | "non_binary" | "nonbinary" => Some(Self::NonBinary),
            _ => None,
        }
    }

    /// Database code.
    pub fn code(&self) -> i16 {
        match self {
            Self::Male => 0,
            Self::Female => 1,
            Self::NonBinary => 2,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Self::Male),
            1 => Some(Self::Female),
            2 => Some(Self::NonBinary),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::NonBinary => "non_binary",
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Represents a user account.
///
/// Maps to the `users` table:
/// - id: UUID PRIMARY KEY
/// - username: VARCHAR(32) NOT NULL UNIQUE
/// - first_name / last_name: VARCHAR(64) NOT NULL
/// - gender: SMALLINT NOT NULL
/// - date_of_birth: DATE NOT NULL
/// - email: VARCHAR(254) NOT NULL
/// - password_hash: TEXT NOT NULL
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// - deleted_at: TIMESTAMPTZ NULL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub gender: Gender,
    pub date_of_birth: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A user together with the stored password hash. Never leaves the
/// application layer.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: User,
    pub password_hash: String,
}

/// Storage for user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a live (not deleted) user by id.
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, AppError>;

    /// Find a live user by username.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    /// Store a new account. A taken username is `AppError::Conflict`.
    async fn create_account(&self, user: &User, email: &str, password_hash: &str) -> Result<User, AppError>;

    /// Look up the password hash of a live user by username.
    async fn find_credentials(&self, username: &str) -> Result<Option<Credentials>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("male", Some(Gender::Male))]
    #[test_case("Female", Some(Gender::Female))]
    #[test_case("non binary", Some(Gender::NonBinary))]
    #[test_case("NON_BINARY", Some(Gender::NonBinary))]
    #[test_case("", None)]
    #[test_case("robot", None)]
    fn test_gender_parse(input: &str, expected: Option<Gender>) {
        assert_eq!(Gender::parse(input), expected);
    }

    #[test]
    fn test_gender_code_roundtrip() {
        for gender in [Gender::Male, Gender::Female, Gender::NonBinary] {
            assert_eq!(Gender::from_code(gender.code()), Some(gender));
        }
        assert_eq!(Gender::from_code(7), None);
    }
}
