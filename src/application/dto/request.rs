//! Request DTOs
//!
//! Data structures for API request bodies.

use serde::Deserialize;
use validator::Validate;

use crate::application::services::Registration;
use crate::domain::UserId;

/// Create an account
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 4, max = 32, message = "Username must be 4-32 characters"))]
    pub username: String,

    #[validate(length(min = 3, max = 64, message = "First name must be 3-64 characters"))]
    pub first_name: String,

    #[validate(length(min = 3, max = 64, message = "Last name must be 3-64 characters"))]
    pub last_name: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,

    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,

    /// male, female or non binary
    pub gender: String,

    /// YYYY-MM-DD
    pub date_of_birth: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

impl From<RegisterRequest> for Registration {
    fn from(body: RegisterRequest) -> Self {
        Self {
            username: body.username,
            first_name: body.first_name,
            last_name: body.last_name,
            gender: body.gender,
            date_of_birth: body.date_of_birth,
            email: body.email,
            password: body.password,
        }
    }
}

/// Login with username and password
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Open a direct chat
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDirectChatRequest {
    #[validate(length(min = 1, max = 32, message = "Username must be 1-32 characters"))]
    pub username: String,
}

/// Create a group chat
#[derive(Debug, Deserialize, Validate)]
pub struct CreateGroupChatRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 100, message = "Between 1 and 100 usernames are required"))]
    pub usernames: Vec<String>,
}

/// Add a member to a group chat
#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: UserId,
}

/// Send message over HTTP
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, message = "Content is required"))]
    pub content: String,
}
