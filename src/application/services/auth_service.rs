//! Authentication Service
//!
//! Registration, password login and bearer token validation. The hub and
//! the HTTP surface depend only on the `IdentityValidator` trait;
//! `JwtIdentityValidator` is the default implementation.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::JwtSettings;
use crate::domain::{Gender, User, UserId, UserRepository};
use crate::shared::error::AppError;

/// Identity could not be established.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing credential")]
    MissingCredential,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token subject is not a user id")]
    InvalidSubject,

    #[error("Unknown user")]
    UnknownUser,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Username already exists")]
    UsernameTaken,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Identity store unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unavailable(msg) => AppError::Unavailable(msg),
            AuthError::UsernameTaken => AppError::Conflict(err.to_string()),
            AuthError::InvalidInput(msg) => AppError::Validation(msg),
            AuthError::Internal(msg) => AppError::Internal(msg),
            other => AppError::Unauthorized(other.to_string()),
        }
    }
}

fn store_error(e: AppError) -> AuthError {
    match e {
        AppError::Conflict(_) => AuthError::UsernameTaken,
        AppError::Unavailable(msg) => AuthError::Unavailable(msg),
        other => AuthError::Internal(other.to_string()),
    }
}

/// Resolves a credential to the user it belongs to.
#[async_trait]
pub trait IdentityValidator: Send + Sync {
    async fn validate(&self, credential: &str) -> Result<UserId, AuthError>;
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
}

/// HS256 bearer tokens whose subject is a user id.
pub struct JwtIdentityValidator {
    users: Arc<dyn UserRepository>,
    jwt_settings: JwtSettings,
}

impl JwtIdentityValidator {
    pub fn new(users: Arc<dyn UserRepository>, jwt_settings: JwtSettings) -> Self {
        Self { users, jwt_settings }
    }

    /// Sign a token for a user without checking a password.
    pub fn issue(&self, user_id: UserId) -> Result<String, AuthError> {
        issue_access_token(&self.jwt_settings, user_id)
    }

    /// Decode and validate an access token
    fn decode_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_settings.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?;

        Ok(token_data.claims)
    }
}

#[async_trait]
impl IdentityValidator for JwtIdentityValidator {
    async fn validate(&self, credential: &str) -> Result<UserId, AuthError> {
        let claims = self.decode_access_token(credential)?;
        let user_id: UserId = claims.sub.parse().map_err(|_| AuthError::InvalidSubject)?;

        match self.users.find_by_id(user_id).await {
            Ok(Some(_)) => Ok(user_id),
            Ok(None) => Err(AuthError::UnknownUser),
            Err(e) => Err(AuthError::Unavailable(e.to_string())),
        }
    }
}

fn issue_access_token(jwt_settings: &JwtSettings, user_id: UserId) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (now + Duration::minutes(jwt_settings.access_token_expiry_minutes)).timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_settings.secret.as_bytes()),
    )
    .map_err(|e| AuthError::Internal(format!("Token generation failed: {}", e)))
}

/// Registration form after shape validation.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub gender: String,
    /// `YYYY-MM-DD`
    pub date_of_birth: String,
    pub email: String,
    pub password: String,
}

/// Access token handed out by register and login
#[derive(Debug, Clone, Serialize)]
pub struct AuthToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Account creation and password login.
#[async_trait]
pub trait AccountService: Send + Sync {
    /// Create an account and sign the new user in.
    async fn register(&self, registration: Registration) -> Result<(User, AuthToken), AuthError>;

    /// Exchange a username and password for an access token.
    async fn login(&self, username: &str, password: &str) -> Result<AuthToken, AuthError>;
}

pub struct AccountServiceImpl {
    users: Arc<dyn UserRepository>,
    jwt_settings: JwtSettings,
}

impl AccountServiceImpl {
    pub fn new(users: Arc<dyn UserRepository>, jwt_settings: JwtSettings) -> Self {
        Self { users, jwt_settings }
    }

    fn token_for(&self, user_id: UserId) -> Result<AuthToken, AuthError> {
        Ok(AuthToken {
            access_token: issue_access_token(&self.jwt_settings, user_id)?,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_settings.access_token_expiry_minutes * 60,
        })
    }
}

/// Hash a password with a fresh salt
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its hash
fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AuthError::Internal(format!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Run password hashing off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, AuthError>
where
    F: FnOnce() -> Result<T, AuthError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AuthError::Internal(format!("Password task failed: {}", e)))?
}

fn parse_date_of_birth(raw: &str) -> Result<NaiveDate, AuthError> {
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AuthError::InvalidInput("date_of_birth: expected YYYY-MM-DD".into()))?;
    if date > Utc::now().date_naive() {
        return Err(AuthError::InvalidInput("date_of_birth: must not be in the future".into()));
    }
    Ok(date)
}

#[async_trait]
impl AccountService for AccountServiceImpl {
    async fn register(&self, registration: Registration) -> Result<(User, AuthToken), AuthError> {
        let gender = Gender::parse(&registration.gender).ok_or_else(|| {
            AuthError::InvalidInput("gender: must be male, female or non binary".into())
        })?;
        let date_of_birth = parse_date_of_birth(&registration.date_of_birth)?;

        if self
            .users
            .find_by_username(&registration.username)
            .await
            .map_err(store_error)?
            .is_some()
        {
            return Err(AuthError::UsernameTaken);
        }

        let password = registration.password;
        let password_hash = blocking(move || hash_password(&password)).await?;

        let user = User {
            id: UserId::new(),
            username: registration.username,
            first_name: registration.first_name,
            last_name: registration.last_name,
            gender,
            date_of_birth,
            created_at: Utc::now(),
        };
        let user = self
            .users
            .create_account(&user, &registration.email, &password_hash)
            .await
            .map_err(store_error)?;

        tracing::info!(user_id = %user.id, username = %user.username, "Account registered");

        let token = self.token_for(user.id)?;
        Ok((user, token))
    }

    async fn login(&self, username: &str, password: &str) -> Result<AuthToken, AuthError> {
        let credentials = self
            .users
            .find_credentials(username)
            .await
            .map_err(store_error)?
            .ok_or(AuthError::InvalidCredentials)?;

        let password = password.to_string();
        let hash = credentials.password_hash;
        if !blocking(move || verify_password(&password, &hash)).await? {
            tracing::debug!(user_id = %credentials.user.id, "Password rejected");
            return Err(AuthError::InvalidCredentials);
        }

        self.token_for(credentials.user.id)
    }
}
