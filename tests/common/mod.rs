//! Common Test Utilities
//!
//! An application wired to the in-memory store, plus helpers to create
//! users and tokens.

use std::sync::Arc;

use axum_test::TestServer;
use chrono::{NaiveDate, Utc};
use fake::faker::internet::en::Username;
use fake::Fake;

use chat_hub::application::services::JwtIdentityValidator;
use chat_hub::config::{
    CorsSettings, DatabaseSettings, HubSettings, JwtSettings, ServerSettings, Settings,
    WebSocketSettings,
};
use chat_hub::domain::{Gender, User, UserId};
use chat_hub::infrastructure::repositories::InMemoryStore;
use chat_hub::presentation::http::create_router;
use chat_hub::startup::AppState;

pub const TEST_SECRET: &str = "integration-test-secret-of-sufficient-length";

pub fn test_settings(hub: HubSettings) -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
        },
        database: DatabaseSettings {
            url: None,
            max_connections: 1,
            min_connections: 1,
            acquire_timeout: 1,
        },
        jwt: JwtSettings {
            secret: TEST_SECRET.into(),
            access_token_expiry_minutes: 15,
        },
        cors: CorsSettings {
            allowed_origins: vec!["http://localhost:3000".into()],
        },
        hub,
        websocket: WebSocketSettings::default(),
        environment: "test".into(),
    }
}

/// A registered user and a bearer token for them
pub struct TestUser {
    pub id: UserId,
    pub username: String,
    pub token: String,
}

/// Test application builder
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_hub_settings(HubSettings::default())
    }

    pub fn with_hub_settings(hub: HubSettings) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let state = AppState::in_memory(store.clone(), test_settings(hub));
        let server = TestServer::new(create_router(state.clone())).unwrap();

        Self {
            server,
            state,
            store,
        }
    }

    /// Insert a user with a random username and issue a token for them
    pub fn user(&self) -> TestUser {
        let base: String = Username().fake();
        let base: String = base.chars().filter(|c| c.is_ascii_alphanumeric()).take(16).collect();
        let suffix = UserId::new().to_string();
        let username = format!("{}_{}", base, &suffix[suffix.len() - 8..]);
        self.named_user(&username)
    }

    pub fn named_user(&self, username: &str) -> TestUser {
        let id = UserId::new();
        self.store.insert_user(User {
            id,
            username: username.into(),
            first_name: username.into(),
            last_name: "Tester".into(),
            gender: Gender::NonBinary,
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            created_at: Utc::now(),
        });

        let token = JwtIdentityValidator::new(self.store.clone(), self.state.settings.jwt.clone())
            .issue(id)
            .unwrap();

        TestUser {
            id,
            username: username.into(),
            token,
        }
    }
}
