//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use sqlx::PgPool;
use tokio::net::TcpListener;

use crate::application::services::{IdentityValidator, JwtIdentityValidator};
use crate::config::Settings;
use crate::domain::{ChatRepository, MembershipStore, MessageRepository, UserRepository};
use crate::infrastructure::database;
use crate::infrastructure::repositories::{
    InMemoryStore, PgChatRepository, PgMessageRepository, PgUserRepository,
};
use crate::presentation::http::handlers::health::init_server_start;
use crate::presentation::http::routes;
use crate::presentation::middleware::{cors, logging};
use crate::presentation::websocket::Hub;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// `None` when running on the in-memory store
    pub db: Option<PgPool>,
    pub users: Arc<dyn UserRepository>,
    pub chats: Arc<dyn ChatRepository>,
    pub membership: Arc<dyn MembershipStore>,
    pub messages: Arc<dyn MessageRepository>,
    pub hub: Arc<Hub>,
    pub identity: Arc<dyn IdentityValidator>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// State backed by PostgreSQL repositories.
    pub fn postgres(pool: PgPool, settings: Settings) -> Self {
        let users = Arc::new(PgUserRepository::new(pool.clone()));
        let chats = Arc::new(PgChatRepository::new(pool.clone()));
        let messages = Arc::new(
            PgMessageRepository::new(pool.clone()).with_statement_timeout(settings.hub.persist_timeout()),
        );

        let hub = Arc::new(Hub::new(chats.clone(), messages.clone(), settings.hub.clone()));
        let identity = Arc::new(JwtIdentityValidator::new(users.clone(), settings.jwt.clone()));

        Self {
            db: Some(pool),
            users,
            chats: chats.clone(),
            membership: chats,
            messages,
            hub,
            identity,
            settings: Arc::new(settings),
        }
    }

    /// State backed by a single in-process store.
    pub fn in_memory(store: Arc<InMemoryStore>, settings: Settings) -> Self {
        let hub = Arc::new(Hub::new(store.clone(), store.clone(), settings.hub.clone()));
        let identity = Arc::new(JwtIdentityValidator::new(store.clone(), settings.jwt.clone()));

        Self {
            db: None,
            users: store.clone(),
            chats: store.clone(),
            membership: store.clone(),
            messages: store,
            hub,
            identity,
            settings: Arc::new(settings),
        }
    }
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    hub: Arc<Hub>,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        init_server_start();

        let state = match settings.database.url.clone() {
            Some(url) => {
                let pool = database::create_pool(&settings.database, &url).await?;
                tracing::info!("Database connection pool created");

                database::run_migrations(&pool).await?;
                tracing::info!("Database migrations applied");

                AppState::postgres(pool, settings.clone())
            }
            None => {
                tracing::warn!("No database url configured, using the in-memory store");
                AppState::in_memory(Arc::new(InMemoryStore::new()), settings.clone())
            }
        };
        let hub = state.hub.clone();

        // Build router with middleware
        let router = routes::create_router(state)
            .layer(logging::create_trace_layer())
            .layer(cors::create_cors_layer(&settings.cors));

        // Bind to address
        let listener = TcpListener::bind(settings.server_addr()).await?;
        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            router,
            hub,
        })
    }

    /// Run the server until a shutdown signal arrives. Live sessions are
    /// closed before the listener stops.
    pub async fn run_until_stopped(self) -> Result<()> {
        let hub = self.hub;
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                let closed = hub.close_all();
                tracing::info!(closed, "Shutdown signal received, sessions closed");
            })
            .await?;

        tracing::info!("Server stopped");
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
