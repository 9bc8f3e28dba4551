pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;

use actix_web::{web, HttpResponse};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use crate::config::{SessionBackend, Settings};

pub use auth::{
    Authenticated, Clock, Identity, MemorySessionStore, PgSessionStore, SessionStore,
    SystemClock, TokenError, TokenService,
};
pub use db::{DbOperations, Post, PostRepository, User, UserRepository};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "session_store": state.sessions.backend(),
    }))
}

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub users: Arc<dyn UserRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub sessions: Arc<dyn SessionStore>,
    pub tokens: Arc<TokenService>,
    pub clock: Arc<dyn Clock>,
    db_pool: Option<Arc<PgPool>>,
}

impl AppState {
    /// Connect to Postgres, apply migrations and build the configured session store.
    pub async fn new(config: Settings) -> Result<Self> {
        let db = DbOperations::new_with_options(
            &config.database.url,
            config.database.max_connections,
            std::time::Duration::from_secs(5),
        )
        .await?;
        db.run_migrations().await?;

        let pool = db.pool().clone();
        let sessions: Arc<dyn SessionStore> = match config.session_store.backend {
            SessionBackend::Memory => Arc::new(MemorySessionStore::new()),
            SessionBackend::Postgres => Arc::new(PgSessionStore::new(pool.clone())),
        };

        let db = Arc::new(db);
        let mut state = Self::from_parts(config, db.clone(), db, sessions, Arc::new(SystemClock));
        state.db_pool = Some(pool);
        Ok(state)
    }

    /// Assemble state from already-built collaborators.
    pub fn from_parts(
        config: Settings,
        users: Arc<dyn UserRepository>,
        posts: Arc<dyn PostRepository>,
        sessions: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tokens = Arc::new(TokenService::new(
            &config.auth.jwt_secret,
            chrono::Duration::hours(config.auth.token_expiry_hours),
            sessions.clone(),
            clock.clone(),
        ));

        Self {
            config: Arc::new(config),
            users,
            posts,
            sessions,
            tokens,
            clock,
            db_pool: None,
        }
    }

    pub fn start_sweeper(&self) -> JoinHandle<()> {
        auth::spawn_sweeper(
            self.sessions.clone(),
            self.clock.clone(),
            std::time::Duration::from_secs(self.config.session_store.sweep_interval_secs),
        )
    }

    pub async fn shutdown(&self) -> Result<()> {
        if let Some(pool) = &self.db_pool {
            pool.close().await;
        }
        Ok(())
    }
}
