// Core modules
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
mod types;

// Re-export key types and functions
pub use auth::{
    RequestCredentials, Resolution, ResolvedIdentity, SESSION_COOKIE_NAME, SessionConfig,
    SessionResolver,
};
pub use config::redis_url;
pub use db::{
    DatabaseConfig, Department, IdentityStore, Session, StoreError, SurrealIdentityStore, User,
    create_connection, ensure_schema,
};
pub use types::{DepartmentId, UserId};

use std::sync::Arc;
use anyhow::Result;

/// Convenience function to build the HTTP router over a SurrealDB store.
///
/// Connects, makes sure the identity tables exist, and wires the session
/// resolver into the router's middleware stack.
pub async fn create_app(db_config: DatabaseConfig, session_config: SessionConfig) -> Result<axum::Router> {
    let db = create_connection(db_config).await?;
    ensure_schema(&db).await?;

    let store = Arc::new(SurrealIdentityStore::new(db));
    let resolver = Arc::new(SessionResolver::with_config(store, session_config));

    Ok(api::create_router(resolver))
}
