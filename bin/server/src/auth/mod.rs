//! Authentication for the proctor server.
//!
//! This module provides:
//! - Username/password login backed by argon2 hashes
//! - Session token extraction from the `Authorization` header or cookie
//! - The per-request context that ties a validated principal to the
//!   request's transaction
//!
//! Session validity is decided by
//! [`SessionManager`](proctor_platform_access::SessionManager) on every
//! request; nothing about the principal is cached in the token or cookie.

pub mod middleware;
pub mod password;
pub mod routes;

use crate::config::SessionConfig;
use proctor_platform_access::SessionManager;
use sqlx::PgPool;

pub use middleware::{RequestContext, RequireToken};
pub use routes::{login, logout, me};

/// Shared application state.
pub struct AppState {
    /// Database connection pool.
    pub db_pool: PgPool,
    /// Issues and validates sessions.
    pub sessions: SessionManager,
    /// Session configuration.
    pub session_config: SessionConfig,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(db_pool: PgPool, session_config: SessionConfig) -> Self {
        let sessions =
            SessionManager::with_system_clock(chrono::Duration::minutes(session_config.duration_minutes));
        Self {
            db_pool,
            sessions,
            session_config,
        }
    }
}
