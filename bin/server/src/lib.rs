//! proctor HTTP server.
//!
//! Authenticates requests against stored sessions and guards task, group
//! and submission operations with the authorization facades from
//! `proctor-authz`.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use auth::AppState;

/// Builds the application router.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .merge(api::router())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
