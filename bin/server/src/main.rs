use proctor_platform_access::Role;
use proctor_server::{
    app,
    auth::{AppState, password},
    config::{BootstrapAdmin, ServerConfig},
    db::PgStore,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    if let Some(admin) = &config.bootstrap_admin {
        bootstrap_admin(&db_pool, admin).await;
    }

    let app_state = Arc::new(AppState::new(db_pool, config.session.clone()));

    // Cleanup stale sessions on startup, then periodically
    purge_sessions(&app_state).await;
    let cleanup_state = app_state.clone();
    let cleanup_interval_secs = config.session.cleanup_interval_seconds;
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(cleanup_interval_secs));
        loop {
            interval.tick().await;
            purge_sessions(&cleanup_state).await;
        }
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.bind_addr);

    axum::serve(listener, app(app_state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn purge_sessions(state: &AppState) {
    let result = async {
        let mut store = PgStore::begin(&state.db_pool)
            .await
            .map_err(|e| e.to_string())?;
        let count = state
            .sessions
            .purge_expired(&mut store)
            .await
            .map_err(|e| e.to_string())?;
        store.commit().await.map_err(|e| e.to_string())?;
        Ok::<_, String>(count)
    }
    .await;

    match result {
        Ok(count) if count > 0 => {
            tracing::debug!(deleted_sessions = count, "Session cleanup");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Failed to cleanup sessions");
        }
    }
}

/// Creates the configured admin account if the user table is empty.
async fn bootstrap_admin(pool: &PgPool, admin: &BootstrapAdmin) {
    let mut store = PgStore::begin(pool)
        .await
        .expect("failed to open bootstrap transaction");
    if store.count_users().await.expect("failed to count users") > 0 {
        return;
    }

    let hash = password::hash_password(&admin.password).expect("failed to hash admin password");
    let id = store
        .create_user(&admin.username, Role::Admin, &hash)
        .await
        .expect("failed to create admin user");
    store
        .commit()
        .await
        .expect("failed to commit admin user");
    tracing::info!(user_id = %id, username = %admin.username, "Created bootstrap admin");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
