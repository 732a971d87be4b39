//! Authentication routes for login, logout, and the current principal.

use axum::{Json, extract::State, http::StatusCode};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use proctor_platform_access::{AuthenticationError, Principal, Session};
use rootcause::Report;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::Duration as TimeDuration;
use tracing::info;

use super::middleware::SESSION_COOKIE;
use super::{AppState, RequestContext, RequireToken, password};
use crate::db::PgStore;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    token: String,
    expires_at: DateTime<Utc>,
}

fn invalid_credentials() -> ApiError {
    let report: Report<AuthenticationError> = AuthenticationError::InvalidCredentials.into();
    report.into()
}

fn session_cookie(state: &AppState, session: &Session) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session.token().as_str().to_string()))
        .path("/")
        .http_only(true)
        .secure(state.session_config.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::minutes(state.session_config.duration_minutes))
        .build()
}

/// Verifies credentials and issues a session.
///
/// The token is returned in the body for API clients and set as a cookie
/// for browsers.
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let mut store = PgStore::begin(&state.db_pool).await?;

    let Some((user_id, hash)) = store.find_credentials(&request.username).await? else {
        info!(username = %request.username, "login for unknown user");
        return Err(invalid_credentials());
    };

    let candidate = request.password;
    let verified = tokio::task::spawn_blocking(move || password::verify_password(&candidate, &hash))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "password verification task failed");
            ApiError::Internal
        })?;
    if !verified {
        info!(user_id = %user_id, "login with wrong password");
        return Err(invalid_credentials());
    }

    let session = state.sessions.create(&mut store, user_id).await?;
    store.commit().await?;
    info!(user_id = %user_id, "user logged in");

    let jar = jar.add(session_cookie(&state, &session));
    Ok((
        jar,
        Json(LoginResponse {
            token: session.token().as_str().to_string(),
            expires_at: session.expires_at(),
        }),
    ))
}

/// Invalidates the presented session and clears the cookie.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    RequireToken(token): RequireToken,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), ApiError> {
    let mut store = PgStore::begin(&state.db_pool).await?;
    state.sessions.invalidate(&mut store, &token).await?;
    store.commit().await?;

    let remove_session = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(TimeDuration::ZERO);

    Ok((jar.add(remove_session), StatusCode::NO_CONTENT))
}

/// Returns the principal behind the presented session.
pub async fn me(
    State(state): State<Arc<AppState>>,
    RequireToken(token): RequireToken,
) -> Result<Json<Principal>, ApiError> {
    let context = RequestContext::begin(&state, &token).await?;
    let principal = context.principal.clone();
    context.commit().await?;
    Ok(Json(principal))
}
