//! Authentication extractors for Axum.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::CookieJar;
use proctor_platform_access::{AuthenticationError, Principal, SessionToken};

use super::AppState;
use crate::db::PgStore;
use crate::error::ApiError;

/// Session cookie name.
pub(crate) const SESSION_COOKIE: &str = "session";

/// Extractor for the presented session token.
///
/// Reads `Authorization: Bearer <token>` first and falls back to the
/// session cookie. Rejects with 401 when neither is present; whether the
/// token is any good is decided later, inside the request's transaction.
#[derive(Debug)]
pub struct RequireToken(pub SessionToken);

impl<S> FromRequestParts<S> for RequireToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        presented_token(&parts.headers)
            .map(RequireToken)
            .ok_or(ApiError::Unauthenticated {
                reason: "Not authenticated",
            })
    }
}

fn presented_token(headers: &HeaderMap) -> Option<SessionToken> {
    if let Some(token) = bearer_token(headers) {
        return Some(token);
    }
    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().trim())
        .filter(|value| !value.is_empty())
        .map(SessionToken::from)
}

fn bearer_token(headers: &HeaderMap) -> Option<SessionToken> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(SessionToken::from)
}

/// A validated principal together with the transaction it was validated
/// in. Authorization checks and the guarded operation run on `store`.
pub struct RequestContext {
    pub store: PgStore,
    pub principal: Principal,
}

impl RequestContext {
    /// Opens a transaction and resolves `token` to a principal.
    ///
    /// An expired session is invalidated as a side effect of validation;
    /// that write is committed before the 401 is returned.
    pub async fn begin(state: &AppState, token: &SessionToken) -> Result<Self, ApiError> {
        let mut store = PgStore::begin(&state.db_pool).await?;
        match state.sessions.validate(&mut store, token).await {
            Ok(principal) => Ok(Self { store, principal }),
            Err(report) => {
                if matches!(
                    report.current_context(),
                    AuthenticationError::SessionExpired { .. }
                ) {
                    store.commit().await?;
                }
                Err(report.into())
            }
        }
    }

    pub async fn commit(self) -> Result<(), ApiError> {
        self.store.commit().await?;
        Ok(())
    }
}
