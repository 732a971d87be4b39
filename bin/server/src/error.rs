//! HTTP error mapping.
//!
//! Domain errors arrive as rootcause reports. They are matched once here
//! and turned into a status code plus a user-safe message; details are
//! logged, never returned.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use proctor_authz::AuthzError;
use proctor_core::StorageError;
use proctor_platform_access::AuthenticationError;
use rootcause::Report;
use serde_json::json;
use std::fmt;

/// Errors returned by handlers.
#[derive(Debug, PartialEq, Eq)]
pub enum ApiError {
    /// No usable session: missing, unknown, invalidated or expired token,
    /// a deleted owner, or bad login credentials.
    Unauthenticated { reason: &'static str },
    /// The resource exists but the principal may not act on it.
    Forbidden,
    /// The resource does not exist.
    NotFound,
    /// The request payload was rejected.
    InvalidInput { message: String },
    /// Storage or another internal failure.
    Internal,
}

impl ApiError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated { reason } => write!(f, "{}", reason),
            Self::Forbidden => write!(f, "Forbidden"),
            Self::NotFound => write!(f, "Not found"),
            Self::InvalidInput { message } => write!(f, "{}", message),
            Self::Internal => write!(f, "Internal server error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<Report<AuthenticationError>> for ApiError {
    fn from(report: Report<AuthenticationError>) -> Self {
        match report.current_context() {
            AuthenticationError::SessionNotFound { .. } => Self::Unauthenticated {
                reason: "Not authenticated",
            },
            AuthenticationError::SessionExpired { .. } => Self::Unauthenticated {
                reason: "Session expired",
            },
            AuthenticationError::SessionUserNotFound { .. } => Self::Unauthenticated {
                reason: "Not authenticated",
            },
            AuthenticationError::InvalidCredentials => Self::Unauthenticated {
                reason: "Invalid username or password",
            },
            AuthenticationError::Storage { details } => {
                tracing::error!(%details, "authentication storage failure");
                Self::Internal
            }
        }
    }
}

impl From<Report<AuthzError>> for ApiError {
    fn from(report: Report<AuthzError>) -> Self {
        match report.current_context() {
            AuthzError::Forbidden { .. } => Self::Forbidden,
            AuthzError::NotFound { .. } => Self::NotFound,
            AuthzError::Storage { details } => {
                tracing::error!(%details, "authorization storage failure");
                Self::Internal
            }
        }
    }
}

impl From<Report<StorageError>> for ApiError {
    fn from(report: Report<StorageError>) -> Self {
        tracing::error!(error = %report, "storage failure");
        Self::Internal
    }
}
