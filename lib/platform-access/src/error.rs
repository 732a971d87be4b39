//! Error types for the platform-access crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `AuthenticationError`: failures turning a token into a principal

use std::fmt;

/// Errors from session operations.
///
/// Every variant except `Storage` is an authentication failure and maps
/// to a 401-equivalent at the boundary. None of them is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
    /// No valid session matches the token (unknown or invalidated).
    SessionNotFound { token: String },
    /// The session's expiry has passed.
    SessionExpired { token: String },
    /// The session's owner no longer exists.
    SessionUserNotFound { user_id: String },
    /// The login credentials did not match a principal.
    InvalidCredentials,
    /// Persistence or randomness failure.
    Storage { details: String },
}

impl AuthenticationError {
    /// Returns true if this is an authentication failure rather than an
    /// infrastructure failure.
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        !matches!(self, Self::Storage { .. })
    }
}

impl fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionNotFound { token } => {
                write!(f, "session not found: {token}")
            }
            Self::SessionExpired { token } => {
                write!(f, "session has expired: {token}")
            }
            Self::SessionUserNotFound { user_id } => {
                write!(f, "session owner {user_id} no longer exists")
            }
            Self::InvalidCredentials => {
                write!(f, "invalid username or password")
            }
            Self::Storage { details } => {
                write!(f, "session storage error: {details}")
            }
        }
    }
}

impl std::error::Error for AuthenticationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_not_found_display() {
        let err = AuthenticationError::SessionNotFound {
            token: "abc…".to_string(),
        };
        assert!(err.to_string().contains("session not found"));
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn session_expired_display() {
        let err = AuthenticationError::SessionExpired {
            token: "abc…".to_string(),
        };
        assert!(err.to_string().contains("expired"));
    }

    #[test]
    fn session_user_not_found_display() {
        let err = AuthenticationError::SessionUserNotFound {
            user_id: "7".to_string(),
        };
        assert!(err.to_string().contains("7"));
    }

    #[test]
    fn only_storage_is_not_an_authentication_failure() {
        assert!(
            AuthenticationError::SessionNotFound {
                token: String::new()
            }
            .is_unauthenticated()
        );
        assert!(AuthenticationError::InvalidCredentials.is_unauthenticated());
        assert!(
            !AuthenticationError::Storage {
                details: "down".to_string()
            }
            .is_unauthenticated()
        );
    }
}
