//! Authorization error types.

use std::fmt;

/// Authorization errors.
///
/// Facades check existence before permission, so `NotFound` always
/// means the resource is absent and `Forbidden` always means it exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// The resource exists but the principal lacks the required level.
    Forbidden {
        /// The resource that was accessed.
        resource: String,
        /// The action that was requested.
        action: String,
    },
    /// The resource (or a referenced principal) does not exist.
    NotFound {
        /// The missing resource.
        resource: String,
    },
    /// Storage failed before a decision could be made.
    Storage {
        /// Error details.
        details: String,
    },
}

impl AuthzError {
    pub(crate) fn forbidden(resource: impl fmt::Display, action: impl fmt::Display) -> Self {
        Self::Forbidden {
            resource: resource.to_string(),
            action: action.to_string(),
        }
    }

    pub(crate) fn not_found(resource: impl fmt::Display) -> Self {
        Self::NotFound {
            resource: resource.to_string(),
        }
    }
}

impl fmt::Display for AuthzError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forbidden { resource, action } => {
                write!(f, "action '{}' forbidden on resource '{}'", action, resource)
            }
            Self::NotFound { resource } => {
                write!(f, "resource '{}' not found", resource)
            }
            Self::Storage { details } => {
                write!(f, "authorization storage error: {}", details)
            }
        }
    }
}

impl std::error::Error for AuthzError {}
