//! The authenticated principal.
//!
//! A principal is loaded from storage on every authenticated request so
//! that role changes take effect on the next request. It is never cached
//! across requests.

use serde::{Deserialize, Serialize};
use proctor_core::UserId;

use crate::role::Role;

/// An authenticated actor: a user with a global role.
///
/// Display and contact fields are carried for the boundary layer; they
/// play no part in authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Platform user ID.
    id: UserId,
    /// Global role.
    role: Role,
    /// Login name.
    username: String,
    /// Display name, if set.
    display_name: Option<String>,
    /// Contact email, if set.
    email: Option<String>,
}

impl Principal {
    /// Creates a principal with only the fields authorization needs.
    #[must_use]
    pub fn new(id: UserId, role: Role, username: impl Into<String>) -> Self {
        Self {
            id,
            role,
            username: username.into(),
            display_name: None,
            email: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: Option<String>) -> Self {
        self.display_name = display_name;
        self
    }

    /// Sets the contact email.
    #[must_use]
    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Returns true if the principal holds the admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}
