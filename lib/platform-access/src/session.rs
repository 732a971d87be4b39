//! Sessions and session tokens.
//!
//! A session maps an opaque token to the principal that logged in. It is
//! created on login, consulted on every authenticated request, and ends
//! either when the clock passes its expiry or when it is invalidated.
//! The only mutation a stored session ever sees is its validity flag
//! flipping to false.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use proctor_core::UserId;

/// Number of random bytes in a generated token.
const TOKEN_BYTES: usize = 32;

/// Number of token characters shown in logs.
const REDACTED_PREFIX_LEN: usize = 6;

/// Opaque session token.
///
/// Generated tokens carry 256 bits from the operating system's CSPRNG.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wraps an existing token string (e.g., one read from a request).
    #[must_use]
    pub fn new(token: String) -> Self {
        Self(token)
    }

    /// Generates a fresh unguessable token.
    ///
    /// # Errors
    ///
    /// Returns an error if the operating system cannot supply randomness.
    pub fn generate() -> Result<Self, getrandom::Error> {
        let mut bytes = [0u8; TOKEN_BYTES];
        getrandom::fill(&mut bytes)?;
        Ok(Self(URL_SAFE_NO_PAD.encode(bytes)))
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a short prefix that is safe to log.
    #[must_use]
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(REDACTED_PREFIX_LEN).collect();
        format!("{prefix}…")
    }
}

// Never print full tokens through Debug.
impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SessionToken").field(&self.redacted()).finish()
    }
}

impl From<String> for SessionToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle state of a session at a given instant.
///
/// `Expired` and `Invalidated` are terminal. When both apply, expiry wins
/// so that a lapsed session always reports as expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Valid and not yet expired.
    Active,
    /// The clock has reached the expiry timestamp.
    Expired,
    /// Explicitly invalidated (logout, account disabled).
    Invalidated,
}

/// A stored session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// The opaque token.
    token: SessionToken,
    /// The principal that owns this session.
    user_id: UserId,
    /// When the session was created.
    created_at: DateTime<Utc>,
    /// When the session expires.
    expires_at: DateTime<Utc>,
    /// Cleared on invalidation, never set again.
    valid: bool,
}

impl Session {
    /// Creates a new valid session lasting `duration` from `created_at`.
    #[must_use]
    pub fn new(
        token: SessionToken,
        user_id: UserId,
        created_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            token,
            user_id,
            created_at,
            expires_at: created_at + duration,
            valid: true,
        }
    }

    /// Reconstitutes a session from storage.
    #[must_use]
    pub fn from_parts(
        token: SessionToken,
        user_id: UserId,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        valid: bool,
    ) -> Self {
        Self {
            token,
            user_id,
            created_at,
            expires_at,
            valid,
        }
    }

    #[must_use]
    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns the stored validity flag.
    #[must_use]
    pub fn is_marked_valid(&self) -> bool {
        self.valid
    }

    /// Returns true if `now` is at or past the expiry timestamp.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Returns the lifecycle state at `now`.
    #[must_use]
    pub fn state_at(&self, now: DateTime<Utc>) -> SessionState {
        if self.is_expired_at(now) {
            SessionState::Expired
        } else if !self.valid {
            SessionState::Invalidated
        } else {
            SessionState::Active
        }
    }

    /// Clears the validity flag. Invalidating twice is a no-op.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }
}
