//! Storage abstractions used by the session manager.
//!
//! Methods take `&mut self` so an implementation can wrap a single
//! database transaction. The caller owns begin/commit/rollback.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use proctor_core::{Result, StorageError, UserId};

use crate::principal::Principal;
use crate::session::{Session, SessionToken};

/// Persistence for session rows.
///
/// Every write must be atomic per row: a concurrent `find_session` sees
/// either the row before or after `invalidate_session`, never a mix.
#[async_trait]
pub trait SessionStore: Send {
    /// Inserts a new session. Returns false if the token already exists.
    async fn insert_session(&mut self, session: &Session) -> Result<bool, StorageError>;

    /// Looks up a session by token, regardless of its state.
    async fn find_session(&mut self, token: &SessionToken)
    -> Result<Option<Session>, StorageError>;

    /// Clears the validity flag. Returns false if the token is unknown.
    async fn invalidate_session(&mut self, token: &SessionToken) -> Result<bool, StorageError>;

    /// Clears the validity flag on every session of a user.
    async fn invalidate_user_sessions(&mut self, user_id: UserId) -> Result<u64, StorageError>;

    /// Deletes sessions that expired before `now` or were invalidated.
    async fn delete_stale_sessions(&mut self, now: DateTime<Utc>) -> Result<u64, StorageError>;
}

/// Read-only access to principals owned by user management.
#[async_trait]
pub trait PrincipalDirectory: Send {
    /// Loads a principal by id.
    async fn find_principal(&mut self, id: UserId) -> Result<Option<Principal>, StorageError>;
}
