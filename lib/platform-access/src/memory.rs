//! In-memory session and principal storage.
//!
//! Used by tests and by embedders that do not need persistence. Each
//! trait call takes the lock once, which gives per-row atomicity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use proctor_core::{Result, StorageError, UserId};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::principal::Principal;
use crate::session::{Session, SessionToken};
use crate::store::{PrincipalDirectory, SessionStore};

#[derive(Debug, Default)]
struct MemoryState {
    sessions: HashMap<SessionToken, Session>,
    principals: HashMap<UserId, Principal>,
}

/// Shared in-memory store. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a principal.
    pub fn put_principal(&self, principal: Principal) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.principals.insert(principal.id(), principal);
    }

    /// Removes a principal, as user management does on account deletion.
    pub fn remove_principal(&self, id: UserId) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.principals.remove(&id);
    }

    /// Returns the number of stored sessions in any state.
    #[must_use]
    pub fn session_count(&self) -> usize {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.sessions.len()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>, StorageError> {
        self.state
            .read()
            .map_err(|_| StorageError::new("memory store lock poisoned").into())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, StorageError> {
        self.state
            .write()
            .map_err(|_| StorageError::new("memory store lock poisoned").into())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(&mut self, session: &Session) -> Result<bool, StorageError> {
        let mut state = self.write()?;
        match state.sessions.entry(session.token().clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
                Ok(true)
            }
        }
    }

    async fn find_session(
        &mut self,
        token: &SessionToken,
    ) -> Result<Option<Session>, StorageError> {
        Ok(self.read()?.sessions.get(token).cloned())
    }

    async fn invalidate_session(&mut self, token: &SessionToken) -> Result<bool, StorageError> {
        let mut state = self.write()?;
        match state.sessions.get_mut(token) {
            Some(session) => {
                session.invalidate();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn invalidate_user_sessions(&mut self, user_id: UserId) -> Result<u64, StorageError> {
        let mut state = self.write()?;
        let mut count = 0;
        for session in state.sessions.values_mut() {
            if session.user_id() == user_id && session.is_marked_valid() {
                session.invalidate();
                count += 1;
            }
        }
        Ok(count)
    }

    async fn delete_stale_sessions(&mut self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        let mut state = self.write()?;
        let before = state.sessions.len();
        state
            .sessions
            .retain(|_, session| session.is_marked_valid() && !session.is_expired_at(now));
        Ok((before - state.sessions.len()) as u64)
    }
}

#[async_trait]
impl PrincipalDirectory for MemoryStore {
    async fn find_principal(&mut self, id: UserId) -> Result<Option<Principal>, StorageError> {
        Ok(self.read()?.principals.get(&id).cloned())
    }
}
