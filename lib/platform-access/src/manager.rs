//! Session issuance, validation and invalidation.
//!
//! Expiry is checked lazily when a token is validated; there is no
//! background process that the validation result depends on. The
//! periodic purge only reclaims rows.

use chrono::Duration;
use proctor_core::{Result, StorageError, UserId};
use rootcause::Report;
use tracing::{debug, info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::AuthenticationError;
use crate::principal::Principal;
use crate::session::{Session, SessionState, SessionToken};
use crate::store::{PrincipalDirectory, SessionStore};

/// Attempts at drawing a token that is not already stored.
const MAX_TOKEN_ATTEMPTS: usize = 3;

fn storage_failure(report: Report<StorageError>) -> AuthenticationError {
    AuthenticationError::Storage {
        details: report.to_string(),
    }
}

/// Issues and checks sessions against a [`SessionStore`].
///
/// The manager holds no session state itself. The store handle is passed
/// to every call so it can be the request's transaction.
#[derive(Debug, Clone)]
pub struct SessionManager<C = SystemClock> {
    clock: C,
    duration: Duration,
}

impl SessionManager<SystemClock> {
    /// Creates a manager backed by wall-clock time.
    #[must_use]
    pub fn with_system_clock(duration: Duration) -> Self {
        Self::new(SystemClock, duration)
    }
}

impl<C: Clock> SessionManager<C> {
    /// Creates a manager issuing sessions that last `duration`.
    #[must_use]
    pub fn new(clock: C, duration: Duration) -> Self {
        Self { clock, duration }
    }

    /// Returns the lifetime of newly issued sessions.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Issues a new valid session for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if randomness is unavailable or persistence fails.
    #[instrument(skip(self, store), fields(user_id = %user_id))]
    pub async fn create<S>(&self, store: &mut S, user_id: UserId) -> Result<Session, AuthenticationError>
    where
        S: SessionStore + ?Sized,
    {
        for attempt in 1..=MAX_TOKEN_ATTEMPTS {
            let token = SessionToken::generate().map_err(|e| AuthenticationError::Storage {
                details: format!("token generation failed: {e}"),
            })?;
            let session = Session::new(token, user_id, self.clock.now(), self.duration);

            if store
                .insert_session(&session)
                .await
                .map_err(storage_failure)?
            {
                debug!(
                    token = %session.token().redacted(),
                    expires_at = %session.expires_at(),
                    "session created"
                );
                return Ok(session);
            }
            warn!(attempt, "session token collision");
        }

        Err(AuthenticationError::Storage {
            details: "could not allocate a unique session token".to_string(),
        }
        .into())
    }

    /// Resolves a token to the principal that owns it.
    ///
    /// The principal is reloaded from the directory on every call. An
    /// expired session that is still flagged valid is invalidated as a
    /// side effect.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` for unknown or invalidated tokens
    /// - `SessionExpired` once the clock reaches the expiry
    /// - `SessionUserNotFound` if the owner was deleted
    /// - `Storage` if the store fails
    #[instrument(skip(self, store, token), fields(token = %token.redacted()))]
    pub async fn validate<S>(
        &self,
        store: &mut S,
        token: &SessionToken,
    ) -> Result<Principal, AuthenticationError>
    where
        S: SessionStore + PrincipalDirectory + ?Sized,
    {
        let Some(session) = store.find_session(token).await.map_err(storage_failure)? else {
            debug!("unknown session token");
            return Err(AuthenticationError::SessionNotFound {
                token: token.redacted(),
            }
            .into());
        };

        match session.state_at(self.clock.now()) {
            SessionState::Active => {}
            SessionState::Expired => {
                if session.is_marked_valid() {
                    if let Err(e) = store.invalidate_session(token).await {
                        warn!(error = %e, "failed to invalidate expired session");
                    }
                }
                info!(expires_at = %session.expires_at(), "session expired");
                return Err(AuthenticationError::SessionExpired {
                    token: token.redacted(),
                }
                .into());
            }
            SessionState::Invalidated => {
                debug!("session was invalidated");
                return Err(AuthenticationError::SessionNotFound {
                    token: token.redacted(),
                }
                .into());
            }
        }

        let principal = store
            .find_principal(session.user_id())
            .await
            .map_err(storage_failure)?
            .ok_or_else(|| AuthenticationError::SessionUserNotFound {
                user_id: session.user_id().to_string(),
            })?;

        debug!(user_id = %principal.id(), role = %principal.role(), "session validated");
        Ok(principal)
    }

    /// Invalidates a session. Invalidating an already invalid session
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` if the token was never issued.
    #[instrument(skip(self, store, token), fields(token = %token.redacted()))]
    pub async fn invalidate<S>(
        &self,
        store: &mut S,
        token: &SessionToken,
    ) -> Result<(), AuthenticationError>
    where
        S: SessionStore + ?Sized,
    {
        if !store
            .invalidate_session(token)
            .await
            .map_err(storage_failure)?
        {
            return Err(AuthenticationError::SessionNotFound {
                token: token.redacted(),
            }
            .into());
        }
        debug!("session invalidated");
        Ok(())
    }

    /// Invalidates every session owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the store fails.
    #[instrument(skip(self, store), fields(user_id = %user_id))]
    pub async fn invalidate_all_for_user<S>(
        &self,
        store: &mut S,
        user_id: UserId,
    ) -> Result<u64, AuthenticationError>
    where
        S: SessionStore + ?Sized,
    {
        let count = store
            .invalidate_user_sessions(user_id)
            .await
            .map_err(storage_failure)?;
        info!(count, "invalidated all sessions for user");
        Ok(count)
    }

    /// Deletes expired and invalidated session rows.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the store fails.
    pub async fn purge_expired<S>(&self, store: &mut S) -> Result<u64, AuthenticationError>
    where
        S: SessionStore + ?Sized,
    {
        store
            .delete_stale_sessions(self.clock.now())
            .await
            .map_err(|e| storage_failure(e).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::memory::MemoryStore;
    use crate::role::Role;
    use chrono::Utc;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn setup() -> (SessionManager<ManualClock>, ManualClock, MemoryStore) {
        let clock = ManualClock::new(Utc::now());
        let manager = SessionManager::new(clock.clone(), Duration::hours(1));
        let store = MemoryStore::new();
        store.put_principal(Principal::new(UserId::new(7), Role::Student, "alice"));
        (manager, clock, store)
    }

    async fn issue_abc(store: &mut MemoryStore, clock: &ManualClock) {
        let session = Session::new("abc".into(), UserId::new(7), clock.now(), Duration::hours(1));
        assert!(store.insert_session(&session).await.expect("insert"));
    }

    #[tokio::test]
    async fn created_session_validates_to_its_principal() {
        let (manager, _clock, mut store) = setup();

        let session = manager.create(&mut store, UserId::new(7)).await.expect("create");
        let principal = manager
            .validate(&mut store, session.token())
            .await
            .expect("validate");

        assert_eq!(principal.id(), UserId::new(7));
        assert_eq!(session.expires_at() - session.created_at(), Duration::hours(1));
    }

    #[tokio::test]
    async fn created_tokens_are_distinct() {
        let (manager, _clock, mut store) = setup();

        let a = manager.create(&mut store, UserId::new(7)).await.expect("create");
        let b = manager.create(&mut store, UserId::new(7)).await.expect("create");

        assert_ne!(a.token(), b.token());
        assert_eq!(store.session_count(), 2);
    }

    #[tokio::test]
    async fn never_issued_token_is_not_found() {
        let (manager, _clock, mut store) = setup();

        for raw in ["", "abc", "definitely-not-issued"] {
            let err = manager
                .validate(&mut store, &raw.into())
                .await
                .expect_err("must fail");
            assert!(matches!(
                err.current_context(),
                AuthenticationError::SessionNotFound { .. }
            ));
        }
    }

    #[tokio::test]
    async fn abc_scenario_expires_after_an_hour() {
        let (manager, clock, mut store) = setup();
        issue_abc(&mut store, &clock).await;

        let principal = manager
            .validate(&mut store, &"abc".into())
            .await
            .expect("validate");
        assert_eq!(principal.id(), UserId::new(7));

        clock.advance(Duration::hours(1) + Duration::seconds(1));

        let err = manager
            .validate(&mut store, &"abc".into())
            .await
            .expect_err("expired");
        assert!(matches!(
            err.current_context(),
            AuthenticationError::SessionExpired { .. }
        ));
    }

    #[tokio::test]
    async fn expired_session_is_marked_invalid_and_stays_expired() {
        let (manager, clock, mut store) = setup();
        issue_abc(&mut store, &clock).await;
        clock.advance(Duration::hours(2));

        for _ in 0..2 {
            let err = manager
                .validate(&mut store, &"abc".into())
                .await
                .expect_err("expired");
            assert!(matches!(
                err.current_context(),
                AuthenticationError::SessionExpired { .. }
            ));
        }

        let stored = store
            .find_session(&"abc".into())
            .await
            .expect("find")
            .expect("present");
        assert!(!stored.is_marked_valid());
    }

    #[tokio::test]
    async fn invalidated_session_never_validates() {
        let (manager, clock, mut store) = setup();
        issue_abc(&mut store, &clock).await;

        manager
            .invalidate(&mut store, &"abc".into())
            .await
            .expect("invalidate");

        let err = manager
            .validate(&mut store, &"abc".into())
            .await
            .expect_err("invalidated");
        assert!(matches!(
            err.current_context(),
            AuthenticationError::SessionNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn invalidation_is_idempotent() {
        let (manager, clock, mut store) = setup();
        issue_abc(&mut store, &clock).await;

        manager
            .invalidate(&mut store, &"abc".into())
            .await
            .expect("first");
        manager
            .invalidate(&mut store, &"abc".into())
            .await
            .expect("second");
    }

    #[tokio::test]
    async fn invalidating_unknown_token_fails() {
        let (manager, _clock, mut store) = setup();

        let err = manager
            .invalidate(&mut store, &"ghost".into())
            .await
            .expect_err("unknown");
        assert!(matches!(
            err.current_context(),
            AuthenticationError::SessionNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn deleted_owner_is_reported() {
        let (manager, clock, mut store) = setup();
        issue_abc(&mut store, &clock).await;
        store.remove_principal(UserId::new(7));

        let err = manager
            .validate(&mut store, &"abc".into())
            .await
            .expect_err("owner gone");
        assert!(matches!(
            err.current_context(),
            AuthenticationError::SessionUserNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn role_changes_are_seen_on_next_validation() {
        let (manager, clock, mut store) = setup();
        issue_abc(&mut store, &clock).await;

        store.put_principal(Principal::new(UserId::new(7), Role::Teacher, "alice"));

        let principal = manager
            .validate(&mut store, &"abc".into())
            .await
            .expect("validate");
        assert_eq!(principal.role(), Role::Teacher);
    }

    #[tokio::test]
    async fn invalidate_all_for_user_ends_every_session() {
        let (manager, _clock, mut store) = setup();
        let a = manager.create(&mut store, UserId::new(7)).await.expect("create");
        let b = manager.create(&mut store, UserId::new(7)).await.expect("create");

        let count = manager
            .invalidate_all_for_user(&mut store, UserId::new(7))
            .await
            .expect("invalidate");
        assert_eq!(count, 2);

        for token in [a.token(), b.token()] {
            assert!(manager.validate(&mut store, token).await.is_err());
        }
    }

    #[tokio::test]
    async fn purge_removes_only_stale_sessions() {
        let (manager, clock, mut store) = setup();
        issue_abc(&mut store, &clock).await;
        clock.advance(Duration::minutes(90));
        let fresh = manager.create(&mut store, UserId::new(7)).await.expect("create");

        let purged = manager.purge_expired(&mut store).await.expect("purge");

        assert_eq!(purged, 1);
        assert!(manager.validate(&mut store, fresh.token()).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_validation_stops_once_invalidation_returns() {
        let (manager, clock, mut store) = setup();
        issue_abc(&mut store, &clock).await;
        let manager = Arc::new(manager);
        let invalidated = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let invalidated = Arc::clone(&invalidated);
                let mut store = store.clone();
                tokio::spawn(async move {
                    let token = SessionToken::from("abc");
                    for _ in 0..500 {
                        let after_invalidation = invalidated.load(Ordering::SeqCst);
                        match manager.validate(&mut store, &token).await {
                            Ok(principal) => {
                                assert!(!after_invalidation, "principal returned after invalidation");
                                assert_eq!(principal.id(), UserId::new(7));
                            }
                            Err(report) => assert!(matches!(
                                report.current_context(),
                                AuthenticationError::SessionNotFound { .. }
                            )),
                        }
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        tokio::task::yield_now().await;
        manager
            .invalidate(&mut store, &"abc".into())
            .await
            .expect("invalidate");
        invalidated.store(true, Ordering::SeqCst);

        for reader in readers {
            reader.await.expect("reader task");
        }
        assert!(manager.validate(&mut store, &"abc".into()).await.is_err());
    }
}
