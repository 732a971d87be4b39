//! Postgres persistence.
//!
//! A [`PgStore`] wraps one transaction and implements every store trait
//! the session manager and the authorization facades need, so a request
//! authenticates, authorizes and performs its operation on one snapshot.

mod records;
mod resources;

pub use records::{GroupSummary, MemberSummary, NewSubmission, SubmissionDetail, SubmissionSummary, TaskSummary};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use proctor_core::{Result, StorageError, UserId};
use proctor_platform_access::{
    Principal, PrincipalDirectory, Role, Session, SessionStore, SessionToken,
};
use rootcause::Report;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};

pub(crate) fn db_error(error: sqlx::Error) -> Report<StorageError> {
    StorageError::new(error).into()
}

/// Row type for session queries.
#[derive(FromRow)]
struct SessionRow {
    token: String,
    user_id: i64,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    valid: bool,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session::from_parts(
            SessionToken::new(row.token),
            UserId::new(row.user_id),
            row.created_at,
            row.expires_at,
            row.valid,
        )
    }
}

/// Row type for principal queries.
#[derive(FromRow)]
struct PrincipalRow {
    id: i64,
    username: String,
    display_name: Option<String>,
    email: Option<String>,
    role: String,
}

impl PrincipalRow {
    fn try_into_principal(self) -> Result<Principal, StorageError> {
        let role: Role = self.role.parse().map_err(|e| {
            StorageError::new(format!("invalid role for user {}: {}", self.id, e))
        })?;
        Ok(Principal::new(UserId::new(self.id), role, self.username)
            .with_display_name(self.display_name)
            .with_email(self.email))
    }
}

/// One database transaction.
///
/// Dropping the store without calling [`PgStore::commit`] rolls back.
pub struct PgStore {
    tx: Transaction<'static, Postgres>,
}

impl PgStore {
    /// Begins a transaction on `pool`.
    ///
    /// # Errors
    ///
    /// Fails fast when no connection is available.
    pub async fn begin(pool: &PgPool) -> Result<Self, StorageError> {
        let tx = pool.begin().await.map_err(db_error)?;
        Ok(Self { tx })
    }

    pub async fn commit(self) -> Result<(), StorageError> {
        self.tx.commit().await.map_err(db_error)
    }

    fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn insert_session(&mut self, session: &Session) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO sessions (token, user_id, created_at, expires_at, valid)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (token) DO NOTHING
            "#,
        )
        .bind(session.token().as_str())
        .bind(session.user_id().get())
        .bind(session.created_at())
        .bind(session.expires_at())
        .bind(session.is_marked_valid())
        .execute(self.conn())
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_session(&mut self, token: &SessionToken) -> Result<Option<Session>, StorageError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT token, user_id, created_at, expires_at, valid
            FROM sessions
            WHERE token = $1
            "#,
        )
        .bind(token.as_str())
        .fetch_optional(self.conn())
        .await
        .map_err(db_error)?;

        Ok(row.map(Session::from))
    }

    async fn invalidate_session(&mut self, token: &SessionToken) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET valid = FALSE
            WHERE token = $1
            "#,
        )
        .bind(token.as_str())
        .execute(self.conn())
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn invalidate_user_sessions(&mut self, user_id: UserId) -> Result<u64, StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET valid = FALSE
            WHERE user_id = $1 AND valid
            "#,
        )
        .bind(user_id.get())
        .execute(self.conn())
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected())
    }

    async fn delete_stale_sessions(&mut self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE NOT valid OR expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(self.conn())
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl PrincipalDirectory for PgStore {
    async fn find_principal(&mut self, id: UserId) -> Result<Option<Principal>, StorageError> {
        let row: Option<PrincipalRow> = sqlx::query_as(
            r#"
            SELECT id, username, display_name, email, role
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(self.conn())
        .await
        .map_err(db_error)?;

        row.map(PrincipalRow::try_into_principal).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_row_rejects_unknown_roles() {
        let row = PrincipalRow {
            id: 7,
            username: "alice".into(),
            display_name: None,
            email: None,
            role: "superuser".into(),
        };
        let err = row.try_into_principal().expect_err("unknown role");
        assert!(err.to_string().contains("superuser"));
    }

    #[test]
    fn principal_row_maps_every_column() {
        let row = PrincipalRow {
            id: 3,
            username: "bob".into(),
            display_name: Some("Bob".into()),
            email: Some("bob@example.com".into()),
            role: "teacher".into(),
        };
        let principal = row.try_into_principal().expect("valid row");
        assert_eq!(principal.id(), UserId::new(3));
        assert_eq!(principal.role(), Role::Teacher);
        assert_eq!(principal.display_name(), Some("Bob"));
        assert_eq!(principal.email(), Some("bob@example.com"));
    }

    #[test]
    fn session_row_keeps_validity_flag() {
        let now = Utc::now();
        let session = Session::from(SessionRow {
            token: "abc".into(),
            user_id: 7,
            created_at: now,
            expires_at: now + chrono::Duration::hours(1),
            valid: false,
        });
        assert_eq!(session.token().as_str(), "abc");
        assert!(!session.is_marked_valid());
    }
}
