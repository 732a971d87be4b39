//! Queries behind the guarded operations: users, tasks, groups and
//! submissions. Callers authorize before calling these.

use chrono::{DateTime, Utc};
use proctor_core::{GroupId, Result, StorageError, SubmissionId, TaskId, UserId};
use proctor_platform_access::Role;
use serde::Serialize;
use sqlx::FromRow;

use super::{PgStore, db_error};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TaskSummary {
    #[sqlx(try_from = "i64")]
    pub id: TaskId,
    pub title: String,
    #[sqlx(try_from = "i64")]
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct GroupSummary {
    #[sqlx(try_from = "i64")]
    pub id: GroupId,
    pub name: String,
    #[sqlx(try_from = "i64")]
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MemberSummary {
    #[sqlx(try_from = "i64")]
    pub user_id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SubmissionSummary {
    #[sqlx(try_from = "i64")]
    pub id: SubmissionId,
    #[sqlx(try_from = "i64")]
    pub task_id: TaskId,
    #[sqlx(try_from = "i64")]
    pub author: UserId,
    pub contest_id: Option<i64>,
    pub language: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// A submission including its source code.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SubmissionDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub summary: SubmissionSummary,
    pub source: String,
}

/// Payload for a new submission.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub task_id: TaskId,
    pub author: UserId,
    pub contest_id: Option<i64>,
    pub language: String,
    pub source: String,
}

const SUBMISSION_COLUMNS: &str = "id, task_id, author, contest_id, language, status, created_at";

impl PgStore {
    /// Returns the id and password hash of `username`.
    pub async fn find_credentials(
        &mut self,
        username: &str,
    ) -> Result<Option<(UserId, String)>, StorageError> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, password_hash FROM users WHERE username = $1")
                .bind(username)
                .fetch_optional(self.conn())
                .await
                .map_err(db_error)?;

        Ok(row.map(|(id, hash)| (UserId::new(id), hash)))
    }

    pub async fn count_users(&mut self) -> Result<i64, StorageError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.conn())
            .await
            .map_err(db_error)
    }

    pub async fn create_user(
        &mut self,
        username: &str,
        role: Role,
        password_hash: &str,
    ) -> Result<UserId, StorageError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO users (username, role, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(username)
        .bind(role.as_str())
        .bind(password_hash)
        .fetch_one(self.conn())
        .await
        .map_err(db_error)?;

        Ok(UserId::new(id))
    }

    pub async fn create_task(&mut self, title: &str, owner: UserId) -> Result<TaskSummary, StorageError> {
        sqlx::query_as(
            r#"
            INSERT INTO tasks (title, created_by)
            VALUES ($1, $2)
            RETURNING id, title, created_by, created_at
            "#,
        )
        .bind(title)
        .bind(owner.get())
        .fetch_one(self.conn())
        .await
        .map_err(db_error)
    }

    /// Deletes a task with its grants. Submissions go with it by cascade.
    pub async fn delete_task(&mut self, id: TaskId) -> Result<bool, StorageError> {
        sqlx::query("DELETE FROM collaborators WHERE resource_kind = 'task' AND resource_id = $1")
            .bind(id.get())
            .execute(self.conn())
            .await
            .map_err(db_error)?;

        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id.get())
            .execute(self.conn())
            .await
            .map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn create_group(&mut self, name: &str, owner: UserId) -> Result<GroupSummary, StorageError> {
        sqlx::query_as(
            r#"
            INSERT INTO groups (name, created_by)
            VALUES ($1, $2)
            RETURNING id, name, created_by, created_at
            "#,
        )
        .bind(name)
        .bind(owner.get())
        .fetch_one(self.conn())
        .await
        .map_err(db_error)
    }

    pub async fn list_groups(&mut self, ids: &[GroupId]) -> Result<Vec<GroupSummary>, StorageError> {
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        sqlx::query_as(
            r#"
            SELECT id, name, created_by, created_at
            FROM groups
            WHERE id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(ids)
        .fetch_all(self.conn())
        .await
        .map_err(db_error)
    }

    pub async fn list_members(&mut self, group: GroupId) -> Result<Vec<MemberSummary>, StorageError> {
        sqlx::query_as(
            r#"
            SELECT u.id AS user_id, u.username
            FROM group_members gm
            JOIN users u ON u.id = gm.user_id
            WHERE gm.group_id = $1
            ORDER BY u.id
            "#,
        )
        .bind(group.get())
        .fetch_all(self.conn())
        .await
        .map_err(db_error)
    }

    /// Returns false if the user was already a member.
    pub async fn add_member(&mut self, group: GroupId, user: UserId) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO group_members (group_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(group.get())
        .bind(user.get())
        .execute(self.conn())
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn remove_member(&mut self, group: GroupId, user: UserId) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM group_members WHERE group_id = $1 AND user_id = $2")
            .bind(group.get())
            .bind(user.get())
            .execute(self.conn())
            .await
            .map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_group_tasks(&mut self, group: GroupId) -> Result<Vec<TaskSummary>, StorageError> {
        sqlx::query_as(
            r#"
            SELECT t.id, t.title, t.created_by, t.created_at
            FROM group_tasks gt
            JOIN tasks t ON t.id = gt.task_id
            WHERE gt.group_id = $1
            ORDER BY t.id
            "#,
        )
        .bind(group.get())
        .fetch_all(self.conn())
        .await
        .map_err(db_error)
    }

    pub async fn assign_task(&mut self, group: GroupId, task: TaskId) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO group_tasks (group_id, task_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(group.get())
        .bind(task.get())
        .execute(self.conn())
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn create_submission(
        &mut self,
        submission: &NewSubmission,
    ) -> Result<SubmissionSummary, StorageError> {
        sqlx::query_as(&format!(
            r#"
            INSERT INTO submissions (task_id, author, contest_id, language, source)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {SUBMISSION_COLUMNS}
            "#
        ))
        .bind(submission.task_id.get())
        .bind(submission.author.get())
        .bind(submission.contest_id)
        .bind(&submission.language)
        .bind(&submission.source)
        .fetch_one(self.conn())
        .await
        .map_err(db_error)
    }

    pub async fn list_task_submissions(
        &mut self,
        task: TaskId,
    ) -> Result<Vec<SubmissionSummary>, StorageError> {
        sqlx::query_as(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE task_id = $1 ORDER BY id DESC"
        ))
        .bind(task.get())
        .fetch_all(self.conn())
        .await
        .map_err(db_error)
    }

    pub async fn list_user_submissions(
        &mut self,
        user: UserId,
    ) -> Result<Vec<SubmissionSummary>, StorageError> {
        sqlx::query_as(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE author = $1 ORDER BY id DESC"
        ))
        .bind(user.get())
        .fetch_all(self.conn())
        .await
        .map_err(db_error)
    }

    pub async fn find_submission_detail(
        &mut self,
        id: SubmissionId,
    ) -> Result<Option<SubmissionDetail>, StorageError> {
        sqlx::query_as(&format!(
            "SELECT {SUBMISSION_COLUMNS}, source FROM submissions WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(self.conn())
        .await
        .map_err(db_error)
    }

    /// Puts a submission back in the grading queue.
    pub async fn mark_for_rejudge(&mut self, id: SubmissionId) -> Result<(), StorageError> {
        sqlx::query("UPDATE submissions SET status = 'pending' WHERE id = $1")
            .bind(id.get())
            .execute(self.conn())
            .await
            .map_err(db_error)?;

        Ok(())
    }
}
