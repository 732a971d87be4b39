//! Ownership lookups and collaborator grants.

use async_trait::async_trait;
use proctor_authz::{
    CollaboratorGrant, GrantStore, GroupRecord, PermissionLevel, Resource, ResourceDirectory,
    SubmissionRecord, TaskRecord,
};
use proctor_core::{ContestId, GroupId, Result, StorageError, SubmissionId, TaskId, UserId};

use super::{PgStore, db_error};

fn parse_level(level: &str) -> Result<PermissionLevel, StorageError> {
    level
        .parse()
        .map_err(|e| StorageError::new(e).into())
}

#[async_trait]
impl ResourceDirectory for PgStore {
    async fn find_task(&mut self, id: TaskId) -> Result<Option<TaskRecord>, StorageError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT created_by FROM tasks WHERE id = $1")
            .bind(id.get())
            .fetch_optional(self.conn())
            .await
            .map_err(db_error)?;

        Ok(row.map(|(created_by,)| TaskRecord {
            id,
            created_by: UserId::new(created_by),
        }))
    }

    async fn find_group(&mut self, id: GroupId) -> Result<Option<GroupRecord>, StorageError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT created_by FROM groups WHERE id = $1")
            .bind(id.get())
            .fetch_optional(self.conn())
            .await
            .map_err(db_error)?;

        Ok(row.map(|(created_by,)| GroupRecord {
            id,
            created_by: UserId::new(created_by),
        }))
    }

    async fn find_submission(
        &mut self,
        id: SubmissionId,
    ) -> Result<Option<SubmissionRecord>, StorageError> {
        let row: Option<(i64, i64, Option<i64>)> = sqlx::query_as(
            r#"
            SELECT author, task_id, contest_id
            FROM submissions
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(self.conn())
        .await
        .map_err(db_error)?;

        Ok(row.map(|(author, task_id, contest_id)| SubmissionRecord {
            id,
            author: UserId::new(author),
            task_id: TaskId::new(task_id),
            contest_id: contest_id.map(ContestId::new),
        }))
    }

    async fn is_group_member(&mut self, group: GroupId, user: UserId) -> Result<bool, StorageError> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM group_members WHERE group_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(group.get())
        .bind(user.get())
        .fetch_one(self.conn())
        .await
        .map_err(db_error)
    }

    async fn is_task_assigned_to_member(
        &mut self,
        task: TaskId,
        user: UserId,
    ) -> Result<bool, StorageError> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM group_tasks gt
                JOIN group_members gm ON gm.group_id = gt.group_id
                WHERE gt.task_id = $1 AND gm.user_id = $2
            )
            "#,
        )
        .bind(task.get())
        .bind(user.get())
        .fetch_one(self.conn())
        .await
        .map_err(db_error)
    }

    async fn groups_related_to(&mut self, user: UserId) -> Result<Vec<GroupId>, StorageError> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT id FROM groups WHERE created_by = $1
            UNION
            SELECT group_id FROM group_members WHERE user_id = $1
            UNION
            SELECT resource_id FROM collaborators
            WHERE resource_kind = 'group' AND user_id = $1
            ORDER BY 1
            "#,
        )
        .bind(user.get())
        .fetch_all(self.conn())
        .await
        .map_err(db_error)?;

        Ok(ids.into_iter().map(GroupId::new).collect())
    }

    async fn all_groups(&mut self) -> Result<Vec<GroupId>, StorageError> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM groups ORDER BY id")
            .fetch_all(self.conn())
            .await
            .map_err(db_error)?;

        Ok(ids.into_iter().map(GroupId::new).collect())
    }
}

#[async_trait]
impl GrantStore for PgStore {
    async fn find_grant(
        &mut self,
        resource: Resource,
        user: UserId,
    ) -> Result<Option<PermissionLevel>, StorageError> {
        let level: Option<String> = sqlx::query_scalar(
            r#"
            SELECT level FROM collaborators
            WHERE resource_kind = $1 AND resource_id = $2 AND user_id = $3
            "#,
        )
        .bind(resource.kind().as_str())
        .bind(resource.id())
        .bind(user.get())
        .fetch_optional(self.conn())
        .await
        .map_err(db_error)?;

        level.as_deref().map(parse_level).transpose()
    }

    async fn upsert_grant(&mut self, grant: &CollaboratorGrant) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO collaborators (resource_kind, resource_id, user_id, level)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (resource_kind, resource_id, user_id)
            DO UPDATE SET level = EXCLUDED.level
            "#,
        )
        .bind(grant.resource.kind().as_str())
        .bind(grant.resource.id())
        .bind(grant.user_id.get())
        .bind(grant.level.as_str())
        .execute(self.conn())
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn remove_grant(&mut self, resource: Resource, user: UserId) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            DELETE FROM collaborators
            WHERE resource_kind = $1 AND resource_id = $2 AND user_id = $3
            "#,
        )
        .bind(resource.kind().as_str())
        .bind(resource.id())
        .bind(user.get())
        .execute(self.conn())
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_grants(&mut self, resource: Resource) -> Result<Vec<CollaboratorGrant>, StorageError> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            r#"
            SELECT user_id, level FROM collaborators
            WHERE resource_kind = $1 AND resource_id = $2
            ORDER BY user_id
            "#,
        )
        .bind(resource.kind().as_str())
        .bind(resource.id())
        .fetch_all(self.conn())
        .await
        .map_err(db_error)?;

        rows.into_iter()
            .map(|(user_id, level)| {
                Ok(CollaboratorGrant::new(
                    resource,
                    UserId::new(user_id),
                    parse_level(&level)?,
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_levels_parse() {
        assert_eq!(parse_level("manage").expect("valid"), PermissionLevel::Manage);
        assert!(parse_level("owner").is_err());
    }
}
