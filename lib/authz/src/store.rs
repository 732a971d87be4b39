//! Storage abstractions consulted by the authorization facades.
//!
//! Like the session store, every method takes `&mut self` so the
//! implementation can be the request's transaction: the decision and the
//! guarded operation then read the same snapshot.

use async_trait::async_trait;
use proctor_core::{GroupId, Result, StorageError, SubmissionId, TaskId, UserId};
use proctor_platform_access::PrincipalDirectory;

use crate::types::{
    CollaboratorGrant, GroupRecord, PermissionLevel, Resource, SubmissionRecord, TaskRecord,
};

/// Ownership and relationship lookups for tasks, groups and submissions.
#[async_trait]
pub trait ResourceDirectory: Send {
    async fn find_task(&mut self, id: TaskId) -> Result<Option<TaskRecord>, StorageError>;

    async fn find_group(&mut self, id: GroupId) -> Result<Option<GroupRecord>, StorageError>;

    async fn find_submission(
        &mut self,
        id: SubmissionId,
    ) -> Result<Option<SubmissionRecord>, StorageError>;

    /// Returns true if `user` is a member of `group`.
    async fn is_group_member(&mut self, group: GroupId, user: UserId)
    -> Result<bool, StorageError>;

    /// Returns true if `task` is assigned to a group `user` belongs to.
    async fn is_task_assigned_to_member(
        &mut self,
        task: TaskId,
        user: UserId,
    ) -> Result<bool, StorageError>;

    /// Groups `user` created, collaborates on, or is a member of.
    async fn groups_related_to(&mut self, user: UserId) -> Result<Vec<GroupId>, StorageError>;

    async fn all_groups(&mut self) -> Result<Vec<GroupId>, StorageError>;
}

/// Persistence for collaborator grants.
///
/// Writes must be atomic per (resource, user) row.
#[async_trait]
pub trait GrantStore: Send {
    async fn find_grant(
        &mut self,
        resource: Resource,
        user: UserId,
    ) -> Result<Option<PermissionLevel>, StorageError>;

    /// Inserts the grant or replaces the level of an existing one.
    async fn upsert_grant(&mut self, grant: &CollaboratorGrant) -> Result<(), StorageError>;

    /// Deletes a grant. Returns false if none existed.
    async fn remove_grant(&mut self, resource: Resource, user: UserId)
    -> Result<bool, StorageError>;

    async fn list_grants(&mut self, resource: Resource)
    -> Result<Vec<CollaboratorGrant>, StorageError>;
}

/// Everything the facades need from storage.
pub trait AuthzStore: ResourceDirectory + GrantStore + PrincipalDirectory {}

impl<T> AuthzStore for T where T: ResourceDirectory + GrantStore + PrincipalDirectory + ?Sized {}
