//! In-memory authorization store.
//!
//! Wraps the platform-access `MemoryStore` for sessions and principals so a
//! single handle serves authentication and authorization in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use proctor_core::{ContestId, GroupId, Result, StorageError, SubmissionId, TaskId, UserId};
use proctor_platform_access::{
    MemoryStore, Principal, PrincipalDirectory, Session, SessionStore, SessionToken,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::store::{GrantStore, ResourceDirectory};
use crate::types::{
    CollaboratorGrant, GroupRecord, PermissionLevel, Resource, ResourceKind, SubmissionRecord,
    TaskRecord,
};

#[derive(Debug, Default)]
struct ResourceState {
    tasks: HashMap<TaskId, TaskRecord>,
    groups: BTreeMap<GroupId, GroupRecord>,
    submissions: HashMap<SubmissionId, SubmissionRecord>,
    members: HashSet<(GroupId, UserId)>,
    group_tasks: HashSet<(GroupId, TaskId)>,
    grants: HashMap<(Resource, UserId), PermissionLevel>,
}

/// Shared in-memory store for sessions, principals and resources.
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuthzStore {
    sessions: MemoryStore,
    resources: Arc<RwLock<ResourceState>>,
}

impl MemoryAuthzStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The session half of the store.
    #[must_use]
    pub fn sessions(&self) -> &MemoryStore {
        &self.sessions
    }

    pub fn put_principal(&self, principal: Principal) {
        self.sessions.put_principal(principal);
    }

    pub fn put_task(&self, id: TaskId, created_by: UserId) {
        self.lock().tasks.insert(id, TaskRecord { id, created_by });
    }

    pub fn put_group(&self, id: GroupId, created_by: UserId) {
        self.lock().groups.insert(id, GroupRecord { id, created_by });
    }

    pub fn put_submission(
        &self,
        id: SubmissionId,
        author: UserId,
        task_id: TaskId,
        contest_id: Option<ContestId>,
    ) {
        self.lock().submissions.insert(
            id,
            SubmissionRecord {
                id,
                author,
                task_id,
                contest_id,
            },
        );
    }

    /// Returns false if the user was already a member.
    pub fn add_member(&self, group: GroupId, user: UserId) -> bool {
        self.lock().members.insert((group, user))
    }

    /// Returns false if the user was not a member.
    pub fn remove_member(&self, group: GroupId, user: UserId) -> bool {
        self.lock().members.remove(&(group, user))
    }

    /// Members of a group, sorted by id.
    #[must_use]
    pub fn members(&self, group: GroupId) -> Vec<UserId> {
        let state = self.resources.read().unwrap_or_else(PoisonError::into_inner);
        let mut members: Vec<UserId> = state
            .members
            .iter()
            .filter(|(g, _)| *g == group)
            .map(|(_, user)| *user)
            .collect();
        members.sort();
        members
    }

    pub fn assign_task(&self, group: GroupId, task: TaskId) {
        self.lock().group_tasks.insert((group, task));
    }

    /// Writes a grant directly, bypassing the facades.
    pub fn grant(&self, resource: Resource, user: UserId, level: PermissionLevel) {
        self.lock().grants.insert((resource, user), level);
    }

    fn lock(&self) -> RwLockWriteGuard<'_, ResourceState> {
        self.resources.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, ResourceState>, StorageError> {
        self.resources
            .read()
            .map_err(|_| StorageError::new("memory store lock poisoned").into())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, ResourceState>, StorageError> {
        self.resources
            .write()
            .map_err(|_| StorageError::new("memory store lock poisoned").into())
    }
}

#[async_trait]
impl ResourceDirectory for MemoryAuthzStore {
    async fn find_task(&mut self, id: TaskId) -> Result<Option<TaskRecord>, StorageError> {
        Ok(self.read()?.tasks.get(&id).copied())
    }

    async fn find_group(&mut self, id: GroupId) -> Result<Option<GroupRecord>, StorageError> {
        Ok(self.read()?.groups.get(&id).copied())
    }

    async fn find_submission(
        &mut self,
        id: SubmissionId,
    ) -> Result<Option<SubmissionRecord>, StorageError> {
        Ok(self.read()?.submissions.get(&id).copied())
    }

    async fn is_group_member(&mut self, group: GroupId, user: UserId) -> Result<bool, StorageError> {
        Ok(self.read()?.members.contains(&(group, user)))
    }

    async fn is_task_assigned_to_member(
        &mut self,
        task: TaskId,
        user: UserId,
    ) -> Result<bool, StorageError> {
        let state = self.read()?;
        Ok(state
            .group_tasks
            .iter()
            .any(|(group, t)| *t == task && state.members.contains(&(*group, user))))
    }

    async fn groups_related_to(&mut self, user: UserId) -> Result<Vec<GroupId>, StorageError> {
        let state = self.read()?;
        let mut related = BTreeSet::new();
        related.extend(
            state
                .groups
                .values()
                .filter(|g| g.created_by == user)
                .map(|g| g.id),
        );
        related.extend(
            state
                .members
                .iter()
                .filter(|(_, u)| *u == user)
                .map(|(g, _)| *g),
        );
        related.extend(state.grants.keys().filter_map(|(resource, u)| {
            (*u == user && resource.kind() == ResourceKind::Group)
                .then(|| GroupId::new(resource.id()))
        }));
        Ok(related.into_iter().collect())
    }

    async fn all_groups(&mut self) -> Result<Vec<GroupId>, StorageError> {
        Ok(self.read()?.groups.keys().copied().collect())
    }
}

#[async_trait]
impl GrantStore for MemoryAuthzStore {
    async fn find_grant(
        &mut self,
        resource: Resource,
        user: UserId,
    ) -> Result<Option<PermissionLevel>, StorageError> {
        Ok(self.read()?.grants.get(&(resource, user)).copied())
    }

    async fn upsert_grant(&mut self, grant: &CollaboratorGrant) -> Result<(), StorageError> {
        self.write()?
            .grants
            .insert((grant.resource, grant.user_id), grant.level);
        Ok(())
    }

    async fn remove_grant(&mut self, resource: Resource, user: UserId) -> Result<bool, StorageError> {
        Ok(self.write()?.grants.remove(&(resource, user)).is_some())
    }

    async fn list_grants(&mut self, resource: Resource) -> Result<Vec<CollaboratorGrant>, StorageError> {
        let state = self.read()?;
        let mut grants: Vec<CollaboratorGrant> = state
            .grants
            .iter()
            .filter(|((r, _), _)| *r == resource)
            .map(|((r, user), level)| CollaboratorGrant::new(*r, *user, *level))
            .collect();
        grants.sort_by_key(|g| g.user_id);
        Ok(grants)
    }
}

#[async_trait]
impl PrincipalDirectory for MemoryAuthzStore {
    async fn find_principal(&mut self, id: UserId) -> Result<Option<Principal>, StorageError> {
        self.sessions.find_principal(id).await
    }
}

#[async_trait]
impl SessionStore for MemoryAuthzStore {
    async fn insert_session(&mut self, session: &Session) -> Result<bool, StorageError> {
        self.sessions.insert_session(session).await
    }

    async fn find_session(&mut self, token: &SessionToken) -> Result<Option<Session>, StorageError> {
        self.sessions.find_session(token).await
    }

    async fn invalidate_session(&mut self, token: &SessionToken) -> Result<bool, StorageError> {
        self.sessions.invalidate_session(token).await
    }

    async fn invalidate_user_sessions(&mut self, user_id: UserId) -> Result<u64, StorageError> {
        self.sessions.invalidate_user_sessions(user_id).await
    }

    async fn delete_stale_sessions(&mut self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        self.sessions.delete_stale_sessions(now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proctor_platform_access::{ManualClock, Role, SessionManager};

    #[tokio::test]
    async fn grants_are_unique_per_resource_and_user() {
        let mut store = MemoryAuthzStore::new();
        let task = Resource::task(TaskId::new(1));

        store
            .upsert_grant(&CollaboratorGrant::new(task, UserId::new(9), PermissionLevel::View))
            .await
            .expect("insert");
        store
            .upsert_grant(&CollaboratorGrant::new(task, UserId::new(9), PermissionLevel::Edit))
            .await
            .expect("replace");

        let grants = store.list_grants(task).await.expect("list");
        assert_eq!(grants, vec![CollaboratorGrant::new(task, UserId::new(9), PermissionLevel::Edit)]);
        assert!(store.remove_grant(task, UserId::new(9)).await.expect("remove"));
        assert!(!store.remove_grant(task, UserId::new(9)).await.expect("remove again"));
    }

    #[tokio::test]
    async fn grants_do_not_cross_resource_kinds() {
        let mut store = MemoryAuthzStore::new();
        store.grant(Resource::task(TaskId::new(1)), UserId::new(9), PermissionLevel::Manage);

        assert_eq!(
            store
                .find_grant(Resource::group(GroupId::new(1)), UserId::new(9))
                .await
                .expect("lookup"),
            None
        );
    }

    #[tokio::test]
    async fn task_assignment_requires_membership() {
        let mut store = MemoryAuthzStore::new();
        store.put_group(GroupId::new(5), UserId::new(3));
        store.put_task(TaskId::new(1), UserId::new(3));
        store.assign_task(GroupId::new(5), TaskId::new(1));

        assert!(
            !store
                .is_task_assigned_to_member(TaskId::new(1), UserId::new(9))
                .await
                .expect("lookup")
        );
        store.add_member(GroupId::new(5), UserId::new(9));
        assert!(
            store
                .is_task_assigned_to_member(TaskId::new(1), UserId::new(9))
                .await
                .expect("lookup")
        );
        assert_eq!(store.members(GroupId::new(5)), vec![UserId::new(9)]);
    }

    #[tokio::test]
    async fn one_handle_serves_authentication() {
        let mut store = MemoryAuthzStore::new();
        store.put_principal(Principal::new(UserId::new(7), Role::Student, "alice"));
        let manager = SessionManager::new(ManualClock::new(Utc::now()), chrono::Duration::hours(1));

        let session = manager.create(&mut store, UserId::new(7)).await.expect("create");
        let principal = manager
            .validate(&mut store, session.token())
            .await
            .expect("validate");
        assert_eq!(principal.id(), UserId::new(7));
        assert_eq!(store.sessions().session_count(), 1);
    }
}
