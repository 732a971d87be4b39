//! Authorization facade for tasks.

use proctor_core::{Result, TaskId, UserId};
use proctor_platform_access::Principal;
use tracing::{debug, instrument};

use crate::collaborators::{CollaboratorRegistry, storage_failure};
use crate::error::AuthzError;
use crate::evaluator::{AccessFacts, Decision, evaluate};
use crate::store::AuthzStore;
use crate::types::{Action, CollaboratorGrant, PermissionLevel, Resource, TaskRecord};

/// Task authorization over a store handle (usually the request's
/// transaction).
///
/// Every check loads the task first: a missing task is `NotFound` no
/// matter who asks.
pub struct TaskAuthz<'a, S: ?Sized> {
    store: &'a mut S,
}

impl<'a, S> TaskAuthz<'a, S>
where
    S: AuthzStore + ?Sized,
{
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    /// Loads a task or fails with `NotFound`.
    pub async fn load(&mut self, task_id: TaskId) -> Result<TaskRecord, AuthzError> {
        self.store
            .find_task(task_id)
            .await
            .map_err(storage_failure)?
            .ok_or_else(|| AuthzError::not_found(Resource::task(task_id)).into())
    }

    /// Gathers the facts `action` depends on.
    pub(crate) async fn facts(
        &mut self,
        principal: &Principal,
        task: &TaskRecord,
        action: Action,
    ) -> Result<AccessFacts, AuthzError> {
        let resource = Resource::task(task.id);
        let mut facts = AccessFacts::new(resource).with_creator(task.created_by);
        if principal.is_admin() || task.created_by == principal.id() {
            return Ok(facts);
        }

        let grant = self
            .store
            .find_grant(resource, principal.id())
            .await
            .map_err(storage_failure)?;
        facts = facts.with_grant(grant);

        if action.allowed_to_group_members() && grant.is_none() {
            let member = self
                .store
                .is_task_assigned_to_member(task.id, principal.id())
                .await
                .map_err(storage_failure)?;
            facts = facts.with_group_member(member);
        }
        Ok(facts)
    }

    /// Returns the decision for `action`, or `NotFound`.
    #[instrument(skip(self, principal), fields(user_id = %principal.id()))]
    pub async fn decide(
        &mut self,
        principal: &Principal,
        task_id: TaskId,
        action: Action,
    ) -> Result<Decision, AuthzError> {
        let task = self.load(task_id).await?;
        let facts = self.facts(principal, &task, action).await?;
        let decision = evaluate(principal, &facts, action);
        debug!(?decision, "task decision");
        Ok(decision)
    }

    /// Fails with `Forbidden` unless `action` is allowed. Returns the task.
    pub async fn authorize(
        &mut self,
        principal: &Principal,
        task_id: TaskId,
        action: Action,
    ) -> Result<TaskRecord, AuthzError> {
        let task = self.load(task_id).await?;
        let facts = self.facts(principal, &task, action).await?;
        match evaluate(principal, &facts, action) {
            Decision::Allow(basis) => {
                debug!(task_id = %task_id, %action, %basis, "task action allowed");
                Ok(task)
            }
            Decision::Deny => {
                debug!(task_id = %task_id, %action, user_id = %principal.id(), "task action denied");
                Err(AuthzError::forbidden(Resource::task(task_id), action).into())
            }
        }
    }

    pub async fn can_view(&mut self, principal: &Principal, task_id: TaskId) -> Result<bool, AuthzError> {
        Ok(self.decide(principal, task_id, Action::ViewTask).await?.is_allowed())
    }

    pub async fn can_edit(&mut self, principal: &Principal, task_id: TaskId) -> Result<bool, AuthzError> {
        Ok(self.decide(principal, task_id, Action::EditTask).await?.is_allowed())
    }

    pub async fn can_manage(&mut self, principal: &Principal, task_id: TaskId) -> Result<bool, AuthzError> {
        Ok(self
            .decide(principal, task_id, Action::ManageTaskCollaborators)
            .await?
            .is_allowed())
    }

    /// Only admins may create a task on behalf of someone else.
    pub fn authorize_create(&self, principal: &Principal, owner: UserId) -> Result<(), AuthzError> {
        if principal.is_admin() || principal.id() == owner {
            return Ok(());
        }
        Err(AuthzError::forbidden(format!("user:{owner}/tasks"), "create_task").into())
    }

    /// Lists collaborator grants. Requires `view`.
    pub async fn list_collaborators(
        &mut self,
        principal: &Principal,
        task_id: TaskId,
    ) -> Result<Vec<CollaboratorGrant>, AuthzError> {
        let task = self
            .authorize(principal, task_id, Action::ListTaskCollaborators)
            .await?;
        self.registry(&task).list().await
    }

    /// Grants `level` to `target`, replacing any existing grant.
    pub async fn add_collaborator(
        &mut self,
        principal: &Principal,
        task_id: TaskId,
        target: UserId,
        level: PermissionLevel,
    ) -> Result<CollaboratorGrant, AuthzError> {
        let task = self
            .authorize(principal, task_id, Action::ManageTaskCollaborators)
            .await?;
        self.registry(&task).add(target, level).await
    }

    /// Changes the level of an existing collaborator.
    pub async fn update_collaborator(
        &mut self,
        principal: &Principal,
        task_id: TaskId,
        target: UserId,
        level: PermissionLevel,
    ) -> Result<CollaboratorGrant, AuthzError> {
        let task = self
            .authorize(principal, task_id, Action::ManageTaskCollaborators)
            .await?;
        self.registry(&task).update(target, level).await
    }

    /// Removes a collaborator. The creator can never be removed.
    pub async fn remove_collaborator(
        &mut self,
        principal: &Principal,
        task_id: TaskId,
        target: UserId,
    ) -> Result<(), AuthzError> {
        let task = self.load(task_id).await?;
        if target == task.created_by {
            return Err(AuthzError::forbidden(Resource::task(task_id), "remove_collaborator").into());
        }
        self.authorize(principal, task_id, Action::ManageTaskCollaborators)
            .await?;
        self.registry(&task).remove(target).await
    }

    fn registry(&mut self, task: &TaskRecord) -> CollaboratorRegistry<'_, S> {
        CollaboratorRegistry::new(&mut *self.store, Resource::task(task.id), task.created_by)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryAuthzStore;
    use proctor_core::GroupId;
    use proctor_platform_access::Role;

    fn principal(id: i64, role: Role) -> Principal {
        Principal::new(UserId::new(id), role, format!("user{id}"))
    }

    /// Task 1 created by student 7; users 9 (student) and 3 (teacher) exist.
    fn setup() -> MemoryAuthzStore {
        let store = MemoryAuthzStore::new();
        store.put_principal(principal(7, Role::Student));
        store.put_principal(principal(9, Role::Student));
        store.put_principal(principal(3, Role::Teacher));
        store.put_principal(principal(1, Role::Admin));
        store.put_task(TaskId::new(1), UserId::new(7));
        store
    }

    fn forbidden<T: std::fmt::Debug>(result: Result<T, AuthzError>) -> bool {
        matches!(
            result.expect_err("should fail").current_context(),
            AuthzError::Forbidden { .. }
        )
    }

    fn not_found<T: std::fmt::Debug>(result: Result<T, AuthzError>) -> bool {
        matches!(
            result.expect_err("should fail").current_context(),
            AuthzError::NotFound { .. }
        )
    }

    #[tokio::test]
    async fn edit_collaborator_scenario() {
        let mut store = setup();
        let creator = principal(7, Role::Student);
        let collaborator = principal(9, Role::Student);
        let mut authz = TaskAuthz::new(&mut store);

        authz
            .add_collaborator(&creator, TaskId::new(1), UserId::new(9), PermissionLevel::Edit)
            .await
            .expect("add");

        assert!(
            authz
                .decide(&collaborator, TaskId::new(1), Action::EditTask)
                .await
                .expect("decide")
                .is_allowed()
        );
        assert_eq!(
            authz
                .decide(&collaborator, TaskId::new(1), Action::ManageTaskCollaborators)
                .await
                .expect("decide"),
            Decision::Deny
        );
    }

    #[tokio::test]
    async fn adding_twice_replaces_the_level() {
        let mut store = setup();
        let creator = principal(7, Role::Student);
        let mut authz = TaskAuthz::new(&mut store);

        authz
            .add_collaborator(&creator, TaskId::new(1), UserId::new(9), PermissionLevel::View)
            .await
            .expect("add");
        authz
            .add_collaborator(&creator, TaskId::new(1), UserId::new(9), PermissionLevel::Manage)
            .await
            .expect("add again");

        let grants = authz
            .list_collaborators(&creator, TaskId::new(1))
            .await
            .expect("list");
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].level, PermissionLevel::Manage);
    }

    #[tokio::test]
    async fn creator_cannot_be_removed_by_anyone() {
        let mut store = setup();
        store.grant(Resource::task(TaskId::new(1)), UserId::new(9), PermissionLevel::Manage);
        let mut authz = TaskAuthz::new(&mut store);

        for caller in [
            principal(7, Role::Student),
            principal(9, Role::Student),
            principal(3, Role::Teacher),
            principal(1, Role::Admin),
        ] {
            assert!(forbidden(
                authz
                    .remove_collaborator(&caller, TaskId::new(1), UserId::new(7))
                    .await
            ));
        }
        assert!(
            authz
                .can_manage(&principal(7, Role::Student), TaskId::new(1))
                .await
                .expect("decide")
        );
    }

    #[tokio::test]
    async fn creator_cannot_be_demoted() {
        let mut store = setup();
        let admin = principal(1, Role::Admin);
        let mut authz = TaskAuthz::new(&mut store);

        assert!(forbidden(
            authz
                .update_collaborator(&admin, TaskId::new(1), UserId::new(7), PermissionLevel::View)
                .await
        ));
        assert!(forbidden(
            authz
                .add_collaborator(&admin, TaskId::new(1), UserId::new(7), PermissionLevel::View)
                .await
        ));
    }

    #[tokio::test]
    async fn view_collaborator_sees_list_but_cannot_change_it() {
        let mut store = setup();
        store.grant(Resource::task(TaskId::new(1)), UserId::new(9), PermissionLevel::View);
        let viewer = principal(9, Role::Student);
        let mut authz = TaskAuthz::new(&mut store);

        let grants = authz
            .list_collaborators(&viewer, TaskId::new(1))
            .await
            .expect("list");
        assert_eq!(grants.len(), 1);

        assert!(forbidden(
            authz
                .add_collaborator(&viewer, TaskId::new(1), UserId::new(3), PermissionLevel::View)
                .await
        ));
        assert!(!authz.can_edit(&viewer, TaskId::new(1)).await.expect("decide"));
    }

    #[tokio::test]
    async fn manage_collaborator_can_manage_others() {
        let mut store = setup();
        store.grant(Resource::task(TaskId::new(1)), UserId::new(9), PermissionLevel::Manage);
        let manager = principal(9, Role::Student);
        let mut authz = TaskAuthz::new(&mut store);

        authz
            .add_collaborator(&manager, TaskId::new(1), UserId::new(3), PermissionLevel::Edit)
            .await
            .expect("add");
        authz
            .update_collaborator(&manager, TaskId::new(1), UserId::new(3), PermissionLevel::View)
            .await
            .expect("update");
        authz
            .remove_collaborator(&manager, TaskId::new(1), UserId::new(3))
            .await
            .expect("remove");
    }

    #[tokio::test]
    async fn removing_a_grant_revokes_access() {
        let mut store = setup();
        store.grant(Resource::task(TaskId::new(1)), UserId::new(9), PermissionLevel::Edit);
        let creator = principal(7, Role::Student);
        let collaborator = principal(9, Role::Student);
        let mut authz = TaskAuthz::new(&mut store);

        authz
            .remove_collaborator(&creator, TaskId::new(1), UserId::new(9))
            .await
            .expect("remove");

        assert!(!authz.can_view(&collaborator, TaskId::new(1)).await.expect("decide"));
    }

    #[tokio::test]
    async fn missing_task_is_not_found_for_everyone() {
        let mut store = setup();
        let mut authz = TaskAuthz::new(&mut store);

        assert!(not_found(
            authz.can_view(&principal(1, Role::Admin), TaskId::new(404)).await
        ));
        assert!(not_found(
            authz
                .list_collaborators(&principal(3, Role::Teacher), TaskId::new(404))
                .await
        ));
    }

    #[tokio::test]
    async fn unknown_collaborator_targets_are_not_found() {
        let mut store = setup();
        let creator = principal(7, Role::Student);
        let mut authz = TaskAuthz::new(&mut store);

        assert!(not_found(
            authz
                .add_collaborator(&creator, TaskId::new(1), UserId::new(404), PermissionLevel::View)
                .await
        ));
        assert!(not_found(
            authz
                .update_collaborator(&creator, TaskId::new(1), UserId::new(9), PermissionLevel::View)
                .await
        ));
        assert!(not_found(
            authz
                .remove_collaborator(&creator, TaskId::new(1), UserId::new(9))
                .await
        ));
    }

    #[tokio::test]
    async fn group_assignment_grants_view_and_submit_only() {
        let mut store = setup();
        store.put_group(GroupId::new(5), UserId::new(3));
        store.add_member(GroupId::new(5), UserId::new(9));
        store.assign_task(GroupId::new(5), TaskId::new(1));
        let member = principal(9, Role::Student);
        let mut authz = TaskAuthz::new(&mut store);

        assert!(authz.can_view(&member, TaskId::new(1)).await.expect("decide"));
        authz
            .authorize(&member, TaskId::new(1), Action::Submit)
            .await
            .expect("submit");
        assert!(forbidden(
            authz
                .authorize(&member, TaskId::new(1), Action::ListTaskSubmissions)
                .await
        ));
    }

    #[test]
    fn only_admins_create_tasks_for_others() {
        let mut store = setup();
        let authz = TaskAuthz::new(&mut store);
        let student = principal(7, Role::Student);
        let admin = principal(1, Role::Admin);

        assert!(authz.authorize_create(&student, UserId::new(7)).is_ok());
        assert!(forbidden(authz.authorize_create(&student, UserId::new(3))));
        assert!(authz.authorize_create(&admin, UserId::new(3)).is_ok());
    }
}
