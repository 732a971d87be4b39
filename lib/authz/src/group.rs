//! Authorization facade for groups.

use proctor_core::{GroupId, Result, UserId};
use proctor_platform_access::Principal;
use tracing::{debug, instrument};

use crate::collaborators::{CollaboratorRegistry, storage_failure};
use crate::error::AuthzError;
use crate::evaluator::{AccessFacts, Decision, evaluate};
use crate::store::AuthzStore;
use crate::types::{Action, CollaboratorGrant, GroupRecord, PermissionLevel, Resource};

/// Group authorization over a store handle.
pub struct GroupAuthz<'a, S: ?Sized> {
    store: &'a mut S,
}

impl<'a, S> GroupAuthz<'a, S>
where
    S: AuthzStore + ?Sized,
{
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    /// Loads a group or fails with `NotFound`.
    pub async fn load(&mut self, group_id: GroupId) -> Result<GroupRecord, AuthzError> {
        self.store
            .find_group(group_id)
            .await
            .map_err(storage_failure)?
            .ok_or_else(|| AuthzError::not_found(Resource::group(group_id)).into())
    }

    async fn facts(
        &mut self,
        principal: &Principal,
        group: &GroupRecord,
        action: Action,
    ) -> Result<AccessFacts, AuthzError> {
        let resource = Resource::group(group.id);
        let mut facts = AccessFacts::new(resource).with_creator(group.created_by);
        if principal.is_admin() || group.created_by == principal.id() {
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
                .is_group_member(group.id, principal.id())
                .await
                .map_err(storage_failure)?;
            facts = facts.with_group_member(member);
        }
        Ok(facts)
    }

    #[instrument(skip(self, principal), fields(user_id = %principal.id()))]
    pub async fn decide(
        &mut self,
        principal: &Principal,
        group_id: GroupId,
        action: Action,
    ) -> Result<Decision, AuthzError> {
        let group = self.load(group_id).await?;
        let facts = self.facts(principal, &group, action).await?;
        let decision = evaluate(principal, &facts, action);
        debug!(?decision, "group decision");
        Ok(decision)
    }

    /// Fails with `Forbidden` unless `action` is allowed. Returns the group.
    pub async fn authorize(
        &mut self,
        principal: &Principal,
        group_id: GroupId,
        action: Action,
    ) -> Result<GroupRecord, AuthzError> {
        let group = self.load(group_id).await?;
        let facts = self.facts(principal, &group, action).await?;
        match evaluate(principal, &facts, action) {
            Decision::Allow(basis) => {
                debug!(group_id = %group_id, %action, %basis, "group action allowed");
                Ok(group)
            }
            Decision::Deny => {
                debug!(group_id = %group_id, %action, user_id = %principal.id(), "group action denied");
                Err(AuthzError::forbidden(Resource::group(group_id), action).into())
            }
        }
    }

    pub async fn can_view(&mut self, principal: &Principal, group_id: GroupId) -> Result<bool, AuthzError> {
        Ok(self.decide(principal, group_id, Action::ViewGroup).await?.is_allowed())
    }

    pub async fn can_edit(&mut self, principal: &Principal, group_id: GroupId) -> Result<bool, AuthzError> {
        Ok(self.decide(principal, group_id, Action::EditGroup).await?.is_allowed())
    }

    pub async fn can_manage(&mut self, principal: &Principal, group_id: GroupId) -> Result<bool, AuthzError> {
        Ok(self
            .decide(principal, group_id, Action::ManageGroupMembers)
            .await?
            .is_allowed())
    }

    /// Teachers and admins create groups; only admins for someone else.
    pub fn authorize_create(&self, principal: &Principal, owner: UserId) -> Result<(), AuthzError> {
        if !principal.role().can_author_groups() {
            debug!(user_id = %principal.id(), role = %principal.role(), "role cannot create groups");
            return Err(AuthzError::forbidden("groups", "create_group").into());
        }
        if !principal.is_admin() && principal.id() != owner {
            return Err(AuthzError::forbidden(format!("user:{owner}/groups"), "create_group").into());
        }
        Ok(())
    }

    /// Listing every group is reserved for admins.
    pub fn authorize_list_all(&self, principal: &Principal) -> Result<(), AuthzError> {
        if principal.is_admin() {
            Ok(())
        } else {
            Err(AuthzError::forbidden("groups", "list_all_groups").into())
        }
    }

    /// Groups the principal may see: everything for admins, otherwise the
    /// groups it created, collaborates on, or belongs to.
    pub async fn visible_groups(&mut self, principal: &Principal) -> Result<Vec<GroupId>, AuthzError> {
        let groups = if principal.is_admin() {
            self.store.all_groups().await
        } else {
            self.store.groups_related_to(principal.id()).await
        };
        groups.map_err(|e| storage_failure(e).into())
    }

    pub async fn list_collaborators(
        &mut self,
        principal: &Principal,
        group_id: GroupId,
    ) -> Result<Vec<CollaboratorGrant>, AuthzError> {
        let group = self
            .authorize(principal, group_id, Action::ListGroupMembers)
            .await?;
        self.registry(&group).list().await
    }

    pub async fn add_collaborator(
        &mut self,
        principal: &Principal,
        group_id: GroupId,
        target: UserId,
        level: PermissionLevel,
    ) -> Result<CollaboratorGrant, AuthzError> {
        let group = self
            .authorize(principal, group_id, Action::ManageGroupCollaborators)
            .await?;
        self.registry(&group).add(target, level).await
    }

    pub async fn update_collaborator(
        &mut self,
        principal: &Principal,
        group_id: GroupId,
        target: UserId,
        level: PermissionLevel,
    ) -> Result<CollaboratorGrant, AuthzError> {
        let group = self
            .authorize(principal, group_id, Action::ManageGroupCollaborators)
            .await?;
        self.registry(&group).update(target, level).await
    }

    pub async fn remove_collaborator(
        &mut self,
        principal: &Principal,
        group_id: GroupId,
        target: UserId,
    ) -> Result<(), AuthzError> {
        let group = self.load(group_id).await?;
        if target == group.created_by {
            return Err(AuthzError::forbidden(Resource::group(group_id), "remove_collaborator").into());
        }
        self.authorize(principal, group_id, Action::ManageGroupCollaborators)
            .await?;
        self.registry(&group).remove(target).await
    }

    fn registry(&mut self, group: &GroupRecord) -> CollaboratorRegistry<'_, S> {
        CollaboratorRegistry::new(&mut *self.store, Resource::group(group.id), group.created_by)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryAuthzStore;
    use proctor_core::TaskId;
    use proctor_platform_access::Role;

    fn principal(id: i64, role: Role) -> Principal {
        Principal::new(UserId::new(id), role, format!("user{id}"))
    }

    /// Group 5 created by teacher 3 with student 9 as member; group 6
    /// created by teacher 4 with no relation to anyone else.
    fn setup() -> MemoryAuthzStore {
        let store = MemoryAuthzStore::new();
        for (id, role) in [
            (1, Role::Admin),
            (3, Role::Teacher),
            (4, Role::Teacher),
            (8, Role::Student),
            (9, Role::Student),
        ] {
            store.put_principal(principal(id, role));
        }
        store.put_group(GroupId::new(5), UserId::new(3));
        store.put_group(GroupId::new(6), UserId::new(4));
        store.add_member(GroupId::new(5), UserId::new(9));
        store.put_task(TaskId::new(1), UserId::new(3));
        store.assign_task(GroupId::new(5), TaskId::new(1));
        store
    }

    fn kind<T: std::fmt::Debug>(result: Result<T, AuthzError>) -> AuthzError {
        result.expect_err("should fail").current_context().clone()
    }

    #[tokio::test]
    async fn member_sees_group_but_not_its_roster() {
        let mut store = setup();
        let member = principal(9, Role::Student);
        let mut authz = GroupAuthz::new(&mut store);

        assert!(authz.can_view(&member, GroupId::new(5)).await.expect("decide"));
        authz
            .authorize(&member, GroupId::new(5), Action::ListGroupTasks)
            .await
            .expect("list tasks");
        assert!(matches!(
            kind(authz.authorize(&member, GroupId::new(5), Action::ListGroupMembers).await),
            AuthzError::Forbidden { .. }
        ));
        assert!(!authz.can_manage(&member, GroupId::new(5)).await.expect("decide"));
    }

    #[tokio::test]
    async fn unrelated_student_cannot_see_group() {
        let mut store = setup();
        let outsider = principal(8, Role::Student);
        let mut authz = GroupAuthz::new(&mut store);

        assert!(!authz.can_view(&outsider, GroupId::new(5)).await.expect("decide"));
        assert!(matches!(
            kind(authz.authorize(&outsider, GroupId::new(404), Action::ViewGroup).await),
            AuthzError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn creator_and_admin_manage_membership() {
        let mut store = setup();
        let mut authz = GroupAuthz::new(&mut store);

        assert!(
            authz
                .can_manage(&principal(3, Role::Teacher), GroupId::new(5))
                .await
                .expect("decide")
        );
        assert!(
            authz
                .can_manage(&principal(1, Role::Admin), GroupId::new(5))
                .await
                .expect("decide")
        );
        assert!(
            !authz
                .can_manage(&principal(4, Role::Teacher), GroupId::new(5))
                .await
                .expect("decide")
        );
    }

    #[tokio::test]
    async fn edit_collaborator_edits_but_does_not_manage() {
        let mut store = setup();
        let mut authz = GroupAuthz::new(&mut store);
        let creator = principal(3, Role::Teacher);
        let colleague = principal(4, Role::Teacher);

        authz
            .add_collaborator(&creator, GroupId::new(5), UserId::new(4), PermissionLevel::Edit)
            .await
            .expect("add");

        assert!(authz.can_edit(&colleague, GroupId::new(5)).await.expect("decide"));
        assert!(!authz.can_manage(&colleague, GroupId::new(5)).await.expect("decide"));
        assert!(matches!(
            kind(
                authz
                    .remove_collaborator(&colleague, GroupId::new(5), UserId::new(4))
                    .await
            ),
            AuthzError::Forbidden { .. }
        ));
    }

    #[tokio::test]
    async fn group_creator_cannot_be_removed() {
        let mut store = setup();
        let mut authz = GroupAuthz::new(&mut store);

        assert!(matches!(
            kind(
                authz
                    .remove_collaborator(&principal(1, Role::Admin), GroupId::new(5), UserId::new(3))
                    .await
            ),
            AuthzError::Forbidden { .. }
        ));
    }

    #[test]
    fn students_cannot_create_groups() {
        let mut store = setup();
        let authz = GroupAuthz::new(&mut store);
        let student = principal(9, Role::Student);
        let teacher = principal(3, Role::Teacher);
        let admin = principal(1, Role::Admin);

        assert!(authz.authorize_create(&student, UserId::new(9)).is_err());
        assert!(authz.authorize_create(&teacher, UserId::new(3)).is_ok());
        assert!(authz.authorize_create(&teacher, UserId::new(4)).is_err());
        assert!(authz.authorize_create(&admin, UserId::new(4)).is_ok());
    }

    #[test]
    fn only_admins_list_all_groups() {
        let mut store = setup();
        let authz = GroupAuthz::new(&mut store);

        assert!(authz.authorize_list_all(&principal(1, Role::Admin)).is_ok());
        assert!(matches!(
            kind(authz.authorize_list_all(&principal(3, Role::Teacher))),
            AuthzError::Forbidden { .. }
        ));
    }

    #[tokio::test]
    async fn visible_groups_follow_relations() {
        let mut store = setup();
        store.grant(Resource::group(GroupId::new(6)), UserId::new(3), PermissionLevel::View);
        let mut authz = GroupAuthz::new(&mut store);

        assert_eq!(
            authz
                .visible_groups(&principal(9, Role::Student))
                .await
                .expect("member"),
            vec![GroupId::new(5)]
        );
        assert_eq!(
            authz
                .visible_groups(&principal(3, Role::Teacher))
                .await
                .expect("creator and collaborator"),
            vec![GroupId::new(5), GroupId::new(6)]
        );
        assert!(
            authz
                .visible_groups(&principal(8, Role::Student))
                .await
                .expect("outsider")
                .is_empty()
        );
        assert_eq!(
            authz
                .visible_groups(&principal(1, Role::Admin))
                .await
                .expect("admin")
                .len(),
            2
        );
    }
}
