//! The permission evaluator.
//!
//! A pure decision function over a principal, the facts a facade gathered
//! about one resource, and a requested action. Rules are evaluated in
//! order and the first one that allows wins; no rule can veto another.
//!
//! | Rule | Allows |
//! |------|--------|
//! | `Admin` | every action on every resource |
//! | `Creator` | every action on a resource the principal created |
//! | `Grant` | actions whose required level the grant reaches |
//! | `SubmissionAuthor` | viewing one's own submission |
//! | `TaskAccess` | submission actions within the level held on its task, never for students |
//! | `GroupMember` | viewing a group and its tasks, submitting to them |

use proctor_core::UserId;
use proctor_platform_access::{Principal, Role};
use serde::Serialize;
use std::fmt;

use crate::types::{Action, PermissionLevel, Resource, ResourceKind};

/// Everything known about one resource relative to one principal.
///
/// Built by the facades from storage; the evaluator never touches storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessFacts {
    resource: Resource,
    creator: Option<UserId>,
    grant: Option<PermissionLevel>,
    submission_author: Option<UserId>,
    task_level: Option<PermissionLevel>,
    group_member: bool,
}

impl AccessFacts {
    /// Facts about a resource with nothing known yet.
    #[must_use]
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            creator: None,
            grant: None,
            submission_author: None,
            task_level: None,
            group_member: false,
        }
    }

    /// Records the principal that created the resource.
    #[must_use]
    pub fn with_creator(mut self, creator: UserId) -> Self {
        self.creator = Some(creator);
        self
    }

    /// Records the principal's collaborator grant on the resource.
    #[must_use]
    pub fn with_grant(mut self, grant: Option<PermissionLevel>) -> Self {
        self.grant = grant;
        self
    }

    /// Records the author of a submission.
    #[must_use]
    pub fn with_submission_author(mut self, author: UserId) -> Self {
        self.submission_author = Some(author);
        self
    }

    /// Records the level the principal holds on a submission's task.
    #[must_use]
    pub fn with_task_level(mut self, level: Option<PermissionLevel>) -> Self {
        self.task_level = level;
        self
    }

    /// Records group membership relevant to the resource.
    #[must_use]
    pub fn with_group_member(mut self, member: bool) -> Self {
        self.group_member = member;
        self
    }

    #[must_use]
    pub fn resource(&self) -> Resource {
        self.resource
    }

    /// Level the principal holds on the resource from creatorship or a
    /// grant, ignoring role and carve-outs.
    #[must_use]
    pub fn held_level(&self, principal: &Principal) -> Option<PermissionLevel> {
        if self.creator == Some(principal.id()) {
            Some(PermissionLevel::Manage)
        } else {
            self.grant
        }
    }
}

/// The rule that allowed an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", content = "level", rename_all = "snake_case")]
pub enum Basis {
    Admin,
    Creator,
    Grant(PermissionLevel),
    SubmissionAuthor,
    TaskAccess(PermissionLevel),
    GroupMember,
}

impl fmt::Display for Basis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Creator => write!(f, "creator"),
            Self::Grant(level) => write!(f, "grant({level})"),
            Self::SubmissionAuthor => write!(f, "submission author"),
            Self::TaskAccess(level) => write!(f, "task access({level})"),
            Self::GroupMember => write!(f, "group member"),
        }
    }
}

/// Outcome of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow(Basis),
    Deny,
}

impl Decision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }
}

type Rule = fn(&Principal, &AccessFacts, Action) -> Option<Basis>;

const RULES: [Rule; 6] = [
    admin_rule,
    creator_rule,
    grant_rule,
    submission_author_rule,
    task_access_rule,
    group_member_rule,
];

fn admin_rule(principal: &Principal, _: &AccessFacts, _: Action) -> Option<Basis> {
    principal.is_admin().then_some(Basis::Admin)
}

fn creator_rule(principal: &Principal, facts: &AccessFacts, _: Action) -> Option<Basis> {
    (facts.creator == Some(principal.id())).then_some(Basis::Creator)
}

fn grant_rule(_: &Principal, facts: &AccessFacts, action: Action) -> Option<Basis> {
    facts
        .grant
        .filter(|level| *level >= action.required_level())
        .map(Basis::Grant)
}

fn submission_author_rule(principal: &Principal, facts: &AccessFacts, action: Action) -> Option<Basis> {
    (action == Action::ViewSubmission && facts.submission_author == Some(principal.id()))
        .then_some(Basis::SubmissionAuthor)
}

fn task_access_rule(principal: &Principal, facts: &AccessFacts, action: Action) -> Option<Basis> {
    if action.kind() != ResourceKind::Submission || principal.role() == Role::Student {
        return None;
    }
    facts
        .task_level
        .filter(|level| *level >= action.required_level())
        .map(Basis::TaskAccess)
}

fn group_member_rule(_: &Principal, facts: &AccessFacts, action: Action) -> Option<Basis> {
    (facts.group_member && action.allowed_to_group_members()).then_some(Basis::GroupMember)
}

/// Decides whether `principal` may perform `action` on the resource
/// described by `facts`.
///
/// An action aimed at a different resource kind than the facts describe
/// is denied to everyone but admins.
#[must_use]
pub fn evaluate(principal: &Principal, facts: &AccessFacts, action: Action) -> Decision {
    if principal.is_admin() {
        return Decision::Allow(Basis::Admin);
    }
    if action.kind() != facts.resource.kind() {
        return Decision::Deny;
    }
    RULES
        .iter()
        .find_map(|rule| rule(principal, facts, action))
        .map_or(Decision::Deny, Decision::Allow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proctor_core::{GroupId, SubmissionId, TaskId};
    use proctor_platform_access::Role;

    fn user(id: i64, role: Role) -> Principal {
        Principal::new(UserId::new(id), role, format!("user{id}"))
    }

    fn task_facts(creator: i64) -> AccessFacts {
        AccessFacts::new(Resource::task(TaskId::new(1))).with_creator(UserId::new(creator))
    }

    fn facts_for(kind: ResourceKind) -> AccessFacts {
        AccessFacts::new(Resource::new(kind, 99))
    }

    #[test]
    fn admin_is_allowed_everything_even_without_grants() {
        let admin = user(1, Role::Admin);
        for kind in [ResourceKind::Task, ResourceKind::Group, ResourceKind::Submission] {
            for action in Action::ALL {
                assert_eq!(
                    evaluate(&admin, &facts_for(kind), action),
                    Decision::Allow(Basis::Admin),
                    "{action} on {kind}"
                );
            }
        }
    }

    #[test]
    fn creator_is_allowed_every_action_on_own_resource() {
        let creator = user(7, Role::Student);
        let facts = task_facts(7);
        for action in Action::ALL.iter().filter(|a| a.kind() == ResourceKind::Task) {
            assert_eq!(
                evaluate(&creator, &facts, *action),
                Decision::Allow(Basis::Creator)
            );
        }
    }

    #[test]
    fn creator_keeps_manage_whatever_the_grant_says() {
        let creator = user(7, Role::Teacher);
        let facts = task_facts(7).with_grant(Some(PermissionLevel::View));
        assert!(evaluate(&creator, &facts, Action::ManageTaskCollaborators).is_allowed());
        assert_eq!(facts.held_level(&creator), Some(PermissionLevel::Manage));
    }

    #[test]
    fn view_grant_allows_only_view_level_actions() {
        let viewer = user(9, Role::Teacher);
        let facts = task_facts(7).with_grant(Some(PermissionLevel::View));

        assert!(evaluate(&viewer, &facts, Action::ViewTask).is_allowed());
        assert!(evaluate(&viewer, &facts, Action::ListTaskCollaborators).is_allowed());
        assert_eq!(evaluate(&viewer, &facts, Action::EditTask), Decision::Deny);
        assert_eq!(evaluate(&viewer, &facts, Action::DeleteTask), Decision::Deny);
        assert_eq!(
            evaluate(&viewer, &facts, Action::ManageTaskCollaborators),
            Decision::Deny
        );
    }

    #[test]
    fn edit_grant_scenario() {
        let collaborator = user(9, Role::Student);
        let facts = task_facts(7).with_grant(Some(PermissionLevel::Edit));

        assert_eq!(
            evaluate(&collaborator, &facts, Action::EditTask),
            Decision::Allow(Basis::Grant(PermissionLevel::Edit))
        );
        assert_eq!(
            evaluate(&collaborator, &facts, Action::ManageTaskCollaborators),
            Decision::Deny
        );
    }

    #[test]
    fn no_relation_is_denied() {
        let stranger = user(3, Role::Teacher);
        for action in Action::ALL.iter().filter(|a| a.kind() == ResourceKind::Task) {
            assert_eq!(evaluate(&stranger, &task_facts(7), *action), Decision::Deny);
        }
    }

    #[test]
    fn student_reads_own_submission_only() {
        let author = user(5, Role::Student);
        let other = user(6, Role::Student);
        let facts = AccessFacts::new(Resource::submission(SubmissionId::new(1)))
            .with_submission_author(UserId::new(5));

        assert_eq!(
            evaluate(&author, &facts, Action::ViewSubmission),
            Decision::Allow(Basis::SubmissionAuthor)
        );
        assert_eq!(evaluate(&author, &facts, Action::Rejudge), Decision::Deny);
        assert_eq!(evaluate(&other, &facts, Action::ViewSubmission), Decision::Deny);
    }

    #[test]
    fn task_level_governs_submission_actions() {
        let teacher = user(7, Role::Teacher);
        let viewing = AccessFacts::new(Resource::submission(SubmissionId::new(1)))
            .with_submission_author(UserId::new(5))
            .with_task_level(Some(PermissionLevel::View));
        let managing = viewing.clone().with_task_level(Some(PermissionLevel::Manage));

        assert!(evaluate(&teacher, &viewing, Action::ViewSubmission).is_allowed());
        assert_eq!(evaluate(&teacher, &viewing, Action::Rejudge), Decision::Deny);
        assert_eq!(
            evaluate(&teacher, &managing, Action::Rejudge),
            Decision::Allow(Basis::TaskAccess(PermissionLevel::Manage))
        );
    }

    #[test]
    fn students_get_no_submission_access_from_tasks() {
        let student = user(7, Role::Student);
        let facts = AccessFacts::new(Resource::submission(SubmissionId::new(1)))
            .with_submission_author(UserId::new(8))
            .with_task_level(Some(PermissionLevel::Manage));

        assert_eq!(evaluate(&student, &facts, Action::ViewSubmission), Decision::Deny);
        assert_eq!(evaluate(&student, &facts, Action::Rejudge), Decision::Deny);
    }

    #[test]
    fn task_level_does_not_leak_into_other_kinds() {
        let teacher = user(7, Role::Teacher);
        let facts = task_facts(1).with_task_level(Some(PermissionLevel::Manage));
        assert_eq!(evaluate(&teacher, &facts, Action::EditTask), Decision::Deny);
    }

    #[test]
    fn group_membership_allows_reading_not_managing() {
        let member = user(4, Role::Student);
        let facts = AccessFacts::new(Resource::group(GroupId::new(2)))
            .with_creator(UserId::new(7))
            .with_group_member(true);

        assert!(evaluate(&member, &facts, Action::ViewGroup).is_allowed());
        assert!(evaluate(&member, &facts, Action::ListGroupTasks).is_allowed());
        assert_eq!(evaluate(&member, &facts, Action::ListGroupMembers), Decision::Deny);
        assert_eq!(
            evaluate(&member, &facts, Action::ManageGroupMembers),
            Decision::Deny
        );
    }

    #[test]
    fn most_permissive_rule_wins() {
        // A view grant would deny editing, but creatorship allows it.
        let creator = user(7, Role::Student);
        let facts = task_facts(7).with_grant(Some(PermissionLevel::View));
        assert_eq!(
            evaluate(&creator, &facts, Action::EditTask),
            Decision::Allow(Basis::Creator)
        );
    }

    #[test]
    fn mismatched_kind_is_denied() {
        let creator = user(7, Role::Teacher);
        assert_eq!(
            evaluate(&creator, &task_facts(7), Action::ViewGroup),
            Decision::Deny
        );
    }
}
