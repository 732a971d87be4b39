//! Authorization types: resources, permission levels, actions, grants.

use proctor_core::{ContestId, GroupId, SubmissionId, TaskId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Resource kinds a permission check can be scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// A gradable task.
    Task,
    /// A group of users with assigned tasks.
    Group,
    /// A submitted solution.
    Submission,
}

impl ResourceKind {
    /// Returns the storage name of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Group => "group",
            Self::Submission => "submission",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A concrete resource: kind plus numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    kind: ResourceKind,
    id: i64,
}

impl Resource {
    #[must_use]
    pub fn new(kind: ResourceKind, id: i64) -> Self {
        Self { kind, id }
    }

    #[must_use]
    pub fn task(id: TaskId) -> Self {
        Self::new(ResourceKind::Task, id.get())
    }

    #[must_use]
    pub fn group(id: GroupId) -> Self {
        Self::new(ResourceKind::Group, id.get())
    }

    #[must_use]
    pub fn submission(id: SubmissionId) -> Self {
        Self::new(ResourceKind::Submission, id.get())
    }

    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    #[must_use]
    pub fn id(&self) -> i64 {
        self.id
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Collaborator permission level. Totally ordered: `View < Edit < Manage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    /// Read the resource and its collaborator list.
    View,
    /// Modify the resource's content.
    Edit,
    /// Delete the resource and manage its collaborators.
    Manage,
}

impl PermissionLevel {
    /// Returns the storage name of the level.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Edit => "edit",
            Self::Manage => "manage",
        }
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when a stored permission level is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPermissionLevel(pub String);

impl fmt::Display for UnknownPermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown permission level '{}'", self.0)
    }
}

impl std::error::Error for UnknownPermissionLevel {}

impl FromStr for PermissionLevel {
    type Err = UnknownPermissionLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(Self::View),
            "edit" => Ok(Self::Edit),
            "manage" => Ok(Self::Manage),
            other => Err(UnknownPermissionLevel(other.to_string())),
        }
    }
}

/// An operation a principal asks to perform on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ViewTask,
    ListTaskCollaborators,
    /// Submit a solution to the task.
    Submit,
    ListTaskSubmissions,
    /// Change limits, statement or archive.
    EditTask,
    DeleteTask,
    ManageTaskCollaborators,
    ViewGroup,
    ListGroupMembers,
    ListGroupTasks,
    /// Change group settings or assigned tasks.
    EditGroup,
    ManageGroupMembers,
    ManageGroupCollaborators,
    DeleteGroup,
    ViewSubmission,
    /// Send a submission back to the grading queue.
    Rejudge,
}

impl Action {
    /// Every action, for exhaustive property checks.
    pub const ALL: [Action; 16] = [
        Self::ViewTask,
        Self::ListTaskCollaborators,
        Self::Submit,
        Self::ListTaskSubmissions,
        Self::EditTask,
        Self::DeleteTask,
        Self::ManageTaskCollaborators,
        Self::ViewGroup,
        Self::ListGroupMembers,
        Self::ListGroupTasks,
        Self::EditGroup,
        Self::ManageGroupMembers,
        Self::ManageGroupCollaborators,
        Self::DeleteGroup,
        Self::ViewSubmission,
        Self::Rejudge,
    ];

    /// Returns the resource kind this action applies to.
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::ViewTask
            | Self::ListTaskCollaborators
            | Self::Submit
            | Self::ListTaskSubmissions
            | Self::EditTask
            | Self::DeleteTask
            | Self::ManageTaskCollaborators => ResourceKind::Task,
            Self::ViewGroup
            | Self::ListGroupMembers
            | Self::ListGroupTasks
            | Self::EditGroup
            | Self::ManageGroupMembers
            | Self::ManageGroupCollaborators
            | Self::DeleteGroup => ResourceKind::Group,
            Self::ViewSubmission | Self::Rejudge => ResourceKind::Submission,
        }
    }

    /// Returns the collaborator level a grant must reach to allow this action.
    #[must_use]
    pub fn required_level(&self) -> PermissionLevel {
        match self {
            Self::ViewTask
            | Self::ListTaskCollaborators
            | Self::Submit
            | Self::ListTaskSubmissions
            | Self::ViewGroup
            | Self::ListGroupMembers
            | Self::ListGroupTasks
            | Self::ViewSubmission => PermissionLevel::View,
            Self::EditTask | Self::EditGroup | Self::Rejudge => PermissionLevel::Edit,
            Self::DeleteTask
            | Self::ManageTaskCollaborators
            | Self::ManageGroupMembers
            | Self::ManageGroupCollaborators
            | Self::DeleteGroup => PermissionLevel::Manage,
        }
    }

    /// Returns true if group membership alone can allow this action.
    #[must_use]
    pub fn allowed_to_group_members(&self) -> bool {
        matches!(
            self,
            Self::ViewTask | Self::Submit | Self::ViewGroup | Self::ListGroupTasks
        )
    }

    /// Returns a stable name for logs and error messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ViewTask => "view_task",
            Self::ListTaskCollaborators => "list_task_collaborators",
            Self::Submit => "submit",
            Self::ListTaskSubmissions => "list_task_submissions",
            Self::EditTask => "edit_task",
            Self::DeleteTask => "delete_task",
            Self::ManageTaskCollaborators => "manage_task_collaborators",
            Self::ViewGroup => "view_group",
            Self::ListGroupMembers => "list_group_members",
            Self::ListGroupTasks => "list_group_tasks",
            Self::EditGroup => "edit_group",
            Self::ManageGroupMembers => "manage_group_members",
            Self::ManageGroupCollaborators => "manage_group_collaborators",
            Self::DeleteGroup => "delete_group",
            Self::ViewSubmission => "view_submission",
            Self::Rejudge => "rejudge",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A per-resource, per-principal permission level.
///
/// Unique per (resource, user): writing a grant for an existing pair
/// replaces the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorGrant {
    pub resource: Resource,
    pub user_id: UserId,
    pub level: PermissionLevel,
}

impl CollaboratorGrant {
    #[must_use]
    pub fn new(resource: Resource, user_id: UserId, level: PermissionLevel) -> Self {
        Self {
            resource,
            user_id,
            level,
        }
    }
}

/// Ownership facts about a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    /// Set at creation, never changes.
    pub created_by: UserId,
}

/// Ownership facts about a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: GroupId,
    /// Set at creation, never changes.
    pub created_by: UserId,
}

/// Ownership facts about a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: SubmissionId,
    /// The submitting principal.
    pub author: UserId,
    /// The task the solution was submitted to.
    pub task_id: TaskId,
    pub contest_id: Option<ContestId>,
}
