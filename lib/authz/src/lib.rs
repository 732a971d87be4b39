//! Role and collaborator authorization for proctor resources.
//!
//! Two authority sources overlap: a principal's global role and
//! per-resource collaborator grants (`view < edit < manage`). The
//! [`evaluator`] combines them with a few carve-outs and the most
//! permissive rule wins.
//!
//! Services never call the evaluator directly. They go through a facade
//! per resource kind ([`TaskAuthz`], [`GroupAuthz`], [`SubmissionAuthz`]),
//! handing it the request's store handle so the check and the guarded
//! operation share one transaction. Facades check existence first:
//! `NotFound` means absent, `Forbidden` means present but denied.

mod collaborators;
mod error;
pub mod evaluator;
mod group;
mod memory;
mod store;
mod submission;
mod task;
mod types;

pub use error::AuthzError;
pub use evaluator::{AccessFacts, Basis, Decision, evaluate};
pub use group::GroupAuthz;
pub use memory::MemoryAuthzStore;
pub use store::{AuthzStore, GrantStore, ResourceDirectory};
pub use submission::SubmissionAuthz;
pub use task::TaskAuthz;
pub use types::{
    Action, CollaboratorGrant, GroupRecord, PermissionLevel, Resource, ResourceKind,
    SubmissionRecord, TaskRecord, UnknownPermissionLevel,
};
