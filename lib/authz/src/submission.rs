//! Authorization facade for submissions.
//!
//! A submission has no creator in the grant sense: its author may read it,
//! and everything else flows from the level held on the submission's task.
//! That task-derived access is withheld from students, who only ever see
//! their own submissions.

use proctor_core::{Result, SubmissionId, TaskId, UserId};
use proctor_platform_access::{Principal, Role};
use tracing::{debug, instrument};

use crate::collaborators::storage_failure;
use crate::error::AuthzError;
use crate::evaluator::{AccessFacts, Decision, evaluate};
use crate::store::AuthzStore;
use crate::task::TaskAuthz;
use crate::types::{Action, PermissionLevel, Resource, SubmissionRecord, TaskRecord};

/// Submission authorization over a store handle.
pub struct SubmissionAuthz<'a, S: ?Sized> {
    store: &'a mut S,
}

impl<'a, S> SubmissionAuthz<'a, S>
where
    S: AuthzStore + ?Sized,
{
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    /// Loads a submission or fails with `NotFound`.
    pub async fn load(&mut self, submission_id: SubmissionId) -> Result<SubmissionRecord, AuthzError> {
        self.store
            .find_submission(submission_id)
            .await
            .map_err(storage_failure)?
            .ok_or_else(|| AuthzError::not_found(Resource::submission(submission_id)).into())
    }

    /// Level the principal holds on `task_id` through creatorship or a grant.
    async fn task_level(
        &mut self,
        principal: &Principal,
        task_id: TaskId,
    ) -> Result<Option<PermissionLevel>, AuthzError> {
        let task = self.store.find_task(task_id).await.map_err(storage_failure)?;
        match task {
            Some(task) if task.created_by == principal.id() => Ok(Some(PermissionLevel::Manage)),
            Some(task) => Ok(self
                .store
                .find_grant(Resource::task(task.id), principal.id())
                .await
                .map_err(storage_failure)?),
            None => Ok(None),
        }
    }

    async fn facts(
        &mut self,
        principal: &Principal,
        submission: &SubmissionRecord,
    ) -> Result<AccessFacts, AuthzError> {
        let resource = Resource::submission(submission.id);
        let facts = AccessFacts::new(resource).with_submission_author(submission.author);
        if principal.is_admin() || principal.role() == Role::Student {
            return Ok(facts);
        }

        let task_level = self.task_level(principal, submission.task_id).await?;
        Ok(facts.with_task_level(task_level))
    }

    #[instrument(skip(self, principal), fields(user_id = %principal.id()))]
    pub async fn decide(
        &mut self,
        principal: &Principal,
        submission_id: SubmissionId,
        action: Action,
    ) -> Result<Decision, AuthzError> {
        let submission = self.load(submission_id).await?;
        let facts = self.facts(principal, &submission).await?;
        let decision = evaluate(principal, &facts, action);
        debug!(?decision, "submission decision");
        Ok(decision)
    }

    async fn authorize(
        &mut self,
        principal: &Principal,
        submission_id: SubmissionId,
        action: Action,
    ) -> Result<SubmissionRecord, AuthzError> {
        let submission = self.load(submission_id).await?;
        let facts = self.facts(principal, &submission).await?;
        match evaluate(principal, &facts, action) {
            Decision::Allow(basis) => {
                debug!(submission_id = %submission_id, %action, %basis, "submission action allowed");
                Ok(submission)
            }
            Decision::Deny => {
                debug!(submission_id = %submission_id, %action, user_id = %principal.id(), "submission action denied");
                Err(AuthzError::forbidden(Resource::submission(submission_id), action).into())
            }
        }
    }

    pub async fn can_view(
        &mut self,
        principal: &Principal,
        submission_id: SubmissionId,
    ) -> Result<bool, AuthzError> {
        Ok(self
            .decide(principal, submission_id, Action::ViewSubmission)
            .await?
            .is_allowed())
    }

    pub async fn authorize_view(
        &mut self,
        principal: &Principal,
        submission_id: SubmissionId,
    ) -> Result<SubmissionRecord, AuthzError> {
        self.authorize(principal, submission_id, Action::ViewSubmission)
            .await
    }

    pub async fn authorize_rejudge(
        &mut self,
        principal: &Principal,
        submission_id: SubmissionId,
    ) -> Result<SubmissionRecord, AuthzError> {
        self.authorize(principal, submission_id, Action::Rejudge).await
    }

    /// Submitting needs the task to exist and be visible to the principal.
    pub async fn authorize_submit(
        &mut self,
        principal: &Principal,
        task_id: TaskId,
    ) -> Result<TaskRecord, AuthzError> {
        TaskAuthz::new(&mut *self.store)
            .authorize(principal, task_id, Action::Submit)
            .await
    }

    /// Listing every submission to a task is closed to students, even on
    /// tasks they created or collaborate on.
    pub async fn authorize_list_for_task(
        &mut self,
        principal: &Principal,
        task_id: TaskId,
    ) -> Result<TaskRecord, AuthzError> {
        let mut tasks = TaskAuthz::new(&mut *self.store);
        if principal.role() == Role::Student {
            tasks.load(task_id).await?;
            debug!(task_id = %task_id, user_id = %principal.id(), "students cannot list task submissions");
            return Err(
                AuthzError::forbidden(Resource::task(task_id), Action::ListTaskSubmissions).into(),
            );
        }
        tasks
            .authorize(principal, task_id, Action::ListTaskSubmissions)
            .await
    }

    /// A user's submission history is visible to that user and to admins.
    pub async fn authorize_list_for_user(
        &mut self,
        principal: &Principal,
        user_id: UserId,
    ) -> Result<(), AuthzError> {
        if principal.id() == user_id {
            return Ok(());
        }
        if !principal.is_admin() {
            return Err(AuthzError::forbidden(format!("user:{user_id}/submissions"), "list_user_submissions").into());
        }
        match self.store.find_principal(user_id).await.map_err(storage_failure)? {
            Some(_) => Ok(()),
            None => Err(AuthzError::not_found(format!("user:{user_id}")).into()),
        }
    }
}
