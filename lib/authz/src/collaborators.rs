//! Collaborator grant management shared by the task and group facades.
//!
//! The caller has already loaded the resource and checked that the acting
//! principal may manage collaborators. This module enforces the rules on
//! the target: the creator is untouchable and the target must exist.

use proctor_core::{Result, StorageError, UserId};
use rootcause::Report;
use tracing::{debug, info};

use crate::error::AuthzError;
use crate::store::AuthzStore;
use crate::types::{CollaboratorGrant, PermissionLevel, Resource};

pub(crate) fn storage_failure(report: Report<StorageError>) -> AuthzError {
    AuthzError::Storage {
        details: report.to_string(),
    }
}

/// Grant operations on a single resource.
pub(crate) struct CollaboratorRegistry<'a, S: ?Sized> {
    store: &'a mut S,
    resource: Resource,
    creator: UserId,
}

impl<'a, S> CollaboratorRegistry<'a, S>
where
    S: AuthzStore + ?Sized,
{
    pub(crate) fn new(store: &'a mut S, resource: Resource, creator: UserId) -> Self {
        Self {
            store,
            resource,
            creator,
        }
    }

    pub(crate) async fn list(&mut self) -> Result<Vec<CollaboratorGrant>, AuthzError> {
        let grants = self
            .store
            .list_grants(self.resource)
            .await
            .map_err(storage_failure)?;
        Ok(grants)
    }

    /// Adds a grant, replacing the level if the target already has one.
    pub(crate) async fn add(
        &mut self,
        target: UserId,
        level: PermissionLevel,
    ) -> Result<CollaboratorGrant, AuthzError> {
        self.reject_creator(target, "add_collaborator")?;
        self.require_principal(target).await?;
        self.write(target, level).await
    }

    /// Changes the level of an existing grant.
    pub(crate) async fn update(
        &mut self,
        target: UserId,
        level: PermissionLevel,
    ) -> Result<CollaboratorGrant, AuthzError> {
        self.reject_creator(target, "update_collaborator")?;
        if self
            .store
            .find_grant(self.resource, target)
            .await
            .map_err(storage_failure)?
            .is_none()
        {
            return Err(
                AuthzError::not_found(format!("{}/collaborator:{target}", self.resource)).into(),
            );
        }
        self.write(target, level).await
    }

    pub(crate) async fn remove(&mut self, target: UserId) -> Result<(), AuthzError> {
        self.reject_creator(target, "remove_collaborator")?;
        let removed = self
            .store
            .remove_grant(self.resource, target)
            .await
            .map_err(storage_failure)?;
        if !removed {
            return Err(
                AuthzError::not_found(format!("{}/collaborator:{target}", self.resource)).into(),
            );
        }
        info!(resource = %self.resource, target = %target, "collaborator removed");
        Ok(())
    }

    fn reject_creator(&self, target: UserId, action: &str) -> Result<(), AuthzError> {
        if target == self.creator {
            debug!(resource = %self.resource, action, "creator cannot be altered as a collaborator");
            return Err(AuthzError::forbidden(self.resource, action).into());
        }
        Ok(())
    }

    async fn require_principal(&mut self, target: UserId) -> Result<(), AuthzError> {
        if self
            .store
            .find_principal(target)
            .await
            .map_err(storage_failure)?
            .is_none()
        {
            return Err(AuthzError::not_found(format!("user:{target}")).into());
        }
        Ok(())
    }

    async fn write(
        &mut self,
        target: UserId,
        level: PermissionLevel,
    ) -> Result<CollaboratorGrant, AuthzError> {
        let grant = CollaboratorGrant::new(self.resource, target, level);
        self.store
            .upsert_grant(&grant)
            .await
            .map_err(storage_failure)?;
        info!(resource = %self.resource, target = %target, level = %level, "collaborator granted");
        Ok(grant)
    }
}
