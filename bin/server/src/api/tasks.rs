//! Task routes: creation, deletion and collaborators.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use proctor_authz::{Action, CollaboratorGrant, PermissionLevel, TaskAuthz};
use proctor_core::{TaskId, UserId};
use proctor_platform_access::PrincipalDirectory;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::auth::{AppState, RequestContext, RequireToken};
use crate::db::TaskSummary;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    title: String,
    /// Defaults to the caller.
    #[serde(default)]
    owner: Option<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct AddCollaboratorRequest {
    user_id: UserId,
    level: PermissionLevel,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCollaboratorRequest {
    level: PermissionLevel,
}

pub async fn create_task(
    State(state): State<Arc<AppState>>,
    RequireToken(token): RequireToken,
    Json(request): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskSummary>), ApiError> {
    let mut ctx = RequestContext::begin(&state, &token).await?;
    let title = request.title.trim();
    if title.is_empty() {
        return Err(ApiError::invalid_input("title must not be empty"));
    }

    let owner = request.owner.unwrap_or(ctx.principal.id());
    TaskAuthz::new(&mut ctx.store).authorize_create(&ctx.principal, owner)?;
    if owner != ctx.principal.id() && ctx.store.find_principal(owner).await?.is_none() {
        return Err(ApiError::NotFound);
    }

    let task = ctx.store.create_task(title, owner).await?;
    ctx.commit().await?;
    info!(task_id = %task.id, owner = %owner, "task created");
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    RequireToken(token): RequireToken,
    Path(task_id): Path<TaskId>,
) -> Result<StatusCode, ApiError> {
    let mut ctx = RequestContext::begin(&state, &token).await?;
    TaskAuthz::new(&mut ctx.store)
        .authorize(&ctx.principal, task_id, Action::DeleteTask)
        .await?;

    ctx.store.delete_task(task_id).await?;
    ctx.commit().await?;
    info!(task_id = %task_id, "task deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_collaborators(
    State(state): State<Arc<AppState>>,
    RequireToken(token): RequireToken,
    Path(task_id): Path<TaskId>,
) -> Result<Json<Vec<CollaboratorGrant>>, ApiError> {
    let mut ctx = RequestContext::begin(&state, &token).await?;
    let grants = TaskAuthz::new(&mut ctx.store)
        .list_collaborators(&ctx.principal, task_id)
        .await?;
    ctx.commit().await?;
    Ok(Json(grants))
}

pub async fn add_collaborator(
    State(state): State<Arc<AppState>>,
    RequireToken(token): RequireToken,
    Path(task_id): Path<TaskId>,
    Json(request): Json<AddCollaboratorRequest>,
) -> Result<Json<CollaboratorGrant>, ApiError> {
    let mut ctx = RequestContext::begin(&state, &token).await?;
    let grant = TaskAuthz::new(&mut ctx.store)
        .add_collaborator(&ctx.principal, task_id, request.user_id, request.level)
        .await?;
    ctx.commit().await?;
    Ok(Json(grant))
}

pub async fn update_collaborator(
    State(state): State<Arc<AppState>>,
    RequireToken(token): RequireToken,
    Path((task_id, user_id)): Path<(TaskId, UserId)>,
    Json(request): Json<UpdateCollaboratorRequest>,
) -> Result<Json<CollaboratorGrant>, ApiError> {
    let mut ctx = RequestContext::begin(&state, &token).await?;
    let grant = TaskAuthz::new(&mut ctx.store)
        .update_collaborator(&ctx.principal, task_id, user_id, request.level)
        .await?;
    ctx.commit().await?;
    Ok(Json(grant))
}

pub async fn remove_collaborator(
    State(state): State<Arc<AppState>>,
    RequireToken(token): RequireToken,
    Path((task_id, user_id)): Path<(TaskId, UserId)>,
) -> Result<StatusCode, ApiError> {
    let mut ctx = RequestContext::begin(&state, &token).await?;
    TaskAuthz::new(&mut ctx.store)
        .remove_collaborator(&ctx.principal, task_id, user_id)
        .await?;
    ctx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}
