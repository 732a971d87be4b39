//! Group routes: listing, creation, membership, assigned tasks and
//! collaborators.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use proctor_authz::{Action, CollaboratorGrant, GroupAuthz, PermissionLevel, TaskAuthz};
use proctor_core::{GroupId, TaskId, UserId};
use proctor_platform_access::PrincipalDirectory;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::auth::{AppState, RequestContext, RequireToken};
use crate::db::{GroupSummary, MemberSummary, TaskSummary};
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListScope {
    /// Groups related to the caller.
    #[default]
    Mine,
    /// Every group; admins only.
    All,
}

#[derive(Debug, Deserialize)]
pub struct ListGroupsQuery {
    #[serde(default)]
    scope: ListScope,
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    name: String,
    #[serde(default)]
    owner: Option<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    user_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct AssignTaskRequest {
    task_id: TaskId,
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

pub async fn list_groups(
    State(state): State<Arc<AppState>>,
    RequireToken(token): RequireToken,
    Query(query): Query<ListGroupsQuery>,
) -> Result<Json<Vec<GroupSummary>>, ApiError> {
    let mut ctx = RequestContext::begin(&state, &token).await?;
    let mut authz = GroupAuthz::new(&mut ctx.store);
    if matches!(query.scope, ListScope::All) {
        authz.authorize_list_all(&ctx.principal)?;
    }
    let ids = authz.visible_groups(&ctx.principal).await?;

    let groups = ctx.store.list_groups(&ids).await?;
    ctx.commit().await?;
    Ok(Json(groups))
}

pub async fn create_group(
    State(state): State<Arc<AppState>>,
    RequireToken(token): RequireToken,
    Json(request): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<GroupSummary>), ApiError> {
    let mut ctx = RequestContext::begin(&state, &token).await?;
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::invalid_input("name must not be empty"));
    }

    let owner = request.owner.unwrap_or(ctx.principal.id());
    GroupAuthz::new(&mut ctx.store).authorize_create(&ctx.principal, owner)?;
    if owner != ctx.principal.id() && ctx.store.find_principal(owner).await?.is_none() {
        return Err(ApiError::NotFound);
    }

    let group = ctx.store.create_group(name, owner).await?;
    ctx.commit().await?;
    info!(group_id = %group.id, owner = %owner, "group created");
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn list_members(
    State(state): State<Arc<AppState>>,
    RequireToken(token): RequireToken,
    Path(group_id): Path<GroupId>,
) -> Result<Json<Vec<MemberSummary>>, ApiError> {
    let mut ctx = RequestContext::begin(&state, &token).await?;
    GroupAuthz::new(&mut ctx.store)
        .authorize(&ctx.principal, group_id, Action::ListGroupMembers)
        .await?;

    let members = ctx.store.list_members(group_id).await?;
    ctx.commit().await?;
    Ok(Json(members))
}

pub async fn add_member(
    State(state): State<Arc<AppState>>,
    RequireToken(token): RequireToken,
    Path(group_id): Path<GroupId>,
    Json(request): Json<AddMemberRequest>,
) -> Result<StatusCode, ApiError> {
    let mut ctx = RequestContext::begin(&state, &token).await?;
    GroupAuthz::new(&mut ctx.store)
        .authorize(&ctx.principal, group_id, Action::ManageGroupMembers)
        .await?;
    if ctx.store.find_principal(request.user_id).await?.is_none() {
        return Err(ApiError::NotFound);
    }

    let added = ctx.store.add_member(group_id, request.user_id).await?;
    ctx.commit().await?;
    if added {
        info!(group_id = %group_id, user_id = %request.user_id, "member added");
        Ok(StatusCode::CREATED)
    } else {
        Ok(StatusCode::OK)
    }
}

pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    RequireToken(token): RequireToken,
    Path((group_id, user_id)): Path<(GroupId, UserId)>,
) -> Result<StatusCode, ApiError> {
    let mut ctx = RequestContext::begin(&state, &token).await?;
    GroupAuthz::new(&mut ctx.store)
        .authorize(&ctx.principal, group_id, Action::ManageGroupMembers)
        .await?;

    if !ctx.store.remove_member(group_id, user_id).await? {
        return Err(ApiError::NotFound);
    }
    ctx.commit().await?;
    info!(group_id = %group_id, user_id = %user_id, "member removed");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    RequireToken(token): RequireToken,
    Path(group_id): Path<GroupId>,
) -> Result<Json<Vec<TaskSummary>>, ApiError> {
    let mut ctx = RequestContext::begin(&state, &token).await?;
    GroupAuthz::new(&mut ctx.store)
        .authorize(&ctx.principal, group_id, Action::ListGroupTasks)
        .await?;

    let tasks = ctx.store.list_group_tasks(group_id).await?;
    ctx.commit().await?;
    Ok(Json(tasks))
}

/// Assigning a task needs edit on both the group and the task.
pub async fn assign_task(
    State(state): State<Arc<AppState>>,
    RequireToken(token): RequireToken,
    Path(group_id): Path<GroupId>,
    Json(request): Json<AssignTaskRequest>,
) -> Result<StatusCode, ApiError> {
    let mut ctx = RequestContext::begin(&state, &token).await?;
    GroupAuthz::new(&mut ctx.store)
        .authorize(&ctx.principal, group_id, Action::EditGroup)
        .await?;
    TaskAuthz::new(&mut ctx.store)
        .authorize(&ctx.principal, request.task_id, Action::EditTask)
        .await?;

    let assigned = ctx.store.assign_task(group_id, request.task_id).await?;
    ctx.commit().await?;
    Ok(if assigned {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    })
}

pub async fn list_collaborators(
    State(state): State<Arc<AppState>>,
    RequireToken(token): RequireToken,
    Path(group_id): Path<GroupId>,
) -> Result<Json<Vec<CollaboratorGrant>>, ApiError> {
    let mut ctx = RequestContext::begin(&state, &token).await?;
    let grants = GroupAuthz::new(&mut ctx.store)
        .list_collaborators(&ctx.principal, group_id)
        .await?;
    ctx.commit().await?;
    Ok(Json(grants))
}

pub async fn add_collaborator(
    State(state): State<Arc<AppState>>,
    RequireToken(token): RequireToken,
    Path(group_id): Path<GroupId>,
    Json(request): Json<AddCollaboratorRequest>,
) -> Result<Json<CollaboratorGrant>, ApiError> {
    let mut ctx = RequestContext::begin(&state, &token).await?;
    let grant = GroupAuthz::new(&mut ctx.store)
        .add_collaborator(&ctx.principal, group_id, request.user_id, request.level)
        .await?;
    ctx.commit().await?;
    Ok(Json(grant))
}

pub async fn update_collaborator(
    State(state): State<Arc<AppState>>,
    RequireToken(token): RequireToken,
    Path((group_id, user_id)): Path<(GroupId, UserId)>,
    Json(request): Json<UpdateCollaboratorRequest>,
) -> Result<Json<CollaboratorGrant>, ApiError> {
    let mut ctx = RequestContext::begin(&state, &token).await?;
    let grant = GroupAuthz::new(&mut ctx.store)
        .update_collaborator(&ctx.principal, group_id, user_id, request.level)
        .await?;
    ctx.commit().await?;
    Ok(Json(grant))
}

pub async fn remove_collaborator(
    State(state): State<Arc<AppState>>,
    RequireToken(token): RequireToken,
    Path((group_id, user_id)): Path<(GroupId, UserId)>,
) -> Result<StatusCode, ApiError> {
    let mut ctx = RequestContext::begin(&state, &token).await?;
    GroupAuthz::new(&mut ctx.store)
        .remove_collaborator(&ctx.principal, group_id, user_id)
        .await?;
    ctx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}
