//! Submission routes.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use proctor_authz::SubmissionAuthz;
use proctor_core::{SubmissionId, TaskId, UserId};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::auth::{AppState, RequestContext, RequireToken};
use crate::db::{NewSubmission, SubmissionDetail, SubmissionSummary};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    language: String,
    source: String,
    #[serde(default)]
    contest_id: Option<i64>,
}

pub async fn list_for_task(
    State(state): State<Arc<AppState>>,
    RequireToken(token): RequireToken,
    Path(task_id): Path<TaskId>,
) -> Result<Json<Vec<SubmissionSummary>>, ApiError> {
    let mut ctx = RequestContext::begin(&state, &token).await?;
    SubmissionAuthz::new(&mut ctx.store)
        .authorize_list_for_task(&ctx.principal, task_id)
        .await?;

    let submissions = ctx.store.list_task_submissions(task_id).await?;
    ctx.commit().await?;
    Ok(Json(submissions))
}

pub async fn submit(
    State(state): State<Arc<AppState>>,
    RequireToken(token): RequireToken,
    Path(task_id): Path<TaskId>,
    Json(request): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmissionSummary>), ApiError> {
    let mut ctx = RequestContext::begin(&state, &token).await?;
    if request.language.trim().is_empty() {
        return Err(ApiError::invalid_input("language must not be empty"));
    }
    if request.source.is_empty() {
        return Err(ApiError::invalid_input("source must not be empty"));
    }

    SubmissionAuthz::new(&mut ctx.store)
        .authorize_submit(&ctx.principal, task_id)
        .await?;

    let submission = ctx
        .store
        .create_submission(&NewSubmission {
            task_id,
            author: ctx.principal.id(),
            contest_id: request.contest_id,
            language: request.language.trim().to_string(),
            source: request.source,
        })
        .await?;
    ctx.commit().await?;
    info!(submission_id = %submission.id, task_id = %task_id, "submission received");
    Ok((StatusCode::CREATED, Json(submission)))
}

pub async fn get_submission(
    State(state): State<Arc<AppState>>,
    RequireToken(token): RequireToken,
    Path(submission_id): Path<SubmissionId>,
) -> Result<Json<SubmissionDetail>, ApiError> {
    let mut ctx = RequestContext::begin(&state, &token).await?;
    SubmissionAuthz::new(&mut ctx.store)
        .authorize_view(&ctx.principal, submission_id)
        .await?;

    let detail = ctx
        .store
        .find_submission_detail(submission_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    ctx.commit().await?;
    Ok(Json(detail))
}

pub async fn rejudge(
    State(state): State<Arc<AppState>>,
    RequireToken(token): RequireToken,
    Path(submission_id): Path<SubmissionId>,
) -> Result<StatusCode, ApiError> {
    let mut ctx = RequestContext::begin(&state, &token).await?;
    SubmissionAuthz::new(&mut ctx.store)
        .authorize_rejudge(&ctx.principal, submission_id)
        .await?;

    ctx.store.mark_for_rejudge(submission_id).await?;
    ctx.commit().await?;
    info!(submission_id = %submission_id, "submission queued for rejudge");
    Ok(StatusCode::ACCEPTED)
}

pub async fn list_for_user(
    State(state): State<Arc<AppState>>,
    RequireToken(token): RequireToken,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<SubmissionSummary>>, ApiError> {
    let mut ctx = RequestContext::begin(&state, &token).await?;
    SubmissionAuthz::new(&mut ctx.store)
        .authorize_list_for_user(&ctx.principal, user_id)
        .await?;

    let submissions = ctx.store.list_user_submissions(user_id).await?;
    ctx.commit().await?;
    Ok(Json(submissions))
}
