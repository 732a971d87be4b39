//! Resource routes.
//!
//! Every handler follows the same shape: open a [`RequestContext`]
//! (transaction plus validated principal), ask a facade, perform the
//! guarded query, commit.
//!
//! [`RequestContext`]: crate::auth::RequestContext

pub mod groups;
pub mod submissions;
pub mod tasks;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use std::sync::Arc;

use crate::auth::AppState;

/// Routes for tasks, submissions and groups.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks", post(tasks::create_task))
        .route("/tasks/{task_id}", delete(tasks::delete_task))
        .route(
            "/tasks/{task_id}/collaborators",
            get(tasks::list_collaborators).post(tasks::add_collaborator),
        )
        .route(
            "/tasks/{task_id}/collaborators/{user_id}",
            put(tasks::update_collaborator).delete(tasks::remove_collaborator),
        )
        .route(
            "/tasks/{task_id}/submissions",
            get(submissions::list_for_task).post(submissions::submit),
        )
        .route("/submissions/{submission_id}", get(submissions::get_submission))
        .route(
            "/submissions/{submission_id}/rejudge",
            post(submissions::rejudge),
        )
        .route("/users/{user_id}/submissions", get(submissions::list_for_user))
        .route("/groups", get(groups::list_groups).post(groups::create_group))
        .route(
            "/groups/{group_id}/members",
            get(groups::list_members).post(groups::add_member),
        )
        .route(
            "/groups/{group_id}/members/{user_id}",
            delete(groups::remove_member),
        )
        .route(
            "/groups/{group_id}/tasks",
            get(groups::list_tasks).post(groups::assign_task),
        )
        .route(
            "/groups/{group_id}/collaborators",
            get(groups::list_collaborators).post(groups::add_collaborator),
        )
        .route(
            "/groups/{group_id}/collaborators/{user_id}",
            put(groups::update_collaborator).delete(groups::remove_collaborator),
        )
}
